use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::auth::SignedIn;
use crate::error::{AppError, AppResult};
use crate::extractors::Visitor;
use crate::session::Session;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    #[serde(flatten)]
    pub session: Session,
    pub can_edit: bool,
}

impl From<Session> for SessionResponse {
    fn from(session: Session) -> Self {
        Self {
            can_edit: session.can_edit(),
            session,
        }
    }
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/session", get(current))
        .route("/auth/anonymous", post(anonymous))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name,
        token,
        max_age_hours * 3600
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

fn signed_in_response(state: &AppState, signed_in: SignedIn) -> Response {
    let cookie = session_cookie(
        &state.config.auth.cookie_name,
        &signed_in.token,
        state.config.auth.session_hours,
    );
    (
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse::from(signed_in.session)),
    )
        .into_response()
}

async fn current(visitor: Visitor) -> Json<SessionResponse> {
    Json(SessionResponse::from(visitor.session))
}

/// Visitors without a session get an anonymous one; existing sessions are kept.
async fn anonymous(State(state): State<AppState>, visitor: Visitor) -> AppResult<Response> {
    if visitor.session.is_authenticated {
        return Ok(Json(SessionResponse::from(visitor.session)).into_response());
    }
    let signed_in = state.identity.sign_in_anonymously()?;
    Ok(signed_in_response(&state, signed_in))
}

async fn login(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(req): Json<LoginRequest>,
) -> AppResult<Response> {
    let signed_in = state.identity.sign_in_with_password(&req.password)?;

    // Replace whatever session the visitor had before; a row left behind expires.
    if let Some(old) = visitor.token.as_deref() {
        if let Err(e) = state.identity.sign_out(old) {
            tracing::warn!("Could not end previous session on login: {}", e);
        }
    }
    Ok(signed_in_response(&state, signed_in))
}

async fn logout(State(state): State<AppState>, visitor: Visitor) -> AppResult<Response> {
    let token = visitor.live_token().ok_or(AppError::Unauthorized)?;
    state.identity.sign_out(token)?;

    let cookie = clear_session_cookie(&state.config.auth.cookie_name);
    Ok((
        [(header::SET_COOKIE, cookie)],
        Json(SessionResponse::from(Session::signed_out())),
    )
        .into_response())
}
