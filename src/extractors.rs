use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::error::AppError;
use crate::session::{Permission, Session};
use crate::state::AppState;

/// Whoever is making the request. Visitors without a session cookie are signed out.
#[derive(Debug, Clone)]
pub struct Visitor {
    pub token: Option<String>,
    pub session: Session,
}

impl Visitor {
    pub fn permission(&self) -> Permission {
        self.session.permission()
    }

    /// The cookie token, but only if it still resolves to a session.
    /// Unknown or expired tokens read as `None`.
    pub fn live_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .filter(|_| self.session.is_authenticated)
    }
}

impl FromRequestParts<AppState> for Visitor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(parts, &state.config.auth.cookie_name);

        let session = match token.as_deref() {
            Some(token) => state.identity.session_for(token)?,
            None => Session::signed_out(),
        };

        Ok(Visitor { token, session })
    }
}

fn extract_session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name && !val.is_empty() {
                Some(val.to_string())
            } else {
                None
            }
        })
}
