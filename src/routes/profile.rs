use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use tokio_stream::wrappers::WatchStream;

use crate::content::Profile;
use crate::error::AppResult;
use crate::extractors::Visitor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/profile", get(show).put(save))
        .route("/api/profile/events", get(events))
}

async fn show(State(state): State<AppState>) -> AppResult<Json<Profile>> {
    Ok(Json(state.site.profile.fetch_once().await?))
}

async fn save(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(profile): Json<Profile>,
) -> AppResult<StatusCode> {
    state
        .site
        .profile
        .save(profile, &visitor.permission())
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(state.site.profile.watch())
        .map(|view| Event::default().event("profile").json_data(view))
        .take_until(state.shutdown.wait());
    Sse::new(stream).keep_alive(KeepAlive::default())
}
