// Generic JSON + SSE surface over one CollectionSync
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::{delete, get};
use axum::{Json, Router};
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio_stream::wrappers::WatchStream;

use crate::content::{KnowledgeLink, Post, Project};
use crate::error::{AppError, AppResult};
use crate::extractors::Visitor;
use crate::remote::DocumentId;
use crate::state::AppState;
use crate::sync::{CollectionSync, CollectionView, RemoveOutcome, SyncRecord};

/// A record kind the site serves under `/api/{COLLECTION}`.
pub trait Routed: SyncRecord {
    fn sync(state: &AppState) -> &CollectionSync<Self>;
}

impl Routed for Post {
    fn sync(state: &AppState) -> &CollectionSync<Self> {
        &state.site.posts
    }
}

impl Routed for KnowledgeLink {
    fn sync(state: &AppState) -> &CollectionSync<Self> {
        &state.site.knowledge
    }
}

impl Routed for Project {
    fn sync(state: &AppState) -> &CollectionSync<Self> {
        &state.site.projects
    }
}

#[derive(Deserialize)]
pub struct RemoveQuery {
    #[serde(default)]
    pub confirm: bool,
}

/// List, create, delete and stream for a create/delete-only kind.
pub fn router<T: Routed>() -> Router<AppState> {
    let base = format!("/api/{}", T::COLLECTION);
    Router::new()
        .route(&base, get(list::<T>).post(create::<T>))
        .route(&format!("{}/events", base), get(events::<T>))
        .route(&format!("{}/{{id}}", base), delete(remove::<T>))
}

/// Same as [`router`], plus `PATCH /api/{COLLECTION}/{id}`.
pub fn editable_router<T>() -> Router<AppState>
where
    T: Routed,
    T::Patch: DeserializeOwned,
{
    let base = format!("/api/{}", T::COLLECTION);
    Router::new()
        .route(&base, get(list::<T>).post(create::<T>))
        .route(&format!("{}/events", base), get(events::<T>))
        .route(
            &format!("{}/{{id}}", base),
            delete(remove::<T>).patch(update::<T>),
        )
}

async fn list<T: Routed>(State(state): State<AppState>) -> Json<CollectionView<T>> {
    Json(T::sync(&state).view())
}

async fn create<T: Routed>(
    State(state): State<AppState>,
    visitor: Visitor,
    Json(record): Json<T>,
) -> AppResult<StatusCode> {
    T::sync(&state)
        .create(&record, &visitor.permission())
        .await?;
    // The new entry shows up with the next snapshot.
    Ok(StatusCode::ACCEPTED)
}

async fn update<T>(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
    Json(patch): Json<T::Patch>,
) -> AppResult<StatusCode>
where
    T: Routed,
    T::Patch: DeserializeOwned,
{
    T::sync(&state)
        .update(&DocumentId::new(id), &patch, &visitor.permission())
        .await?;
    Ok(StatusCode::ACCEPTED)
}

async fn remove<T: Routed>(
    State(state): State<AppState>,
    visitor: Visitor,
    Path(id): Path<String>,
    Query(query): Query<RemoveQuery>,
) -> AppResult<StatusCode> {
    let outcome = T::sync(&state)
        .remove(&DocumentId::new(id), &visitor.permission(), query.confirm)
        .await?;

    match outcome {
        RemoveOutcome::Removed => Ok(StatusCode::ACCEPTED),
        RemoveOutcome::Cancelled => Err(AppError::BadRequest(
            "Deletion must be confirmed with ?confirm=true".into(),
        )),
    }
}

async fn events<T: Routed>(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = WatchStream::new(T::sync(&state).watch())
        .map(|view| Event::default().event("snapshot").json_data(view))
        .take_until(state.shutdown.wait());
    Sse::new(stream).keep_alive(KeepAlive::default())
}
