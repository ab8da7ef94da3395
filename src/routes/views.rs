// Read-only views derived from the mirrors
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use crate::content::{
    format_relative_time, group_by_category, with_status, KnowledgeLink, MediaKind, Post, Project,
    ProjectStatus, StatusCounts,
};
use crate::state::AppState;
use crate::sync::Entry;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostCard {
    #[serde(flatten)]
    pub entry: Entry<Post>,
    pub media_kind: Option<MediaKind>,
    pub created_ago: Option<String>,
}

#[derive(Serialize)]
pub struct CategoryGroup {
    pub category: String,
    pub links: Vec<Entry<KnowledgeLink>>,
}

#[derive(Serialize)]
pub struct ProjectBoard {
    pub counts: StatusCounts,
    pub projects: Vec<Entry<Project>>,
}

#[derive(Deserialize)]
pub struct BoardQuery {
    pub status: Option<ProjectStatus>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/posts/cards", get(post_cards))
        .route("/api/knowledge/grouped", get(knowledge_grouped))
        .route("/api/projects/board", get(project_board))
}

async fn post_cards(State(state): State<AppState>) -> Json<Vec<PostCard>> {
    let cards = state
        .site
        .posts
        .entries()
        .into_iter()
        .map(|entry| PostCard {
            media_kind: entry.record.media_kind(),
            created_ago: entry.created_at.as_ref().map(format_relative_time),
            entry,
        })
        .collect();
    Json(cards)
}

async fn knowledge_grouped(State(state): State<AppState>) -> Json<Vec<CategoryGroup>> {
    let entries = state.site.knowledge.entries();
    let groups = group_by_category(&entries)
        .into_iter()
        .map(|(category, links)| CategoryGroup {
            category,
            links: links.into_iter().cloned().collect(),
        })
        .collect();
    Json(groups)
}

async fn project_board(
    State(state): State<AppState>,
    Query(query): Query<BoardQuery>,
) -> Json<ProjectBoard> {
    let entries = state.site.projects.entries();
    let counts = StatusCounts::tally(&entries);
    let projects = match query.status {
        Some(status) => with_status(&entries, status).into_iter().cloned().collect(),
        None => entries,
    };
    Json(ProjectBoard { counts, projects })
}
