use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Comment;

#[derive(Debug, Deserialize)]
pub struct CommentListQuery {
    pub quest_id: Option<i32>,
}

/// GET /comments/ - List a quest's comments, newest first
pub async fn list_comments(
    State(state): State<AppState>,
    Query(query): Query<CommentListQuery>,
) -> Result<Json<Vec<Comment>>, ApiError> {
    let quest_id = query
        .quest_id
        .ok_or_else(|| ApiError::bad_request("quest_id is required for GET"))?;

    state
        .store
        .quest_by_id(quest_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quest not found"))?;

    let comments = state.store.comments_for_quest(quest_id).await?;
    Ok(Json(comments))
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    pub quest_id: Option<i32>,
    pub text: Option<String>,
}

/// POST /comments/ - Append a comment to a quest
pub async fn post_comment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let (Some(quest_id), Some(text)) = (payload.quest_id, payload.text.as_deref()) else {
        return Err(ApiError::bad_request("quest_id and text are required"));
    };
    if text.is_empty() {
        return Err(ApiError::bad_request("quest_id and text are required"));
    }

    state
        .store
        .quest_by_id(quest_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quest not found"))?;

    let comment = state.store.create_comment(user.user_id, quest_id, text).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "message": "Comment added",
            "comment": comment,
        })),
    ))
}
