use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub quest_id: Option<i32>,
    /// Accepted as a JSON number or a numeric string.
    pub rating: Option<Value>,
}

/// POST /rate/ - Create or overwrite the caller's rating for a quest
///
/// One rating per (user, quest); a repeat submission overwrites the score.
/// The response message distinguishes the two cases.
pub async fn rate_quest(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<RateRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(quest_id), Some(raw_rating)) = (payload.quest_id, payload.rating.as_ref()) else {
        return Err(ApiError::bad_request("quest_id and rating are required"));
    };

    let rating = parse_rating(raw_rating).map_err(ApiError::bad_request)?;

    state
        .store
        .quest_by_id(quest_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quest not found"))?;

    let (record, created) = state
        .store
        .upsert_rating(user.user_id, quest_id, rating)
        .await?;

    Ok(Json(json!({
        "message": if created { "Rating created" } else { "Rating updated" },
        "rating": record,
    })))
}

fn parse_rating(value: &Value) -> Result<i32, String> {
    let n = match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| "Rating must be an integer".to_string())?,
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| "Rating must be an integer".to_string())?,
        _ => return Err("Rating must be an integer".to_string()),
    };

    if !(1..=5).contains(&n) {
        return Err("Rating must be between 1 and 5".to_string());
    }
    Ok(n as i32)
}
