use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;

use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Quest;

#[derive(Debug, Deserialize)]
pub struct QuestListQuery {
    /// Exact-match difficulty label, e.g. ?difficulty=easy
    pub difficulty: Option<String>,
}

/// GET /quests/ - List quests, optionally filtered by difficulty
///
/// No auth, no pagination; rows come back in natural storage order. An empty
/// `difficulty=` value counts as no filter, same as omitting the parameter.
pub async fn list_quests(
    State(state): State<AppState>,
    Query(query): Query<QuestListQuery>,
) -> Result<Json<Vec<Quest>>, ApiError> {
    let difficulty = query.difficulty.as_deref().filter(|label| !label.is_empty());
    let quests = state.store.quests(difficulty).await?;
    Ok(Json(quests))
}
