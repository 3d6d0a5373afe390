use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::store::Quest;

#[derive(Debug, Deserialize)]
pub struct BookRequest {
    pub quest_id: Option<i32>,
}

/// POST /book/ - Book a quest for the authenticated user
///
/// A user can hold at most one booking per quest. The handler pre-checks the
/// pair, but the store's unique constraint is what actually decides a
/// concurrent duplicate; either path answers 400.
pub async fn book_quest(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BookRequest>,
) -> Result<Json<Value>, ApiError> {
    let quest_id = payload
        .quest_id
        .ok_or_else(|| ApiError::bad_request("quest_id is required"))?;

    let quest = state
        .store
        .quest_by_id(quest_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Quest not found"))?;

    if state.store.booking_exists(user.user_id, quest_id).await? {
        return Err(ApiError::bad_request("You have already booked this quest."));
    }

    let booking = state.store.create_booking(user.user_id, quest.clone()).await?;

    send_confirmation(&state, user.user_id, &quest).await;

    Ok(Json(json!({
        "message": "Booked successfully",
        "booking": booking,
    })))
}

/// Best-effort confirmation: most profiles resolve no email address, and a
/// delivery failure must never fail the booking.
async fn send_confirmation(state: &AppState, user_id: Uuid, quest: &Quest) {
    let email = match state.store.profile_email(user_id).await {
        Ok(email) => email,
        Err(e) => {
            debug!("email lookup for {} failed: {}", user_id, e);
            None
        }
    };

    let Some(email) = email else { return };

    if let Err(e) = state.notifier.booking_confirmation(&email, quest).await {
        warn!("booking confirmation to {} failed: {}", email, e);
    }
}
