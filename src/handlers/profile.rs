use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// GET /profile/ - Fetch the caller's profile and booked quests
///
/// The profile is created on first access with a placeholder nickname and an
/// empty avatar. Bookings come back with quest detail already expanded.
///
/// Expected Output:
/// ```json
/// {
///   "profile": { "user_id": "...", "nickname": "User", "avatar_url": "", ... },
///   "booked_quests": [ { "id": 1, "user_id": "...", "quest": { ... }, "created_at": "..." } ]
/// }
/// ```
pub async fn get_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<Value>, ApiError> {
    let profile = state.store.get_or_create_profile(user.user_id).await?;
    let booked_quests = state.store.bookings_for_user(user.user_id).await?;

    Ok(Json(json!({
        "profile": profile,
        "booked_quests": booked_quests,
    })))
}
