pub mod models;
pub mod postgres;
pub mod supabase;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

pub use models::{Booking, Comment, Profile, Quest, Rating};

/// Nickname assigned when a profile is created lazily on first fetch.
pub const DEFAULT_NICKNAME: &str = "User";

/// Errors from the storage backends
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Query error: {0}")]
    Query(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("Unexpected storage response: {0}")]
    Upstream(String),
}

/// Storage access for the booking API. Two production implementations exist
/// (Postgres and Supabase); tests substitute in-memory fakes.
///
/// Uniqueness of (user_id, quest_id) for bookings and ratings is owned by the
/// backing store: `create_booking` surfaces a violated constraint as
/// `Conflict`, `upsert_rating` resolves it by overwriting. The handlers'
/// pre-checks are a courtesy, not the authority.
#[async_trait]
pub trait QuestStore: Send + Sync {
    /// Fetch the profile for `user_id`, creating it with placeholder values
    /// if it does not exist yet.
    async fn get_or_create_profile(&self, user_id: Uuid) -> Result<Profile, StoreError>;

    /// Bookings for a user with quest detail expanded in the same fetch.
    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError>;

    /// All quests, or only those whose difficulty label matches exactly.
    async fn quests(&self, difficulty: Option<&str>) -> Result<Vec<Quest>, StoreError>;

    async fn quest_by_id(&self, quest_id: i32) -> Result<Option<Quest>, StoreError>;

    async fn booking_exists(&self, user_id: Uuid, quest_id: i32) -> Result<bool, StoreError>;

    /// Insert a booking for a quest the caller has already resolved. A
    /// (user_id, quest_id) unique violation maps to `Conflict`.
    async fn create_booking(&self, user_id: Uuid, quest: Quest) -> Result<Booking, StoreError>;

    /// Single conditional write keyed on (user_id, quest_id). Returns the row
    /// and whether it was newly created rather than overwritten.
    async fn upsert_rating(
        &self,
        user_id: Uuid,
        quest_id: i32,
        rating: i32,
    ) -> Result<(Rating, bool), StoreError>;

    /// Newest first.
    async fn comments_for_quest(&self, quest_id: i32) -> Result<Vec<Comment>, StoreError>;

    async fn create_comment(
        &self,
        user_id: Uuid,
        quest_id: i32,
        text: &str,
    ) -> Result<Comment, StoreError>;

    /// Email address for booking confirmations. The base profile schema does
    /// not carry one, so the default resolves to nothing.
    async fn profile_email(&self, _user_id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(None)
    }

    /// Connectivity probe for the health endpoint.
    async fn ping(&self) -> Result<(), StoreError>;
}
