use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// User profile keyed by the auth provider's subject id. Created lazily on
/// first fetch; never deleted through this API.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub user_id: Uuid,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Quests are created out-of-band; this API only reads them.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Quest {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub difficulty: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking always ships with its quest expanded; the stores fetch both in
/// one round trip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: i32,
    pub user_id: Uuid,
    pub quest: Quest,
    pub created_at: DateTime<Utc>,
}

/// One rating per (user, quest); a later submission overwrites the score.
///
/// The wire name for the quest reference is `quest` (a plain id) while the
/// storage column is `quest_id`, hence the renames.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Rating {
    pub id: i32,
    pub user_id: Uuid,
    #[serde(alias = "quest_id")]
    #[sqlx(rename = "quest_id")]
    pub quest: i32,
    pub rating: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Comment {
    pub id: i32,
    pub user_id: Uuid,
    #[serde(alias = "quest_id")]
    #[sqlx(rename = "quest_id")]
    pub quest: i32,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_serializes_quest_reference_as_quest() {
        let rating = Rating {
            id: 1,
            user_id: Uuid::new_v4(),
            quest: 42,
            rating: 5,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&rating).unwrap();
        assert_eq!(value["quest"], 42);
        assert!(value.get("quest_id").is_none());
    }

    #[test]
    fn comment_deserializes_storage_column_name() {
        let comment: Comment = serde_json::from_value(serde_json::json!({
            "id": 7,
            "user_id": Uuid::new_v4(),
            "quest_id": 3,
            "text": "great quest",
            "created_at": Utc::now(),
        }))
        .unwrap();

        assert_eq!(comment.quest, 3);
    }
}
