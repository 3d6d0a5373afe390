use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{FromRow, PgPool};
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;

use super::models::{Booking, Comment, Profile, Quest, Rating};
use super::{QuestStore, StoreError, DEFAULT_NICKNAME};

const QUEST_COLUMNS: &str = "id, title, description, date, difficulty, created_at, updated_at";
const PROFILE_COLUMNS: &str = "user_id, nickname, avatar_url, created_at, updated_at";

/// Relational backend over a single Postgres pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &StorageConfig) -> Result<Self, StoreError> {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| StoreError::Query("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
            .connect(url)
            .await?;

        info!("Created Postgres pool (max_connections={})", config.max_connections);
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Flattened booking join row; quest columns are aliased to avoid clashing
/// with the booking's own id and timestamps.
#[derive(FromRow)]
struct BookingQuestRow {
    id: i32,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    quest_id: i32,
    title: String,
    description: Option<String>,
    date: Option<DateTime<Utc>>,
    difficulty: Option<String>,
    quest_created_at: DateTime<Utc>,
    quest_updated_at: DateTime<Utc>,
}

impl From<BookingQuestRow> for Booking {
    fn from(row: BookingQuestRow) -> Self {
        Booking {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            quest: Quest {
                id: row.quest_id,
                title: row.title,
                description: row.description,
                date: row.date,
                difficulty: row.difficulty,
                created_at: row.quest_created_at,
                updated_at: row.quest_updated_at,
            },
        }
    }
}

#[derive(FromRow)]
struct InsertedBookingRow {
    id: i32,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct RatingUpsertRow {
    id: i32,
    user_id: Uuid,
    quest_id: i32,
    rating: i32,
    created_at: DateTime<Utc>,
    created: bool,
}

#[async_trait]
impl QuestStore for PgStore {
    async fn get_or_create_profile(&self, user_id: Uuid) -> Result<Profile, StoreError> {
        let select = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1");

        if let Some(profile) = sqlx::query_as::<_, Profile>(&select)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(profile);
        }

        // DO NOTHING keeps a concurrent first-fetch from failing; the loser
        // of the race gets no row back and re-reads the winner's.
        let inserted = sqlx::query_as::<_, Profile>(&format!(
            "INSERT INTO profiles (user_id, nickname, avatar_url) VALUES ($1, $2, '') \
             ON CONFLICT (user_id) DO NOTHING \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(DEFAULT_NICKNAME)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(profile) => Ok(profile),
            None => Ok(sqlx::query_as::<_, Profile>(&select)
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?),
        }
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let rows = sqlx::query_as::<_, BookingQuestRow>(
            "SELECT b.id, b.user_id, b.created_at, \
                    q.id AS quest_id, q.title, q.description, q.date, q.difficulty, \
                    q.created_at AS quest_created_at, q.updated_at AS quest_updated_at \
             FROM bookings b \
             JOIN quests q ON q.id = b.quest_id \
             WHERE b.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Booking::from).collect())
    }

    async fn quests(&self, difficulty: Option<&str>) -> Result<Vec<Quest>, StoreError> {
        let quests = match difficulty {
            Some(label) => {
                sqlx::query_as::<_, Quest>(&format!(
                    "SELECT {QUEST_COLUMNS} FROM quests WHERE difficulty = $1"
                ))
                .bind(label)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Quest>(&format!("SELECT {QUEST_COLUMNS} FROM quests"))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        Ok(quests)
    }

    async fn quest_by_id(&self, quest_id: i32) -> Result<Option<Quest>, StoreError> {
        Ok(sqlx::query_as::<_, Quest>(&format!(
            "SELECT {QUEST_COLUMNS} FROM quests WHERE id = $1"
        ))
        .bind(quest_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    async fn booking_exists(&self, user_id: Uuid, quest_id: i32) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM bookings WHERE user_id = $1 AND quest_id = $2)",
        )
        .bind(user_id)
        .bind(quest_id)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn create_booking(&self, user_id: Uuid, quest: Quest) -> Result<Booking, StoreError> {
        let row = sqlx::query_as::<_, InsertedBookingRow>(
            "INSERT INTO bookings (user_id, quest_id) VALUES ($1, $2) RETURNING id, created_at",
        )
        .bind(user_id)
        .bind(quest.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::Conflict("booking already exists for this user and quest".to_string())
            }
            _ => StoreError::Sqlx(e),
        })?;

        Ok(Booking {
            id: row.id,
            user_id,
            quest,
            created_at: row.created_at,
        })
    }

    async fn upsert_rating(
        &self,
        user_id: Uuid,
        quest_id: i32,
        rating: i32,
    ) -> Result<(Rating, bool), StoreError> {
        // xmax = 0 distinguishes a fresh insert from an overwrite.
        let row = sqlx::query_as::<_, RatingUpsertRow>(
            "INSERT INTO ratings (user_id, quest_id, rating) VALUES ($1, $2, $3) \
             ON CONFLICT (user_id, quest_id) DO UPDATE SET rating = EXCLUDED.rating \
             RETURNING id, user_id, quest_id, rating, created_at, (xmax = 0) AS created",
        )
        .bind(user_id)
        .bind(quest_id)
        .bind(rating)
        .fetch_one(&self.pool)
        .await?;

        let created = row.created;
        Ok((
            Rating {
                id: row.id,
                user_id: row.user_id,
                quest: row.quest_id,
                rating: row.rating,
                created_at: row.created_at,
            },
            created,
        ))
    }

    async fn comments_for_quest(&self, quest_id: i32) -> Result<Vec<Comment>, StoreError> {
        Ok(sqlx::query_as::<_, Comment>(
            "SELECT id, user_id, quest_id, text, created_at FROM comments \
             WHERE quest_id = $1 ORDER BY created_at DESC",
        )
        .bind(quest_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        quest_id: i32,
        text: &str,
    ) -> Result<Comment, StoreError> {
        Ok(sqlx::query_as::<_, Comment>(
            "INSERT INTO comments (user_id, quest_id, text) VALUES ($1, $2, $3) \
             RETURNING id, user_id, quest_id, text, created_at",
        )
        .bind(user_id)
        .bind(quest_id)
        .bind(text)
        .fetch_one(&self.pool)
        .await?)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
