use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header, Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use url::Url;
use uuid::Uuid;

use crate::config::StorageConfig;

use super::models::{Booking, Comment, Profile, Quest, Rating};
use super::{QuestStore, StoreError, DEFAULT_NICKNAME};

/// Hosted backend over the Supabase PostgREST API. The table layout matches
/// the relational backend; nested expansion and upserts use PostgREST
/// operators instead of SQL.
#[derive(Debug)]
pub struct SupabaseStore {
    client: Client,
    base_url: Url,
    service_key: String,
}

impl SupabaseStore {
    pub fn new(config: &StorageConfig) -> Result<Self, StoreError> {
        let raw = config
            .supabase_url
            .as_deref()
            .ok_or_else(|| StoreError::Query("SUPABASE_URL is not set".to_string()))?;
        let service_key = config
            .supabase_service_key
            .clone()
            .ok_or_else(|| StoreError::Query("SUPABASE_SERVICE_KEY is not set".to_string()))?;

        let mut base_url =
            Url::parse(raw).map_err(|e| StoreError::Query(format!("invalid SUPABASE_URL: {e}")))?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        Ok(Self {
            client: Client::new(),
            base_url,
            service_key,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(&format!("rest/v1/{table}"))
            .map_err(|e| StoreError::Query(format!("invalid table url: {e}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.service_key)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.service_key))
    }

    async fn fetch_rows<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Vec<T>, StoreError> {
        let resp = Self::check_status(builder.send().await?).await?;
        resp.json().await.map_err(StoreError::Http)
    }

    async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT {
            return Err(StoreError::Conflict(body));
        }
        Err(StoreError::Upstream(format!("{status}: {body}")))
    }
}

#[derive(Deserialize)]
struct InsertedBookingRow {
    id: i32,
    created_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct IdRow {
    #[allow(dead_code)]
    id: i32,
}

#[async_trait]
impl QuestStore for SupabaseStore {
    async fn get_or_create_profile(&self, user_id: Uuid) -> Result<Profile, StoreError> {
        let mut url = self.table_url("profiles")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("user_id", &format!("eq.{user_id}"));

        let existing: Vec<Profile> = self.fetch_rows(self.request(Method::GET, url.clone())).await?;
        if let Some(profile) = existing.into_iter().next() {
            return Ok(profile);
        }

        let insert = self
            .request(Method::POST, self.table_url("profiles")?)
            .header("Prefer", "return=representation")
            .json(&json!({
                "user_id": user_id,
                "nickname": DEFAULT_NICKNAME,
                "avatar_url": "",
            }));

        match self.fetch_rows::<Profile>(insert).await {
            Ok(rows) => rows
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::Upstream("profile insert returned no rows".to_string())),
            // Lost a concurrent first-fetch race; the row exists now.
            Err(StoreError::Conflict(_)) => {
                let raced: Vec<Profile> = self.fetch_rows(self.request(Method::GET, url)).await?;
                raced
                    .into_iter()
                    .next()
                    .ok_or_else(|| StoreError::Upstream("profile vanished after conflict".to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        let mut url = self.table_url("bookings")?;
        url.query_pairs_mut()
            .append_pair("select", "id,user_id,created_at,quest:quests(*)")
            .append_pair("user_id", &format!("eq.{user_id}"));

        self.fetch_rows(self.request(Method::GET, url)).await
    }

    async fn quests(&self, difficulty: Option<&str>) -> Result<Vec<Quest>, StoreError> {
        let mut url = self.table_url("quests")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", "*");
            if let Some(label) = difficulty {
                pairs.append_pair("difficulty", &format!("eq.{label}"));
            }
        }

        self.fetch_rows(self.request(Method::GET, url)).await
    }

    async fn quest_by_id(&self, quest_id: i32) -> Result<Option<Quest>, StoreError> {
        let mut url = self.table_url("quests")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("id", &format!("eq.{quest_id}"))
            .append_pair("limit", "1");

        let rows: Vec<Quest> = self.fetch_rows(self.request(Method::GET, url)).await?;
        Ok(rows.into_iter().next())
    }

    async fn booking_exists(&self, user_id: Uuid, quest_id: i32) -> Result<bool, StoreError> {
        let mut url = self.table_url("bookings")?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("quest_id", &format!("eq.{quest_id}"));

        let rows: Vec<IdRow> = self.fetch_rows(self.request(Method::GET, url)).await?;
        Ok(!rows.is_empty())
    }

    async fn create_booking(&self, user_id: Uuid, quest: Quest) -> Result<Booking, StoreError> {
        let insert = self
            .request(Method::POST, self.table_url("bookings")?)
            .header("Prefer", "return=representation")
            .json(&json!({ "user_id": user_id, "quest_id": quest.id }));

        let row = self
            .fetch_rows::<InsertedBookingRow>(insert)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Upstream("booking insert returned no rows".to_string()))?;

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
        // PostgREST reports no created/updated distinction, so probe first.
        let existed = {
            let mut url = self.table_url("ratings")?;
            url.query_pairs_mut()
                .append_pair("select", "id")
                .append_pair("user_id", &format!("eq.{user_id}"))
                .append_pair("quest_id", &format!("eq.{quest_id}"));
            let rows: Vec<IdRow> = self.fetch_rows(self.request(Method::GET, url)).await?;
            !rows.is_empty()
        };

        let mut url = self.table_url("ratings")?;
        url.query_pairs_mut()
            .append_pair("on_conflict", "user_id,quest_id");

        let upsert = self
            .request(Method::POST, url)
            .header("Prefer", "resolution=merge-duplicates,return=representation")
            .json(&json!({ "user_id": user_id, "quest_id": quest_id, "rating": rating }));

        let row = self
            .fetch_rows::<Rating>(upsert)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Upstream("rating upsert returned no rows".to_string()))?;

        Ok((row, !existed))
    }

    async fn comments_for_quest(&self, quest_id: i32) -> Result<Vec<Comment>, StoreError> {
        let mut url = self.table_url("comments")?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("quest_id", &format!("eq.{quest_id}"))
            .append_pair("order", "created_at.desc");

        self.fetch_rows(self.request(Method::GET, url)).await
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        quest_id: i32,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let insert = self
            .request(Method::POST, self.table_url("comments")?)
            .header("Prefer", "return=representation")
            .json(&json!({ "user_id": user_id, "quest_id": quest_id, "text": text }));

        self.fetch_rows::<Comment>(insert)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::Upstream("comment insert returned no rows".to_string()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut url = self.table_url("quests")?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("limit", "1");

        Self::check_status(self.request(Method::GET, url).send().await?).await?;
        Ok(())
    }
}
