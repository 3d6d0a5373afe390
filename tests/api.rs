//! End-to-end router tests over an in-memory store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use quest_api_rust::auth::{mint_token, TokenDecoder};
use quest_api_rust::notify::{LogNotifier, Notifier, NotifyError};
use quest_api_rust::store::{
    Booking, Comment, Profile, Quest, QuestStore, Rating, StoreError, DEFAULT_NICKNAME,
};
use quest_api_rust::{app, AppState};

fn quest(id: i32, title: &str, difficulty: &str) -> Quest {
    let now = Utc::now();
    Quest {
        id,
        title: title.to_string(),
        description: Some(format!("{title} description")),
        date: Some(now),
        difficulty: Some(difficulty.to_string()),
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
struct MemoryStore {
    quests: Vec<Quest>,
    email: Option<String>,
    profiles: Mutex<HashMap<Uuid, Profile>>,
    bookings: Mutex<Vec<Booking>>,
    ratings: Mutex<Vec<Rating>>,
    comments: Mutex<Vec<Comment>>,
    next_id: AtomicI32,
}

impl MemoryStore {
    fn with_quests(quests: Vec<Quest>) -> Self {
        Self {
            quests,
            next_id: AtomicI32::new(1),
            ..Default::default()
        }
    }

    fn next_id(&self) -> i32 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    fn booking_count(&self) -> usize {
        self.bookings.lock().unwrap().len()
    }

    fn ratings_snapshot(&self) -> Vec<Rating> {
        self.ratings.lock().unwrap().clone()
    }
}

#[async_trait]
impl QuestStore for MemoryStore {
    async fn get_or_create_profile(&self, user_id: Uuid) -> Result<Profile, StoreError> {
        let mut profiles = self.profiles.lock().unwrap();
        let now = Utc::now();
        Ok(profiles
            .entry(user_id)
            .or_insert_with(|| Profile {
                user_id,
                nickname: Some(DEFAULT_NICKNAME.to_string()),
                avatar_url: Some(String::new()),
                created_at: now,
                updated_at: now,
            })
            .clone())
    }

    async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, StoreError> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn quests(&self, difficulty: Option<&str>) -> Result<Vec<Quest>, StoreError> {
        Ok(self
            .quests
            .iter()
            .filter(|q| match difficulty {
                Some(label) => q.difficulty.as_deref() == Some(label),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn quest_by_id(&self, quest_id: i32) -> Result<Option<Quest>, StoreError> {
        Ok(self.quests.iter().find(|q| q.id == quest_id).cloned())
    }

    async fn booking_exists(&self, user_id: Uuid, quest_id: i32) -> Result<bool, StoreError> {
        Ok(self
            .bookings
            .lock()
            .unwrap()
            .iter()
            .any(|b| b.user_id == user_id && b.quest.id == quest_id))
    }

    async fn create_booking(&self, user_id: Uuid, quest: Quest) -> Result<Booking, StoreError> {
        let mut bookings = self.bookings.lock().unwrap();
        if bookings.iter().any(|b| b.user_id == user_id && b.quest.id == quest.id) {
            return Err(StoreError::Conflict("duplicate booking".to_string()));
        }
        let booking = Booking {
            id: self.next_id(),
            user_id,
            quest,
            created_at: Utc::now(),
        };
        bookings.push(booking.clone());
        Ok(booking)
    }

    async fn upsert_rating(
        &self,
        user_id: Uuid,
        quest_id: i32,
        rating: i32,
    ) -> Result<(Rating, bool), StoreError> {
        let mut ratings = self.ratings.lock().unwrap();
        if let Some(existing) = ratings
            .iter_mut()
            .find(|r| r.user_id == user_id && r.quest == quest_id)
        {
            existing.rating = rating;
            return Ok((existing.clone(), false));
        }
        let record = Rating {
            id: self.next_id(),
            user_id,
            quest: quest_id,
            rating,
            created_at: Utc::now(),
        };
        ratings.push(record.clone());
        Ok((record, true))
    }

    async fn comments_for_quest(&self, quest_id: i32) -> Result<Vec<Comment>, StoreError> {
        let mut comments: Vec<Comment> = self
            .comments
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.quest == quest_id)
            .cloned()
            .collect();
        comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(comments)
    }

    async fn create_comment(
        &self,
        user_id: Uuid,
        quest_id: i32,
        text: &str,
    ) -> Result<Comment, StoreError> {
        let comment = Comment {
            id: self.next_id(),
            user_id,
            quest: quest_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        self.comments.lock().unwrap().push(comment.clone());
        Ok(comment)
    }

    async fn profile_email(&self, _user_id: Uuid) -> Result<Option<String>, StoreError> {
        Ok(self.email.clone())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

struct RecordingNotifier {
    sent: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn booking_confirmation(&self, email: &str, _quest: &Quest) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(email.to_string());
        Ok(())
    }
}

struct FailingNotifier;

#[async_trait]
impl Notifier for FailingNotifier {
    async fn booking_confirmation(&self, _email: &str, _quest: &Quest) -> Result<(), NotifyError> {
        Err(NotifyError::Rejected("delivery endpoint down".to_string()))
    }
}

fn test_app(store: Arc<MemoryStore>) -> Router {
    app_with(store, Arc::new(LogNotifier))
}

fn app_with(store: Arc<dyn QuestStore>, notifier: Arc<dyn Notifier>) -> Router {
    app(AppState::new(store, notifier, TokenDecoder::unverified()))
}

fn token_for(user_id: Uuid) -> String {
    // Any signing key works: the decoder runs in unverified mode.
    mint_token(user_id, "test-secret").unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn get_auth(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn profile_requires_token() {
    let store = Arc::new(MemoryStore::with_quests(vec![]));

    let (status, body) = send(test_app(store.clone()), get("/profile/")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authorization token missing or invalid");

    let (status, body) = send(
        test_app(store),
        get_auth("/profile/", "definitely-not-a-jwt"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid token or cannot parse user_id as UUID");
}

#[tokio::test]
async fn profile_is_created_on_first_fetch() {
    let store = Arc::new(MemoryStore::with_quests(vec![]));
    let user_id = Uuid::new_v4();

    let (status, body) = send(
        test_app(store),
        get_auth("/profile/", &token_for(user_id)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["user_id"], user_id.to_string());
    assert_eq!(body["profile"]["nickname"], "User");
    assert_eq!(body["booked_quests"], json!([]));
}

#[tokio::test]
async fn profile_lists_booked_quests_with_detail() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Crypt", "hard")]));
    let user_id = Uuid::new_v4();
    let token = token_for(user_id);

    let (status, _) = send(
        test_app(store.clone()),
        post_json("/book/", Some(&token), json!({ "quest_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(test_app(store), get_auth("/profile/", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["booked_quests"].as_array().unwrap().len(), 1);
    assert_eq!(body["booked_quests"][0]["quest"]["title"], "Crypt");
}

#[tokio::test]
async fn quests_filter_by_difficulty_is_exact() {
    let store = Arc::new(MemoryStore::with_quests(vec![
        quest(1, "Cellar", "easy"),
        quest(2, "Crypt", "hard"),
        quest(3, "Garden", "easy"),
    ]));

    let (status, body) = send(test_app(store.clone()), get("/quests/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);

    let (status, body) = send(test_app(store.clone()), get("/quests/?difficulty=easy")).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|q| q["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Cellar", "Garden"]);

    // Case-sensitive exact match
    let (status, body) = send(test_app(store.clone()), get("/quests/?difficulty=Easy")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    // An empty value behaves like no filter at all
    let (status, body) = send(test_app(store), get("/quests/?difficulty=")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn booking_validates_input_and_quest() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/book/", Some(&token), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "quest_id is required");

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/book/", Some(&token), json!({ "quest_id": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Quest not found");

    let (status, _) = send(
        test_app(store),
        post_json("/book/", None, json!({ "quest_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn booking_twice_rejects_second_attempt() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/book/", Some(&token), json!({ "quest_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Booked successfully");
    assert_eq!(body["booking"]["quest"]["id"], 1);

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/book/", Some(&token), json!({ "quest_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "You have already booked this quest.");

    assert_eq!(store.booking_count(), 1);
}

#[tokio::test]
async fn notification_failure_does_not_fail_booking() {
    let store = Arc::new(MemoryStore {
        quests: vec![quest(1, "Cellar", "easy")],
        email: Some("player@example.com".to_string()),
        next_id: AtomicI32::new(1),
        ..Default::default()
    });
    let app = app_with(store.clone(), Arc::new(FailingNotifier));

    let (status, body) = send(
        app,
        post_json("/book/", Some(&token_for(Uuid::new_v4())), json!({ "quest_id": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Booked successfully");
    assert_eq!(store.booking_count(), 1);
}

#[tokio::test]
async fn confirmation_is_sent_when_email_resolves() {
    let store = Arc::new(MemoryStore {
        quests: vec![quest(1, "Cellar", "easy")],
        email: Some("player@example.com".to_string()),
        next_id: AtomicI32::new(1),
        ..Default::default()
    });
    let notifier = Arc::new(RecordingNotifier { sent: Mutex::new(vec![]) });
    let app = app_with(store, notifier.clone());

    let (status, _) = send(
        app,
        post_json("/book/", Some(&token_for(Uuid::new_v4())), json!({ "quest_id": 1 })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(*notifier.sent.lock().unwrap(), vec!["player@example.com"]);
}

#[tokio::test]
async fn rating_requires_both_fields() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    for payload in [json!({}), json!({ "quest_id": 1 }), json!({ "rating": 3 })] {
        let (status, body) = send(
            test_app(store.clone()),
            post_json("/rate/", Some(&token), payload),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "quest_id and rating are required");
    }
}

#[tokio::test]
async fn rating_bounds_are_enforced() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    for bad in [0, 6] {
        let (status, body) = send(
            test_app(store.clone()),
            post_json("/rate/", Some(&token), json!({ "quest_id": 1, "rating": bad })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Rating must be between 1 and 5");
    }

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/rate/", Some(&token), json!({ "quest_id": 1, "rating": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rating created");
    assert_eq!(body["rating"]["rating"], 3);

    let snapshot = store.ratings_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].rating, 3);
}

#[tokio::test]
async fn rating_twice_overwrites_instead_of_duplicating() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/rate/", Some(&token), json!({ "quest_id": 1, "rating": 3 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rating created");

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/rate/", Some(&token), json!({ "quest_id": 1, "rating": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Rating updated");

    let snapshot = store.ratings_snapshot();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].rating, 5);
}

#[tokio::test]
async fn rating_accepts_numeric_strings_and_unknown_quest_is_404() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/rate/", Some(&token), json!({ "quest_id": 1, "rating": "4" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rating"]["rating"], 4);

    let (status, _) = send(
        test_app(store),
        post_json("/rate/", Some(&token), json!({ "quest_id": 99, "rating": 4 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comments_listing_validates_quest() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));

    let (status, body) = send(test_app(store.clone()), get("/comments/")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "quest_id is required for GET");

    let (status, _) = send(test_app(store), get("/comments/?quest_id=99")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn comment_posting_validates_input() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/comments/", Some(&token), json!({ "quest_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "quest_id and text are required");

    let (status, _) = send(
        test_app(store.clone()),
        post_json("/comments/", Some(&token), json!({ "quest_id": 99, "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        test_app(store),
        post_json("/comments/", None, json!({ "quest_id": 1, "text": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn new_comment_appears_first_in_listing() {
    let store = Arc::new(MemoryStore::with_quests(vec![quest(1, "Cellar", "easy")]));
    let token = token_for(Uuid::new_v4());

    let (status, body) = send(
        test_app(store.clone()),
        post_json("/comments/", Some(&token), json!({ "quest_id": 1, "text": "first!" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Comment added");
    assert_eq!(body["comment"]["text"], "first!");

    let (status, _) = send(
        test_app(store.clone()),
        post_json("/comments/", Some(&token), json!({ "quest_id": 1, "text": "second" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(test_app(store), get("/comments/?quest_id=1")).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["second", "first!"]);
}

#[tokio::test]
async fn health_reports_storage_status() {
    let store = Arc::new(MemoryStore::with_quests(vec![]));

    let (status, body) = send(test_app(store), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
