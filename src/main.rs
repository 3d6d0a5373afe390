use std::sync::Arc;

use anyhow::{bail, Context};

use quest_api_rust::auth::TokenDecoder;
use quest_api_rust::config::{self, StorageBackend};
use quest_api_rust::notify::{LogNotifier, Notifier, WebhookNotifier};
use quest_api_rust::store::postgres::PgStore;
use quest_api_rust::store::supabase::SupabaseStore;
use quest_api_rust::store::QuestStore;
use quest_api_rust::{app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, SUPABASE_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let config = config::config();
    tracing::info!("Starting Quest API in {:?} mode", config.environment);

    let tokens = if config.auth.allow_unverified_tokens {
        tracing::warn!(
            "Token signatures are NOT verified; any caller can assume any user id. \
             Set AUTH_ALLOW_UNVERIFIED_TOKENS=false and AUTH_JWT_SECRET to enable verification."
        );
        TokenDecoder::unverified()
    } else {
        if config.auth.jwt_secret.is_empty() {
            bail!("AUTH_JWT_SECRET must be set when token verification is enabled");
        }
        TokenDecoder::verified(config.auth.jwt_secret.clone())
    };

    let store: Arc<dyn QuestStore> = match config.storage.backend {
        StorageBackend::Postgres => Arc::new(
            PgStore::connect(&config.storage)
                .await
                .context("failed to connect to Postgres")?,
        ),
        StorageBackend::Supabase => Arc::new(
            SupabaseStore::new(&config.storage).context("failed to configure Supabase client")?,
        ),
    };

    let notifier: Arc<dyn Notifier> = match &config.email.webhook_url {
        Some(raw) => {
            let endpoint = url::Url::parse(raw).context("invalid EMAIL_WEBHOOK_URL")?;
            Arc::new(WebhookNotifier::new(endpoint, config.email.from_address.clone()))
        }
        None => Arc::new(LogNotifier),
    };

    let app = app(AppState::new(store, notifier, tokens));

    let bind_addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {bind_addr}"))?;

    tracing::info!("Quest API listening on http://{}", bind_addr);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
