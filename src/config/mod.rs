use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub email: EmailConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    /// Local relational storage over sqlx.
    Postgres,
    /// Hosted storage over the Supabase PostgREST API.
    Supabase,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Decode bearer-token payloads without checking the signature. This
    /// reproduces the upstream contract and lets any caller assume any user
    /// id; production profiles default it off.
    pub allow_unverified_tokens: bool,
    pub jwt_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    /// Delivery endpoint for booking confirmations. None disables outbound
    /// delivery; confirmations are logged instead.
    pub webhook_url: Option<String>,
    pub from_address: String,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("QUEST_API_PORT").or_else(|_| env::var("PORT")) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Storage overrides
        if let Ok(v) = env::var("QUEST_STORAGE_BACKEND") {
            self.storage.backend = match v.to_ascii_lowercase().as_str() {
                "supabase" => StorageBackend::Supabase,
                _ => StorageBackend::Postgres,
            };
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.storage.database_url = Some(v);
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.storage.max_connections = v.parse().unwrap_or(self.storage.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECT_TIMEOUT_SECS") {
            self.storage.connect_timeout_secs =
                v.parse().unwrap_or(self.storage.connect_timeout_secs);
        }
        if let Ok(v) = env::var("SUPABASE_URL") {
            self.storage.supabase_url = Some(v);
        }
        if let Ok(v) = env::var("SUPABASE_SERVICE_KEY") {
            self.storage.supabase_service_key = Some(v);
        }

        // Auth overrides
        if let Ok(v) = env::var("AUTH_ALLOW_UNVERIFIED_TOKENS") {
            self.auth.allow_unverified_tokens =
                v.parse().unwrap_or(self.auth.allow_unverified_tokens);
        }
        if let Ok(v) = env::var("AUTH_JWT_SECRET") {
            self.auth.jwt_secret = v;
        }

        // Email overrides
        if let Ok(v) = env::var("EMAIL_WEBHOOK_URL") {
            self.email.webhook_url = Some(v);
        }
        if let Ok(v) = env::var("EMAIL_FROM_ADDRESS") {
            self.email.from_address = v;
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig { port: 3000 },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: None,
                max_connections: 10,
                connect_timeout_secs: 30,
                supabase_url: None,
                supabase_service_key: None,
            },
            auth: AuthConfig {
                allow_unverified_tokens: true,
                jwt_secret: String::new(),
            },
            email: EmailConfig {
                webhook_url: None,
                from_address: "noreply@queststudio.local".to_string(),
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig { port: 3000 },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: None,
                max_connections: 20,
                connect_timeout_secs: 10,
                supabase_url: None,
                supabase_service_key: None,
            },
            auth: AuthConfig {
                allow_unverified_tokens: false,
                jwt_secret: String::new(),
            },
            email: EmailConfig {
                webhook_url: None,
                from_address: "noreply@staging.queststudio.example".to_string(),
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig { port: 3000 },
            storage: StorageConfig {
                backend: StorageBackend::Postgres,
                database_url: None,
                max_connections: 50,
                connect_timeout_secs: 5,
                supabase_url: None,
                supabase_service_key: None,
            },
            auth: AuthConfig {
                allow_unverified_tokens: false,
                jwt_secret: String::new(),
            },
            email: EmailConfig {
                webhook_url: None,
                from_address: "noreply@queststudio.example".to_string(),
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}
