use std::sync::Arc;

use crate::auth::TokenDecoder;
use crate::notify::Notifier;
use crate::store::QuestStore;

/// Per-process dependencies handed to every handler through axum state. The
/// storage client is an explicit dependency rather than a process global so
/// tests can substitute fakes.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn QuestStore>,
    pub notifier: Arc<dyn Notifier>,
    pub tokens: TokenDecoder,
}

impl AppState {
    pub fn new(
        store: Arc<dyn QuestStore>,
        notifier: Arc<dyn Notifier>,
        tokens: TokenDecoder,
    ) -> Self {
        Self {
            store,
            notifier,
            tokens,
        }
    }
}
