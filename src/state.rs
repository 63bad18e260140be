// src/state.rs

use std::sync::Arc;

use crate::hub::ChatHub;
use crate::store::MessageStore;

/// The application's shared state, accessible from all request handlers.
/// Created once in `main.rs` and shared across all connections via Axum's
/// state management. The hub owns the realtime channel; the store is also
/// exposed directly for the HTTP listing endpoints.
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<ChatHub>,
    pub store: Arc<dyn MessageStore>,
}

impl AppState {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            hub: Arc::new(ChatHub::new(store.clone())),
            store,
        }
    }
}
