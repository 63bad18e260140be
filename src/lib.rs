// src/lib.rs

//! Realtime chat backend for the marketplace enquiry flow.
//!
//! Vendors and customers exchange messages inside an enquiry thread over a
//! websocket channel: a connection joins a room derived from the
//! (customer, vendor, enquiry) triple, gets the thread's history replayed,
//! and from then on every accepted message is persisted and fanned out to
//! the room. A small HTTP surface lists conversations from the same store.

pub mod config;
pub mod error;
pub mod http;
pub mod hub;
pub mod models;
pub mod registry;
pub mod room;
pub mod state;
pub mod store;
pub mod websocket;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Build the application router: the realtime channel plus the chat
/// listing endpoints.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(http::root))
        .route("/ws", get(websocket::websocket_handler))
        .route("/api/chat/vendor", get(http::get_vendor_chats))
        .route("/api/chat/customer", get(http::get_customer_chats))
        .route("/api/chat/single", post(http::get_single_chat))
        .with_state(state)
}
