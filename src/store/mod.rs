// src/store/mod.rs

//! Message store abstraction.
//!
//! The realtime core and the HTTP listing surface only ever append and read
//! messages; nothing in this crate updates or deletes a persisted message.
//! `PgMessageStore` is the production backend; `MemoryMessageStore` backs the
//! test suite and never touches a database.

mod memory;
mod postgres;

use async_trait::async_trait;

pub use memory::MemoryMessageStore;
pub use postgres::PgMessageStore;

use crate::error::StoreError;
use crate::models::{ChatMessage, NewChatMessage};

/// Durable, append-only record of chat messages.
///
/// Ordering contract: the `query_*` methods return messages ascending by
/// `persisted_at` (oldest first, natural conversation order) and the
/// `*_threads` listing queries return them descending (newest first), which
/// is what the listing endpoints expect. Append order within one thread is
/// the source of truth for broadcast order.
#[async_trait]
pub trait MessageStore: Send + Sync + 'static {
    /// Persist a message, assigning its id and `persisted_at`.
    /// Fails with [`StoreError::Unavailable`] if the durable medium cannot
    /// accept the write; the caller must not broadcast in that case.
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError>;

    /// All messages of one enquiry thread, oldest first.
    async fn query_scoped(
        &self,
        customer_id: &str,
        vendor_id: &str,
        enquiry_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    /// All messages between a customer and a vendor across every enquiry,
    /// oldest first.
    async fn query_broad(
        &self,
        customer_id: &str,
        vendor_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    /// Every message involving a vendor, newest first. Feeds the vendor
    /// conversation listing.
    async fn query_vendor_threads(&self, vendor_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    /// Every message involving a customer, newest first. Feeds the customer
    /// conversation listing.
    async fn query_customer_threads(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError>;

    /// One thread, newest first (the listing endpoints sort newest-first;
    /// only join-time replay is oldest-first).
    async fn query_thread_desc(
        &self,
        customer_id: &str,
        vendor_id: &str,
        enquiry_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError>;
}
