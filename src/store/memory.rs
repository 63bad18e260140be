// src/store/memory.rs

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use super::MessageStore;
use crate::error::StoreError;
use crate::models::{ChatMessage, NewChatMessage};

/// In-memory message store for tests and simulation.
///
/// Messages are held in append order, which is also `persisted_at` order,
/// so the ascending queries return the underlying vector order and the
/// descending ones reverse it. The `fail_appends` and `fail_queries`
/// switches let a test stand in for a database outage on either side:
/// while set, the affected operations return [`StoreError::Unavailable`]
/// without touching anything.
#[derive(Debug, Default)]
pub struct MemoryMessageStore {
    messages: Mutex<Vec<ChatMessage>>,
    fail_appends: AtomicBool,
    fail_queries: AtomicBool,
}

impl MemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent append fail (or succeed again).
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent query fail (or succeed again).
    pub fn set_fail_queries(&self, fail: bool) {
        self.fail_queries.store(fail, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn filtered<F>(&self, predicate: F, newest_first: bool) -> Result<Vec<ChatMessage>, StoreError>
    where
        F: Fn(&ChatMessage) -> bool,
    {
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "simulated query failure".to_string(),
            ));
        }

        let messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let mut matched: Vec<ChatMessage> =
            messages.iter().filter(|m| predicate(m)).cloned().collect();
        if newest_first {
            matched.reverse();
        }
        Ok(matched)
    }
}

#[async_trait]
impl MessageStore for MemoryMessageStore {
    async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable(
                "simulated append failure".to_string(),
            ));
        }

        let mut messages = self.messages.lock().unwrap_or_else(|e| e.into_inner());
        let persisted = ChatMessage {
            id: messages.len() as i64 + 1,
            customer_id: message.customer_id,
            vendor_id: message.vendor_id,
            enquiry_id: message.enquiry_id,
            sender_role: message.sender_role,
            body: message.body,
            external_timestamp: message.external_timestamp,
            persisted_at: Utc::now(),
        };
        messages.push(persisted.clone());
        Ok(persisted)
    }

    async fn query_scoped(
        &self,
        customer_id: &str,
        vendor_id: &str,
        enquiry_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.filtered(
            |m| {
                m.customer_id == customer_id
                    && m.vendor_id == vendor_id
                    && m.enquiry_id == enquiry_id
            },
            false,
        )
    }

    async fn query_broad(
        &self,
        customer_id: &str,
        vendor_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.filtered(
            |m| m.customer_id == customer_id && m.vendor_id == vendor_id,
            false,
        )
    }

    async fn query_vendor_threads(&self, vendor_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        self.filtered(|m| m.vendor_id == vendor_id, true)
    }

    async fn query_customer_threads(
        &self,
        customer_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.filtered(|m| m.customer_id == customer_id, true)
    }

    async fn query_thread_desc(
        &self,
        customer_id: &str,
        vendor_id: &str,
        enquiry_id: &str,
    ) -> Result<Vec<ChatMessage>, StoreError> {
        self.filtered(
            |m| {
                m.customer_id == customer_id
                    && m.vendor_id == vendor_id
                    && m.enquiry_id == enquiry_id
            },
            true,
        )
    }
}
