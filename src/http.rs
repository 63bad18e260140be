// src/http.rs

//! Chat listing endpoints.
//!
//! These read only from the message store. The conversation listings return
//! the latest message per counterpart plus a message count, newest-first;
//! the single-thread endpoint returns a whole thread newest-first. Only the
//! realtime join replay is oldest-first.

use std::collections::{HashMap, HashSet};

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::error::StoreError;
use crate::models::{ChatMessage, SenderRole};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorChatsQuery {
    pub vendor_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerChatsQuery {
    pub customer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleChatRequest {
    pub customer_id: String,
    pub vendor_id: String,
    pub enquiry_id: String,
}

/// One conversation in a listing: the latest message exchanged with a
/// counterpart and how many messages the conversation holds in total.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    #[serde(rename = "_id")]
    pub id: i64,
    pub enquiry_id: String,
    pub customer_id: String,
    pub vendor_id: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    #[serde(rename = "_id")]
    pub id: i64,
    pub customer_id: String,
    pub vendor_id: String,
    pub enquiry_id: String,
    pub sender_role: SenderRole,
    pub message: String,
    pub external_timestamp: String,
    pub created_at: DateTime<Utc>,
}

pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "Marketplace Chat API" }))
}

/// `GET /api/chat/vendor?vendorId=…` — conversation summaries for a vendor,
/// grouped per customer, newest-first.
pub async fn get_vendor_chats(
    State(state): State<AppState>,
    Query(params): Query<VendorChatsQuery>,
) -> impl IntoResponse {
    let chats = match state.store.query_vendor_threads(&params.vendor_id).await {
        Ok(chats) => chats,
        Err(err) => return store_failure(err),
    };
    let data = summarize(&chats, |chat| chat.customer_id.clone());
    listing_response(data)
}

/// `GET /api/chat/customer?customerId=…` — conversation summaries for a
/// customer, grouped per vendor, newest-first.
pub async fn get_customer_chats(
    State(state): State<AppState>,
    Query(params): Query<CustomerChatsQuery>,
) -> impl IntoResponse {
    let chats = match state
        .store
        .query_customer_threads(&params.customer_id)
        .await
    {
        Ok(chats) => chats,
        Err(err) => return store_failure(err),
    };
    let data = summarize(&chats, |chat| chat.vendor_id.clone());
    listing_response(data)
}

/// `POST /api/chat/single` — every message of one enquiry thread,
/// newest-first.
pub async fn get_single_chat(
    State(state): State<AppState>,
    Json(request): Json<SingleChatRequest>,
) -> impl IntoResponse {
    if request.customer_id.is_empty()
        || request.vendor_id.is_empty()
        || request.enquiry_id.is_empty()
    {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "message": "Please provide all the fields!", "success": false })),
        );
    }

    let chats = match state
        .store
        .query_thread_desc(&request.customer_id, &request.vendor_id, &request.enquiry_id)
        .await
    {
        Ok(chats) => chats,
        Err(err) => return store_failure(err),
    };

    let data: Vec<ThreadMessage> = chats
        .iter()
        .map(|chat| ThreadMessage {
            id: chat.id,
            customer_id: chat.customer_id.clone(),
            vendor_id: chat.vendor_id.clone(),
            enquiry_id: chat.enquiry_id.clone(),
            sender_role: chat.sender_role,
            message: chat.body.clone(),
            external_timestamp: chat.external_timestamp.clone(),
            created_at: chat.persisted_at,
        })
        .collect();

    (
        StatusCode::OK,
        Json(json!({ "data": data, "success": true })),
    )
}

/// Collapse a newest-first message list into one summary per counterpart:
/// the first message seen for a group key is its latest, and every further
/// one bumps the count. Group order follows first appearance, which keeps
/// the listing newest-first.
fn summarize<K: Fn(&ChatMessage) -> String>(
    chats: &[ChatMessage],
    group_key: K,
) -> Vec<ConversationSummary> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for chat in chats {
        *counts.entry(group_key(chat)).or_insert(0) += 1;
    }

    let mut seen: HashSet<String> = HashSet::new();
    let mut summaries = Vec::new();
    for chat in chats {
        let key = group_key(chat);
        if !seen.insert(key.clone()) {
            continue;
        }
        summaries.push(ConversationSummary {
            id: chat.id,
            enquiry_id: chat.enquiry_id.clone(),
            customer_id: chat.customer_id.clone(),
            vendor_id: chat.vendor_id.clone(),
            message: chat.body.clone(),
            created_at: chat.persisted_at,
            count: counts.get(&key).copied().unwrap_or(1),
        });
    }
    summaries
}

fn listing_response(data: Vec<ConversationSummary>) -> (StatusCode, Json<serde_json::Value>) {
    if data.is_empty() {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "message": "No Chat Found!", "success": false })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({ "data": data, "success": true })),
    )
}

fn store_failure(err: StoreError) -> (StatusCode, Json<serde_json::Value>) {
    warn!(%err, "listing query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": err.to_string(), "success": false })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn message(id: i64, customer: &str, vendor: &str, body: &str) -> ChatMessage {
        ChatMessage {
            id,
            customer_id: customer.into(),
            vendor_id: vendor.into(),
            enquiry_id: "E1".into(),
            sender_role: SenderRole::Customer,
            body: body.into(),
            external_timestamp: String::new(),
            persisted_at: Utc.timestamp_opt(1_700_000_000 + id, 0).unwrap(),
        }
    }

    #[test]
    fn summarize_keeps_latest_message_and_counts_per_group() {
        // Newest-first input, two customers talking to one vendor.
        let chats = vec![
            message(4, "C2", "V1", "newest from C2"),
            message(3, "C1", "V1", "newest from C1"),
            message(2, "C2", "V1", "older from C2"),
            message(1, "C1", "V1", "older from C1"),
        ];

        let summaries = summarize(&chats, |c| c.customer_id.clone());
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].customer_id, "C2");
        assert_eq!(summaries[0].message, "newest from C2");
        assert_eq!(summaries[0].count, 2);
        assert_eq!(summaries[1].customer_id, "C1");
        assert_eq!(summaries[1].message, "newest from C1");
        assert_eq!(summaries[1].count, 2);
    }

    #[test]
    fn summarize_empty_input_is_empty() {
        assert!(summarize(&[], |c| c.customer_id.clone()).is_empty());
    }

    #[tokio::test]
    async fn listing_reports_store_failure_as_500() {
        use std::sync::Arc;

        use crate::store::{MemoryMessageStore, MessageStore};

        let store = Arc::new(MemoryMessageStore::new());
        store.set_fail_queries(true);
        let state = AppState::new(store as Arc<dyn MessageStore>);

        let response = get_vendor_chats(
            State(state.clone()),
            Query(VendorChatsQuery {
                vendor_id: "V1".into(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let response = get_single_chat(
            State(state),
            Json(SingleChatRequest {
                customer_id: "C1".into(),
                vendor_id: "V1".into(),
                enquiry_id: "E1".into(),
            }),
        )
        .await
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
