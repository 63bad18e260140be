// src/models.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who wrote a chat message. Anything else on the wire is a decode error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderRole {
    Customer,
    Vendor,
}

impl SenderRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderRole::Customer => "customer",
            SenderRole::Vendor => "vendor",
        }
    }
}

impl std::str::FromStr for SenderRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "customer" => Ok(SenderRole::Customer),
            "vendor" => Ok(SenderRole::Vendor),
            other => Err(format!("unknown sender role: {other}")),
        }
    }
}

/// A message as accepted from a sender, before the store assigns its
/// identity. `external_timestamp` is whatever the client supplied and is
/// carried through untouched.
#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub customer_id: String,
    pub vendor_id: String,
    pub enquiry_id: String,
    pub sender_role: SenderRole,
    pub body: String,
    pub external_timestamp: String,
}

/// A persisted chat message. Created exactly once on append, never mutated.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub id: i64,
    pub customer_id: String,
    pub vendor_id: String,
    pub enquiry_id: String,
    pub sender_role: SenderRole,
    pub body: String,
    pub external_timestamp: String,
    pub persisted_at: DateTime<Utc>,
}

/// The wire shape of a message, used both for live broadcasts and for the
/// replay array sent on join.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub customer_id: String,
    pub vendor_id: String,
    pub enquiry_id: String,
    pub sender_role: SenderRole,
    pub body: String,
    pub external_timestamp: String,
}

impl From<&ChatMessage> for MessagePayload {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            customer_id: msg.customer_id.clone(),
            vendor_id: msg.vendor_id.clone(),
            enquiry_id: msg.enquiry_id.clone(),
            sender_role: msg.sender_role,
            body: msg.body.clone(),
            external_timestamp: msg.external_timestamp.clone(),
        }
    }
}

/// A join request from a client. `mode: "all"` widens the replay to every
/// enquiry between the pair; anything else (or absence) keeps it scoped.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinRequest {
    pub customer_id: String,
    pub vendor_id: String,
    pub enquiry_id: String,
    #[serde(default)]
    pub mode: Option<String>,
}

/// An event sent from a client to the server.
/// Deserialized from incoming JSON text.
#[derive(Debug, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "joinRoom")]
    JoinRoom(JoinRequest),
    #[serde(rename = "message")]
    Message(MessagePayload),
}

/// An event sent from the server to a client.
/// Serialized into JSON text for sending.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    /// Reply to a join: prior history for the room, oldest first.
    #[serde(rename = "joinRoom")]
    Replay(Vec<MessagePayload>),
    /// A newly accepted message, fanned out to the scoped room.
    #[serde(rename = "message")]
    Message(MessagePayload),
    /// A connection-local failure. Never broadcast.
    #[serde(rename = "error")]
    Error { message: String },
}
