// src/hub.rs

//! Broadcast/replay protocol over the session registry.
//!
//! One lock guards the registry and is held across the store append in
//! [`ChatHub::handle_send`]. That single discipline carries the two ordering
//! obligations of the realtime channel: membership snapshots cannot race a
//! concurrent join or leave, and a message is always durably recorded before
//! any member sees it (persist-then-broadcast, in append order).

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::ChatError;
use crate::models::{
    ClientEvent, JoinRequest, MessagePayload, NewChatMessage, ServerEvent,
};
use crate::registry::{ConnectionId, SessionRegistry};
use crate::room::{RoomKey, RoomMode};
use crate::store::MessageStore;

pub struct ChatHub {
    registry: Mutex<SessionRegistry>,
    store: Arc<dyn MessageStore>,
}

impl ChatHub {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            registry: Mutex::new(SessionRegistry::new()),
            store,
        }
    }

    /// Register a freshly connected client with its outbound channel.
    pub async fn register(
        &self,
        connection_id: ConnectionId,
        sender: tokio::sync::mpsc::UnboundedSender<ServerEvent>,
    ) {
        let mut registry = self.registry.lock().await;
        registry.register(connection_id, sender);
        info!(%connection_id, "client connected");
    }

    /// Route one decoded client event.
    pub async fn dispatch(&self, connection_id: ConnectionId, event: ClientEvent) {
        match event {
            ClientEvent::JoinRoom(join) => self.handle_join(connection_id, join).await,
            ClientEvent::Message(payload) => self.handle_send(connection_id, payload).await,
        }
    }

    /// Join a room and replay its history to the requesting connection only.
    pub async fn handle_join(&self, connection_id: ConnectionId, join: JoinRequest) {
        if let Err(err) = validate_ids(&join.customer_id, &join.vendor_id, &join.enquiry_id) {
            self.report(connection_id, &err).await;
            return;
        }

        let mode = RoomMode::from_request(join.mode.as_deref());
        let room = RoomKey::resolve(&join.customer_id, &join.vendor_id, &join.enquiry_id, mode);

        // The lock is held through the history query so the replay reflects
        // exactly the messages persisted before any broadcast this
        // connection will subsequently receive: no gap, no duplicate.
        let mut registry = self.registry.lock().await;
        if !registry.join(connection_id, room.clone()) {
            // Raced with a disconnect; nothing to do.
            debug!(%connection_id, "join from unknown connection ignored");
            return;
        }
        info!(%connection_id, room = %room, ?mode, "client joined room");

        let history = match mode {
            RoomMode::Scoped => {
                self.store
                    .query_scoped(&join.customer_id, &join.vendor_id, &join.enquiry_id)
                    .await
            }
            RoomMode::Broad => {
                self.store
                    .query_broad(&join.customer_id, &join.vendor_id)
                    .await
            }
        };

        let Some(sender) = registry.sender(connection_id) else {
            return;
        };
        match history {
            Ok(messages) => {
                let replay: Vec<MessagePayload> =
                    messages.iter().map(MessagePayload::from).collect();
                // Requester only - a replay is never broadcast.
                let _ = sender.send(ServerEvent::Replay(replay));
            }
            Err(err) => {
                warn!(%connection_id, room = %room, %err, "history query failed");
                let _ = sender.send(ServerEvent::Error {
                    message: ChatError::from(err).to_string(),
                });
            }
        }
    }

    /// Persist a message, then fan it out to the scoped room.
    ///
    /// The room key is always derived from the payload's triple, regardless
    /// of what room the sender joined under: broad mode widens replay, never
    /// broadcast.
    pub async fn handle_send(&self, connection_id: ConnectionId, payload: MessagePayload) {
        if let Err(err) = validate_ids(
            &payload.customer_id,
            &payload.vendor_id,
            &payload.enquiry_id,
        ) {
            self.report(connection_id, &err).await;
            return;
        }

        let room = RoomKey::scoped(
            &payload.customer_id,
            &payload.vendor_id,
            &payload.enquiry_id,
        );

        let registry = self.registry.lock().await;
        if !registry.has_session(connection_id) {
            debug!(%connection_id, "send from unknown connection ignored");
            return;
        }

        // Persist first; the append happens under the registry lock, which
        // serializes appends for a room with their broadcasts.
        let appended = self
            .store
            .append(NewChatMessage {
                customer_id: payload.customer_id.clone(),
                vendor_id: payload.vendor_id.clone(),
                enquiry_id: payload.enquiry_id.clone(),
                sender_role: payload.sender_role,
                body: payload.body.clone(),
                external_timestamp: payload.external_timestamp.clone(),
            })
            .await;

        match appended {
            Ok(message) => {
                debug!(%connection_id, room = %room, id = message.id, "message persisted");
                for member in registry.members(&room) {
                    // A closed channel means the member is tearing down; its
                    // disconnect will prune the membership.
                    let _ = member.send(ServerEvent::Message(payload.clone()));
                }
            }
            Err(err) => {
                warn!(%connection_id, room = %room, %err, "append failed, not broadcasting");
                if let Some(sender) = registry.sender(connection_id) {
                    let _ = sender.send(ServerEvent::Error {
                        message: ChatError::from(err).to_string(),
                    });
                }
            }
        }
    }

    /// Unconditional finalizer for a connection's lifetime. Idempotent.
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let mut registry = self.registry.lock().await;
        registry.remove(connection_id);
        info!(%connection_id, "client disconnected");
    }

    /// Report a connection-local failure to its origin. Used for validation
    /// failures and undecodable frames; never touches room state.
    pub async fn report_error(&self, connection_id: ConnectionId, message: &str) {
        let registry = self.registry.lock().await;
        if let Some(sender) = registry.sender(connection_id) {
            let _ = sender.send(ServerEvent::Error {
                message: message.to_string(),
            });
        }
    }

    async fn report(&self, connection_id: ConnectionId, err: &ChatError) {
        self.report_error(connection_id, &err.to_string()).await;
    }

    /// Number of live sessions, for observability.
    pub async fn session_count(&self) -> usize {
        self.registry.lock().await.session_count()
    }
}

fn validate_ids(customer_id: &str, vendor_id: &str, enquiry_id: &str) -> Result<(), ChatError> {
    if customer_id.is_empty() || vendor_id.is_empty() || enquiry_id.is_empty() {
        return Err(ChatError::Validation(
            "customerId, vendorId and enquiryId are required".to_string(),
        ));
    }
    Ok(())
}
