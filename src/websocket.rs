// src/websocket.rs

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{
    Stream,
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use tokio::sync::{
    mpsc::{self, UnboundedReceiver},
    oneshot,
};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
    models::{ClientEvent, ServerEvent},
    state::AppState,
};

/// The handler for the realtime chat route.
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Manages the lifecycle of one connection: register with the hub, pump
/// events both ways, and on teardown run the disconnect finalizer exactly
/// once, whichever side closed first.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    let (ws_sender, ws_receiver) = socket.split();

    // Hub -> socket goes through a channel so a slow socket never blocks a
    // broadcast; this task is the only writer to the sink.
    let (tx, rx) = mpsc::unbounded_channel();
    state.hub.register(connection_id, tx).await;

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let mut write_task = tokio::spawn(write_to_client(rx, ws_sender));
    let mut read_task = tokio::spawn(read_from_client(
        ws_receiver,
        connection_id,
        state.clone(),
        shutdown_rx,
    ));

    // The read task is never aborted: a send the transport already
    // accepted must finish its persist and broadcast even though this
    // connection is going away. If the write side dies first we signal the
    // read loop to stop; it drains the event in flight before exiting.
    tokio::select! {
        _ = &mut write_task => {
            let _ = shutdown_tx.send(());
        }
        _ = &mut read_task => write_task.abort(),
    }
    let _ = read_task.await;

    state.hub.disconnect(connection_id).await;
}

/// Drains the connection's event channel into the websocket.
async fn write_to_client(
    mut rx: UnboundedReceiver<ServerEvent>,
    mut ws_sender: SplitSink<WebSocket, Message>,
) {
    while let Some(event) = rx.recv().await {
        let text = match serde_json::to_string(&event) {
            Ok(text) => text,
            Err(err) => {
                warn!(%err, "failed to encode server event");
                continue;
            }
        };
        if ws_sender.send(Message::Text(text.into())).await.is_err() {
            // Socket is gone; the read side will notice and clean up.
            break;
        }
    }
}

/// Reads frames from a client and dispatches decoded events to the hub.
///
/// The shutdown signal is only honored between frames: an event that has
/// already been handed to the hub runs to completion before the loop can
/// exit, so teardown never drops a dispatch at an await point.
async fn read_from_client<S>(
    mut receiver: S,
    connection_id: Uuid,
    state: AppState,
    mut shutdown: oneshot::Receiver<()>,
) where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    loop {
        let msg = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            msg = receiver.next() => msg,
        };
        let Some(Ok(msg)) = msg else {
            break;
        };
        let Message::Text(text) = msg else {
            continue;
        };
        match serde_json::from_str::<ClientEvent>(text.as_str()) {
            Ok(event) => state.hub.dispatch(connection_id, event).await,
            Err(err) => {
                debug!(%connection_id, %err, "undecodable client frame");
                state
                    .hub
                    .report_error(connection_id, &format!("malformed event: {err}"))
                    .await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use futures_util::stream;
    use tokio::sync::Semaphore;

    use super::*;
    use crate::error::StoreError;
    use crate::models::{ChatMessage, JoinRequest, NewChatMessage};
    use crate::store::{MemoryMessageStore, MessageStore};

    /// Store whose appends block until the test hands out a permit.
    struct GatedStore {
        inner: MemoryMessageStore,
        gate: Semaphore,
    }

    impl GatedStore {
        fn new() -> Self {
            Self {
                inner: MemoryMessageStore::new(),
                gate: Semaphore::new(0),
            }
        }

        fn release_one(&self) {
            self.gate.add_permits(1);
        }
    }

    #[async_trait]
    impl MessageStore for GatedStore {
        async fn append(&self, message: NewChatMessage) -> Result<ChatMessage, StoreError> {
            let permit = self
                .gate
                .acquire()
                .await
                .map_err(|err| StoreError::Unavailable(err.to_string()))?;
            permit.forget();
            self.inner.append(message).await
        }

        async fn query_scoped(
            &self,
            customer_id: &str,
            vendor_id: &str,
            enquiry_id: &str,
        ) -> Result<Vec<ChatMessage>, StoreError> {
            self.inner
                .query_scoped(customer_id, vendor_id, enquiry_id)
                .await
        }

        async fn query_broad(
            &self,
            customer_id: &str,
            vendor_id: &str,
        ) -> Result<Vec<ChatMessage>, StoreError> {
            self.inner.query_broad(customer_id, vendor_id).await
        }

        async fn query_vendor_threads(
            &self,
            vendor_id: &str,
        ) -> Result<Vec<ChatMessage>, StoreError> {
            self.inner.query_vendor_threads(vendor_id).await
        }

        async fn query_customer_threads(
            &self,
            customer_id: &str,
        ) -> Result<Vec<ChatMessage>, StoreError> {
            self.inner.query_customer_threads(customer_id).await
        }

        async fn query_thread_desc(
            &self,
            customer_id: &str,
            vendor_id: &str,
            enquiry_id: &str,
        ) -> Result<Vec<ChatMessage>, StoreError> {
            self.inner
                .query_thread_desc(customer_id, vendor_id, enquiry_id)
                .await
        }
    }

    #[tokio::test]
    async fn in_flight_send_survives_connection_teardown() {
        let store = Arc::new(GatedStore::new());
        let state = AppState::new(store.clone() as Arc<dyn MessageStore>);

        // A member that stays connected and should receive the broadcast.
        let member = Uuid::new_v4();
        let (member_tx, mut member_rx) = mpsc::unbounded_channel();
        state.hub.register(member, member_tx).await;
        state
            .hub
            .handle_join(
                member,
                JoinRequest {
                    customer_id: "C1".into(),
                    vendor_id: "V1".into(),
                    enquiry_id: "E1".into(),
                    mode: None,
                },
            )
            .await;
        let _ = member_rx.try_recv(); // replay

        // The sender's transport delivers one message frame and then goes
        // quiet, leaving the dispatch parked inside the store append.
        let sender = Uuid::new_v4();
        let (sender_tx, _sender_rx) = mpsc::unbounded_channel();
        state.hub.register(sender, sender_tx).await;

        let raw = r#"{"event":"message","data":{"customerId":"C1","vendorId":"V1","enquiryId":"E1","senderRole":"customer","body":"mid-flight","externalTimestamp":""}}"#;
        let frame = Message::Text(raw.to_owned().into());
        let frames = stream::iter(vec![Ok::<_, axum::Error>(frame)])
            .chain(stream::pending::<Result<Message, axum::Error>>());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let read_task = tokio::spawn(read_from_client(frames, sender, state.clone(), shutdown_rx));

        // Tear the connection down the way handle_socket does when the
        // write side dies, while the append is still pending.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let _ = shutdown_tx.send(());
        assert!(
            !read_task.is_finished(),
            "teardown must not cancel an in-flight dispatch"
        );

        store.release_one();
        read_task.await.unwrap();
        state.hub.disconnect(sender).await;

        // The message the transport accepted was persisted and the
        // remaining member saw it, sender teardown notwithstanding.
        assert_eq!(store.inner.message_count(), 1);
        match member_rx.try_recv() {
            Ok(ServerEvent::Message(payload)) => assert_eq!(payload.body, "mid-flight"),
            other => panic!("member should receive the in-flight message, got {other:?}"),
        }
    }
}
