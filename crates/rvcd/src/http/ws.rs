//! WebSocket upgrade handler (§4.11, §6). The first text frame a
//! client sends, if any, is parsed as a [`SubscriptionFilter`];
//! otherwise the subscription defaults to all entity updates, no raw
//! CAN traffic, per §6.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use rvc_broadcast::{SubscriptionFilter, WireEvent};
use tokio::time::{timeout, Duration};
use tracing::{debug, warn};

use super::state::AppState;

const FIRST_MESSAGE_WAIT: Duration = Duration::from_millis(500);

pub async fn handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| subscription_task(state, socket))
}

async fn subscription_task(state: AppState, mut socket: WebSocket) {
    let filter = match timeout(FIRST_MESSAGE_WAIT, socket.recv()).await {
        Ok(Some(Ok(Message::Text(text)))) => serde_json::from_str(&text).unwrap_or_default(),
        _ => SubscriptionFilter::default(),
    };

    let (subscription_id, mut receiver) = state.broadcaster.subscribe(filter).await;
    debug!(%subscription_id, "websocket subscription opened");

    loop {
        tokio::select! {
            event = receiver.recv() => {
                let Some(event) = event else {
                    debug!(%subscription_id, "subscription closed, ending websocket");
                    break;
                };
                let wire: WireEvent = event.into();
                let payload = match serde_json::to_string(&wire) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(%subscription_id, error = %err, "failed to encode outbound event");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    break;
                }
            }
            incoming = socket.recv() => {
                if incoming.is_none() {
                    break;
                }
            }
        }
    }

    state.broadcaster.unsubscribe(subscription_id).await;
}
