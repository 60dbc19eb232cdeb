use crate::startup::AppState;
use axum::{
    extract::{
        Extension,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};

/// Handle WebSocket upgrade request
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

/// One client: inbound `answer:input` votes, outbound hub events.
///
/// Closing the socket only unsubscribes. Votes that were already queued are
/// still applied and broadcast to everyone else.
async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let mut subscription = app_state.hub.subscribe();
    let conn_id = subscription.id();
    info!(%conn_id, "New connection");

    let send_task = tokio::spawn(async move {
        while let Some(event) = subscription.next().await {
            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    error!(%conn_id, "Failed to encode {} event: {}", event.name(), e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                // Failures are logged inside the adapter; the socket stays open.
                let _ = app_state.ingress.handle_raw(&text).await;
            }
            Ok(Message::Close(_)) => break,
            Err(e) => {
                warn!(%conn_id, "WebSocket error: {}", e);
                break;
            }
            _ => {}
        }
    }

    send_task.abort();
    app_state.hub.unsubscribe(conn_id);
    info!(%conn_id, "Socket disconnected");
}
