use crate::startup::AppState;
use axum::{
    extract::Extension,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use serde_json::json;
use std::{convert::Infallible, time::Duration};
use tokio_stream::StreamExt;

/// Read-only live feed: an `init` snapshot of every poll, then every event the
/// hub publishes.
pub async fn events_sse(
    Extension(app_state): Extension<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Subscribe before the snapshot so nothing published in between is missed.
    let mut subscription = app_state.hub.subscribe();
    info!(subscriber = %subscription.id(), "SSE client connected");

    let stream = async_stream::stream! {
        match app_state.ingress.list_polls().await {
            Ok(polls) => {
                yield Ok(Event::default()
                    .event("init")
                    .data(json!({"polls": polls}).to_string()));
            }
            Err(e) => {
                error!("Error fetching votes for SSE init: {}", e);
                yield Ok(Event::default()
                    .event("error")
                    .data(json!({"error": "Failed to load polls"}).to_string()));
            }
        }

        while let Some(event) = subscription.next().await {
            match event.data_json() {
                Ok(data) => yield Ok(Event::default().event(event.name()).data(data)),
                Err(e) => {
                    error!(event = event.name(), poll_id = %event.poll_id(), "Failed to encode SSE event: {}", e);
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("keep-alive"),
    )
}
