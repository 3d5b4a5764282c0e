//! Server-Sent Events support

use crate::orchestrator::TurnEvent;
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

/// Relay a turn's events as SSE. The stream ends when the turn drops its sink.
pub fn sse_stream(
    events: mpsc::Receiver<TurnEvent>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let stream = ReceiverStream::new(events).map(|event| turn_event_to_axum(&event));

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn turn_event_to_axum(event: &TurnEvent) -> Result<Event, axum::Error> {
    Event::default().event(event.event_name()).json_data(event)
}
