//! Turn events and the channel that carries them to the client

use crate::conversation::{Message, ToolCallRequest, ToolResult};
use serde::Serialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Everything a client observes during one turn, in emission order
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    TextDelta {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCallStarted {
        id: String,
        tool_name: String,
        args: Value,
    },
    ToolResult {
        id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// The sealed transcript, ready to be sent back with the next user message
    TurnComplete {
        messages: Vec<Message>,
    },
    Error {
        kind: &'static str,
        message: String,
    },
}

impl TurnEvent {
    pub fn tool_call_started(call: &ToolCallRequest) -> Self {
        TurnEvent::ToolCallStarted {
            id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            args: call.arguments.clone(),
        }
    }

    pub fn tool_result(result: &ToolResult) -> Self {
        TurnEvent::ToolResult {
            id: result.tool_call_id.clone(),
            output: result.output.clone(),
            error: result.error.clone(),
        }
    }

    /// SSE event name
    pub fn event_name(&self) -> &'static str {
        match self {
            TurnEvent::TextDelta { .. } => "text_delta",
            TurnEvent::ToolCallStarted { .. } => "tool_call_started",
            TurnEvent::ToolResult { .. } => "tool_result",
            TurnEvent::TurnComplete { .. } => "turn_complete",
            TurnEvent::Error { .. } => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TurnEvent::TurnComplete { .. } | TurnEvent::Error { .. })
    }
}

/// Sending half of a turn's event channel.
///
/// Once the receiver is gone the sink goes quiet: later events are dropped
/// and the turn carries on.
#[derive(Clone)]
pub struct EventSink {
    tx: mpsc::Sender<TurnEvent>,
    connected: Arc<AtomicBool>,
}

impl EventSink {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<TurnEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        let sink = Self {
            tx,
            connected: Arc::new(AtomicBool::new(true)),
        };
        (sink, rx)
    }

    pub async fn emit(&self, event: TurnEvent) {
        if !self.is_connected() {
            return;
        }
        if self.tx.send(event).await.is_err() {
            self.connected.store(false, Ordering::Relaxed);
            tracing::info!("Client disconnected, finishing turn without delivering events");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_wire_shape() {
        let started = TurnEvent::tool_call_started(&ToolCallRequest::new(
            "call_1",
            "browse",
            json!({"url": "https://example.com"}),
        ));
        assert_eq!(
            serde_json::to_value(&started).unwrap(),
            json!({
                "type": "tool_call_started",
                "id": "call_1",
                "toolName": "browse",
                "args": {"url": "https://example.com"}
            })
        );

        let failed = TurnEvent::tool_result(&ToolResult::failure("call_1", "boom"));
        assert_eq!(
            serde_json::to_value(&failed).unwrap(),
            json!({"type": "tool_result", "id": "call_1", "error": "boom"})
        );
        assert_eq!(failed.event_name(), "tool_result");
    }

    #[tokio::test]
    async fn test_sink_delivers_in_order() {
        let (sink, mut rx) = EventSink::channel(8);
        for text in ["a", "b", "c"] {
            sink.emit(TurnEvent::TextDelta {
                text: text.to_string(),
            })
            .await;
        }
        drop(sink);

        let mut received = Vec::new();
        while let Some(TurnEvent::TextDelta { text }) = rx.recv().await {
            received.push(text);
        }
        assert_eq!(received, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_sink_goes_quiet_after_disconnect() {
        let (sink, rx) = EventSink::channel(1);
        drop(rx);

        sink.emit(TurnEvent::TextDelta {
            text: "lost".to_string(),
        })
        .await;
        assert!(!sink.is_connected());

        // Clones share the flag
        assert!(!sink.clone().is_connected());
    }
}
