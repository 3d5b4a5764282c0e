//! Turn orchestration
//!
//! Drives one chat turn: stream the model's answer, run the tool calls it
//! asks for, feed the results back and repeat until the model answers
//! without tools. The phase machine in `phase` decides which step is legal;
//! this module performs the I/O.

mod events;
mod phase;

pub use events::{EventSink, TurnEvent};
pub use phase::{Signal, TransitionError, TurnPhase};

use crate::conversation::{Conversation, ConversationError, ToolCallRequest};
use crate::llm::{LlmError, LlmRequest, LlmService, StreamChunk};
use crate::system_prompt::SYSTEM_PROMPT;
use crate::tools::ToolExecutor;
use futures::stream::FuturesUnordered;
use futures::StreamExt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Ways a turn can end without completing
#[derive(Debug, Error)]
pub enum TurnError {
    #[error("Turn exceeded its {}s budget", .0.as_secs())]
    Timeout(Duration),
    #[error("Model request failed: {0}")]
    Model(#[from] LlmError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error("Conversation invariant violated: {0}")]
    Conversation(#[from] ConversationError),
}

impl TurnError {
    /// Stable identifier sent with the error event
    pub fn kind(&self) -> &'static str {
        match self {
            TurnError::Timeout(_) => "timeout",
            TurnError::Model(_) => "upstream",
            TurnError::Transition(TransitionError::RoundLimit(_)) => "round_limit",
            TurnError::Transition(TransitionError::InvalidTransition(_))
            | TurnError::Conversation(_) => "internal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Budget for a whole turn
    pub turn_timeout: Duration,
    /// Tool rounds allowed before the turn is cut off
    pub max_tool_rounds: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            turn_timeout: Duration::from_secs(30),
            max_tool_rounds: 5,
        }
    }
}

/// Runs chat turns against one model and one tool executor
#[derive(Clone)]
pub struct Orchestrator {
    llm: Arc<dyn LlmService>,
    executor: Arc<ToolExecutor>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(
        llm: Arc<dyn LlmService>,
        executor: Arc<ToolExecutor>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            llm,
            executor,
            config,
        }
    }

    /// Run one turn to completion, reporting progress through `sink`.
    ///
    /// Always ends the event sequence with `TurnComplete` or `Error`. The
    /// returned conversation includes everything appended during the turn.
    pub async fn run_turn(
        &self,
        mut conversation: Conversation,
        sink: EventSink,
    ) -> Result<Conversation, TurnError> {
        let start = Instant::now();
        let driven = tokio::time::timeout(
            self.config.turn_timeout,
            self.drive(&mut conversation, &sink),
        )
        .await
        .unwrap_or(Err(TurnError::Timeout(self.config.turn_timeout)));

        match driven {
            Ok(()) => {
                tracing::info!(
                    messages = conversation.len(),
                    duration_ms = %start.elapsed().as_millis(),
                    "Turn complete"
                );
                sink.emit(TurnEvent::TurnComplete {
                    messages: conversation.messages().to_vec(),
                })
                .await;
                Ok(conversation)
            }
            Err(e) => {
                tracing::warn!(
                    kind = e.kind(),
                    error = %e,
                    duration_ms = %start.elapsed().as_millis(),
                    "Turn failed"
                );
                sink.emit(TurnEvent::Error {
                    kind: e.kind(),
                    message: e.to_string(),
                })
                .await;
                Err(e)
            }
        }
    }

    async fn drive(
        &self,
        conversation: &mut Conversation,
        sink: &EventSink,
    ) -> Result<(), TurnError> {
        conversation.ensure_settled()?;
        let max_rounds = self.config.max_tool_rounds;
        let tools = self.executor.definitions();
        let mut phase = TurnPhase::start();

        loop {
            let request = LlmRequest {
                system: Some(SYSTEM_PROMPT.to_string()),
                messages: conversation.to_llm_messages(),
                tools: tools.clone(),
                ..LlmRequest::default()
            };
            tracing::debug!(round = ?phase.round(), messages = request.messages.len(), "Invoking model");

            let mut stream = self.llm.stream(&request).await?;
            let mut text = String::new();
            let mut calls: Vec<ToolCallRequest> = Vec::new();

            while let Some(chunk) = stream.next().await {
                match chunk? {
                    StreamChunk::TextDelta(delta) => {
                        if delta.is_empty() {
                            continue;
                        }
                        phase = phase.advance(Signal::TextDelta, max_rounds)?;
                        text.push_str(&delta);
                        sink.emit(TurnEvent::TextDelta { text: delta }).await;
                    }
                    StreamChunk::ToolUse { id, name, input } => {
                        phase = phase.advance(Signal::ToolCall, max_rounds)?;
                        let id = assign_call_id(id, conversation, &calls);
                        calls.push(ToolCallRequest::new(id, name, input));
                    }
                    StreamChunk::Finished { .. } => {}
                }
            }

            phase = phase.advance(Signal::ModelDone, max_rounds)?;
            conversation.push_assistant(text, calls.clone())?;

            if phase == TurnPhase::TurnComplete {
                return Ok(());
            }

            phase = phase.advance(Signal::Dispatch, max_rounds)?;
            phase = self
                .dispatch_round(phase, &calls, conversation, sink)
                .await?;
        }
    }

    /// Run every call of the round concurrently, appending results as they land
    async fn dispatch_round(
        &self,
        mut phase: TurnPhase,
        calls: &[ToolCallRequest],
        conversation: &mut Conversation,
        sink: &EventSink,
    ) -> Result<TurnPhase, TurnError> {
        for call in calls {
            tracing::info!(tool = %call.tool_name, id = %call.id, "Dispatching tool call");
            sink.emit(TurnEvent::tool_call_started(call)).await;
        }

        let mut pending: FuturesUnordered<_> = calls
            .iter()
            .map(|call| self.executor.execute(call))
            .collect();

        while let Some(result) = pending.next().await {
            sink.emit(TurnEvent::tool_result(&result)).await;
            conversation.push_tool_result(result)?;
            phase = phase.advance(Signal::ToolResultReceived, self.config.max_tool_rounds)?;
        }

        Ok(phase)
    }
}

/// Keep the model's id when it is usable, otherwise mint one
fn assign_call_id(
    proposed: Option<String>,
    conversation: &Conversation,
    round: &[ToolCallRequest],
) -> String {
    match proposed {
        Some(id)
            if !id.is_empty()
                && !conversation.has_tool_call(&id)
                && !round.iter().any(|c| c.id == id) =>
        {
            id
        }
        _ => format!("call_{}", uuid::Uuid::new_v4().simple()),
    }
}
