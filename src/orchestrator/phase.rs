//! Pure phase transitions for one chat turn
//!
//! `advance` performs no I/O: given a phase and a signal it yields the next
//! phase or refuses the transition.

use thiserror::Error;

/// Where a turn currently is. `round` counts completed tool rounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// Model invoked, nothing received yet
    AwaitingModel { round: u32 },
    /// Forwarding text deltas
    StreamingText { round: u32 },
    /// The model has requested `calls` tool invocations this round
    EmittingToolCalls { round: u32, calls: usize },
    /// Tools running; `outstanding` results still to come
    AwaitingToolResults { round: u32, outstanding: usize },
    TurnComplete,
}

/// Something that happened while driving the turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    TextDelta,
    ToolCall,
    /// The model stream ended
    ModelDone,
    /// The round's tool calls are about to be dispatched
    Dispatch,
    ToolResultReceived,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Model kept requesting tools after {0} rounds")]
    RoundLimit(u32),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

impl TurnPhase {
    pub fn start() -> Self {
        TurnPhase::AwaitingModel { round: 0 }
    }

    /// Completed tool rounds, or `None` once the turn is over
    pub fn round(self) -> Option<u32> {
        match self {
            TurnPhase::AwaitingModel { round }
            | TurnPhase::StreamingText { round }
            | TurnPhase::EmittingToolCalls { round, .. }
            | TurnPhase::AwaitingToolResults { round, .. } => Some(round),
            TurnPhase::TurnComplete => None,
        }
    }

    pub fn advance(self, signal: Signal, max_tool_rounds: u32) -> Result<Self, TransitionError> {
        match (self, signal) {
            (
                TurnPhase::AwaitingModel { round } | TurnPhase::StreamingText { round },
                Signal::TextDelta,
            ) => Ok(TurnPhase::StreamingText { round }),

            (
                TurnPhase::AwaitingModel { round } | TurnPhase::StreamingText { round },
                Signal::ToolCall,
            ) => Ok(TurnPhase::EmittingToolCalls { round, calls: 1 }),

            // No tool calls: the assistant message is final
            (
                TurnPhase::AwaitingModel { .. } | TurnPhase::StreamingText { .. },
                Signal::ModelDone,
            ) => Ok(TurnPhase::TurnComplete),

            (TurnPhase::EmittingToolCalls { round, calls }, Signal::ToolCall) => {
                Ok(TurnPhase::EmittingToolCalls {
                    round,
                    calls: calls + 1,
                })
            }

            // Text after a tool call in the same response is still forwarded
            (phase @ TurnPhase::EmittingToolCalls { .. }, Signal::TextDelta | Signal::ModelDone) => {
                Ok(phase)
            }

            (TurnPhase::EmittingToolCalls { round, calls }, Signal::Dispatch) => {
                if round >= max_tool_rounds {
                    Err(TransitionError::RoundLimit(max_tool_rounds))
                } else {
                    Ok(TurnPhase::AwaitingToolResults {
                        round,
                        outstanding: calls,
                    })
                }
            }

            (TurnPhase::AwaitingToolResults { round, outstanding }, Signal::ToolResultReceived) => {
                if outstanding > 1 {
                    Ok(TurnPhase::AwaitingToolResults {
                        round,
                        outstanding: outstanding - 1,
                    })
                } else {
                    Ok(TurnPhase::AwaitingModel { round: round + 1 })
                }
            }

            (phase, signal) => Err(TransitionError::InvalidTransition(format!(
                "{signal:?} in {phase:?}"
            ))),
        }
    }
}
