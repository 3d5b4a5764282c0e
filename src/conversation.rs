//! Conversation transcript
//!
//! The ordered record of user input, assistant output, tool calls and tool
//! results. Append operations are the only way to change it, and every append
//! keeps the pairing invariant: a result always answers exactly one earlier
//! call, and a call is answered at most once.

use crate::llm::{ContentBlock, LlmMessage, MessageRole};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRequest {
    pub id: String,
    pub tool_name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    pub fn new(id: impl Into<String>, tool_name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            tool_name: tool_name.into(),
            arguments,
        }
    }
}

/// Outcome of one tool invocation. Exactly one of `output` and `error` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub tool_call_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(tool_call_id: impl Into<String>, output: Value) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: Some(output),
            error: None,
        }
    }

    pub fn failure(tool_call_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call_id.into(),
            output: None,
            error: Some(error.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// The payload handed back to the model
    fn model_content(&self) -> Value {
        match (&self.output, &self.error) {
            (_, Some(error)) => Value::String(error.clone()),
            (Some(output), None) => output.clone(),
            (None, None) => Value::Null,
        }
    }
}

/// A single transcript entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(default = "new_message_id")]
    pub id: String,
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_results: Vec<ToolResult>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: text.into(),
            tool_calls: vec![],
            tool_results: vec![],
        }
    }

    pub fn assistant(text: impl Into<String>, tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: text.into(),
            tool_calls,
            tool_results: vec![],
        }
    }

    pub fn tool(result: ToolResult) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Tool,
            content: String::new(),
            tool_calls: vec![],
            tool_results: vec![result],
        }
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Transcript invariant violations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConversationError {
    #[error("tool call id '{0}' is used more than once")]
    DuplicateToolCallId(String),
    #[error("tool result references unknown tool call '{0}'")]
    UnknownToolCall(String),
    #[error("tool call '{0}' already has a result")]
    DuplicateToolResult(String),
    #[error("tool result for '{0}' must carry exactly one of output or error")]
    AmbiguousToolResult(String),
    #[error("only assistant messages may carry tool calls (message '{0}')")]
    MisplacedToolCalls(String),
    #[error("user messages may not carry tool results (message '{0}')")]
    MisplacedToolResults(String),
    #[error("tool call '{0}' has no result")]
    PendingToolCall(String),
}

/// Call bookkeeping shared by validation and appends
#[derive(Debug, Default, Clone)]
struct CallIndex {
    /// tool call id -> tool name
    calls: HashMap<String, String>,
    answered: HashSet<String>,
}

impl CallIndex {
    fn add_call(&mut self, call: &ToolCallRequest) -> Result<(), ConversationError> {
        if self.calls.contains_key(&call.id) {
            return Err(ConversationError::DuplicateToolCallId(call.id.clone()));
        }
        self.calls.insert(call.id.clone(), call.tool_name.clone());
        Ok(())
    }

    fn check_result(&self, result: &ToolResult) -> Result<(), ConversationError> {
        let id = &result.tool_call_id;
        if result.output.is_some() == result.error.is_some() {
            return Err(ConversationError::AmbiguousToolResult(id.clone()));
        }
        if !self.calls.contains_key(id) {
            return Err(ConversationError::UnknownToolCall(id.clone()));
        }
        if self.answered.contains(id) {
            return Err(ConversationError::DuplicateToolResult(id.clone()));
        }
        Ok(())
    }

    fn add_result(&mut self, result: &ToolResult) -> Result<(), ConversationError> {
        self.check_result(result)?;
        self.answered.insert(result.tool_call_id.clone());
        Ok(())
    }

    fn index_message(&mut self, message: &Message) -> Result<(), ConversationError> {
        if !message.tool_calls.is_empty() && message.role != Role::Assistant {
            return Err(ConversationError::MisplacedToolCalls(message.id.clone()));
        }
        if !message.tool_results.is_empty() && message.role == Role::User {
            return Err(ConversationError::MisplacedToolResults(message.id.clone()));
        }
        // Calls first: an assistant message may answer its own calls
        for call in &message.tool_calls {
            self.add_call(call)?;
        }
        for result in &message.tool_results {
            self.add_result(result)?;
        }
        Ok(())
    }
}

/// The ordered, append-only transcript
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
    index: CallIndex,
}

impl Conversation {
    /// Build from a client-supplied transcript, checking every invariant
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, ConversationError> {
        let mut index = CallIndex::default();
        for message in &messages {
            index.index_message(message)?;
        }
        Ok(Self { messages, index })
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Append an assistant message. Empty `text` alongside tool calls is allowed.
    pub fn push_assistant(
        &mut self,
        text: impl Into<String>,
        tool_calls: Vec<ToolCallRequest>,
    ) -> Result<(), ConversationError> {
        let message = Message::assistant(text, tool_calls);
        let mut index = self.index.clone();
        index.index_message(&message)?;
        self.index = index;
        self.messages.push(message);
        Ok(())
    }

    /// Append the result of a pending tool call as a tool message
    pub fn push_tool_result(&mut self, result: ToolResult) -> Result<(), ConversationError> {
        self.index.add_result(&result)?;
        self.messages.push(Message::tool(result));
        Ok(())
    }

    /// Whether a tool call id is already taken
    pub fn has_tool_call(&self, id: &str) -> bool {
        self.index.calls.contains_key(id)
    }

    /// Calls that have no result yet, in transcript order
    pub fn pending_tool_calls(&self) -> Vec<&ToolCallRequest> {
        self.messages
            .iter()
            .flat_map(|m| &m.tool_calls)
            .filter(|c| !self.index.answered.contains(&c.id))
            .collect()
    }

    /// Fail on the first call still waiting for its result. A new turn can only
    /// start from a transcript where every call has been answered.
    pub fn ensure_settled(&self) -> Result<(), ConversationError> {
        match self.pending_tool_calls().first() {
            Some(call) => Err(ConversationError::PendingToolCall(call.id.clone())),
            None => Ok(()),
        }
    }

    /// Render the transcript for the model
    pub fn to_llm_messages(&self) -> Vec<LlmMessage> {
        let mut out = Vec::new();

        for message in &self.messages {
            match message.role {
                Role::User => {
                    if !message.content.is_empty() {
                        out.push(LlmMessage {
                            role: MessageRole::User,
                            content: vec![ContentBlock::text(&message.content)],
                        });
                    }
                }
                Role::Assistant => {
                    let mut content = Vec::new();
                    if !message.content.is_empty() {
                        content.push(ContentBlock::text(&message.content));
                    }
                    content.extend(message.tool_calls.iter().map(|call| ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.tool_name.clone(),
                        input: call.arguments.clone(),
                    }));
                    if !content.is_empty() {
                        out.push(LlmMessage {
                            role: MessageRole::Assistant,
                            content,
                        });
                    }
                }
                Role::Tool => {}
            }

            // Results go back to the model on the user side, right after their source.
            // A round's results share one message: the model expects every answer to
            // a multi-call turn in the single turn that follows it.
            if !message.tool_results.is_empty() {
                let blocks = message
                    .tool_results
                    .iter()
                    .map(|result| ContentBlock::ToolResult {
                        tool_use_id: result.tool_call_id.clone(),
                        name: self
                            .index
                            .calls
                            .get(&result.tool_call_id)
                            .cloned()
                            .unwrap_or_default(),
                        content: result.model_content(),
                        is_error: result.is_error(),
                    });
                match out.last_mut() {
                    Some(last) if is_tool_result_message(last) => last.content.extend(blocks),
                    _ => out.push(LlmMessage {
                        role: MessageRole::User,
                        content: blocks.collect(),
                    }),
                }
            }
        }

        out
    }
}

fn is_tool_result_message(message: &LlmMessage) -> bool {
    message.role == MessageRole::User
        && message
            .content
            .iter()
            .all(|block| matches!(block, ContentBlock::ToolResult { .. }))
}
