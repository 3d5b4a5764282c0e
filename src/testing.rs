//! Mock implementations for testing
//!
//! Scripted stand-ins for the model and the network, plus a few tools with
//! predictable behavior for exercising the executor and orchestrator.

use crate::llm::{
    ContentBlock, LlmError, LlmRequest, LlmResponse, LlmService, LlmStream, StreamChunk, Usage,
};
use crate::tools::{FetchError, Fetcher, Tool, ToolContext, ToolError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Mock LLM
// ============================================================================

enum ScriptedStream {
    Items(Vec<Result<StreamChunk, LlmError>>),
    OpenError(LlmError),
    /// Never yields anything
    Hang,
}

/// Mock LLM service that plays back queued streams and completions
pub struct MockLlm {
    streams: Mutex<VecDeque<ScriptedStream>>,
    /// Played whenever the stream queue is empty
    repeating: Mutex<Option<Vec<StreamChunk>>>,
    completions: Mutex<VecDeque<Result<LlmResponse, LlmError>>>,
    stream_requests: Mutex<Vec<LlmRequest>>,
    complete_requests: Mutex<Vec<LlmRequest>>,
}

impl MockLlm {
    pub fn new() -> Self {
        Self {
            streams: Mutex::new(VecDeque::new()),
            repeating: Mutex::new(None),
            completions: Mutex::new(VecDeque::new()),
            stream_requests: Mutex::new(Vec::new()),
            complete_requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a stream that yields `chunks` and ends
    pub fn queue_stream(&self, chunks: Vec<StreamChunk>) {
        self.queue_stream_items(chunks.into_iter().map(Ok).collect());
    }

    /// Queue a stream whose items may include mid-stream errors
    pub fn queue_stream_items(&self, items: Vec<Result<StreamChunk, LlmError>>) {
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Items(items));
    }

    /// Queue a stream that fails to open
    pub fn queue_stream_error(&self, error: LlmError) {
        self.streams
            .lock()
            .unwrap()
            .push_back(ScriptedStream::OpenError(error));
    }

    /// Queue a stream that opens but never produces a chunk
    pub fn queue_hanging_stream(&self) {
        self.streams.lock().unwrap().push_back(ScriptedStream::Hang);
    }

    /// Answer every stream request beyond the queue with `chunks`
    pub fn repeat_stream(&self, chunks: Vec<StreamChunk>) {
        *self.repeating.lock().unwrap() = Some(chunks);
    }

    /// Queue a completion whose only content is `text`
    pub fn queue_text(&self, text: impl Into<String>) {
        self.completions.lock().unwrap().push_back(Ok(LlmResponse {
            content: vec![ContentBlock::text(text)],
            usage: Usage::default(),
        }));
    }

    pub fn queue_complete_error(&self, error: LlmError) {
        self.completions.lock().unwrap().push_back(Err(error));
    }

    pub fn stream_requests(&self) -> Vec<LlmRequest> {
        self.stream_requests.lock().unwrap().clone()
    }

    pub fn complete_requests(&self) -> Vec<LlmRequest> {
        self.complete_requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for MockLlm {
    async fn stream(&self, request: &LlmRequest) -> Result<LlmStream, LlmError> {
        self.stream_requests.lock().unwrap().push(request.clone());

        let scripted = self.streams.lock().unwrap().pop_front();
        let scripted = match scripted {
            Some(s) => s,
            None => match self.repeating.lock().unwrap().clone() {
                Some(chunks) => ScriptedStream::Items(chunks.into_iter().map(Ok).collect()),
                None => ScriptedStream::OpenError(LlmError::network("No mock stream queued")),
            },
        };

        match scripted {
            ScriptedStream::Items(items) => Ok(Box::pin(futures::stream::iter(items))),
            ScriptedStream::OpenError(e) => Err(e),
            ScriptedStream::Hang => Ok(Box::pin(futures::stream::pending::<
                Result<StreamChunk, LlmError>,
            >())),
        }
    }

    async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        self.complete_requests.lock().unwrap().push(request.clone());
        self.completions
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::network("No mock response queued")))
    }

    fn model_id(&self) -> &str {
        "mock-model"
    }
}

// ============================================================================
// Mock Fetcher
// ============================================================================

/// Fetcher answering from a fixed table; unknown URLs are unreachable
pub struct MockFetcher {
    pages: Mutex<HashMap<String, Result<String, FetchError>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
        }
    }

    pub fn insert(&self, url: impl Into<String>, response: Result<String, FetchError>) {
        self.pages.lock().unwrap().insert(url.into(), response);
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.pages
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Unreachable(format!("no route to {url}"))))
    }
}

/// A tool context backed by fresh mocks, returned alongside them
pub fn test_context() -> (ToolContext, Arc<MockLlm>, Arc<MockFetcher>) {
    let llm = Arc::new(MockLlm::new());
    let fetcher = Arc::new(MockFetcher::new());
    let ctx = ToolContext::new(llm.clone(), fetcher.clone());
    (ctx, llm, fetcher)
}

// ============================================================================
// Test tools
// ============================================================================

/// `echo {value}` -> `{echo: value}`
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn description(&self) -> String {
        "Echoes its input".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["value"],
            "properties": { "value": { "type": "string" } }
        })
    }

    async fn run(&self, input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        Ok(json!({ "echo": input["value"] }))
    }
}

/// Always fails
pub struct FailingTool;

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &'static str {
        "explode"
    }

    fn description(&self) -> String {
        "Always fails".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn run(&self, _input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        Err(ToolError::Generation("boom".to_string()))
    }
}

/// Sleeps for `millis` before answering
pub struct SlowTool;

#[async_trait]
impl Tool for SlowTool {
    fn name(&self) -> &'static str {
        "slow"
    }

    fn description(&self) -> String {
        "Sleeps, then answers".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["millis"],
            "properties": { "millis": { "type": "integer", "minimum": 0 } }
        })
    }

    async fn run(&self, input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let millis = input["millis"].as_u64().unwrap_or(0);
        tokio::time::sleep(Duration::from_millis(millis)).await;
        Ok(json!({ "slept": millis }))
    }
}

/// Panics when run
pub struct PanickingTool;

#[async_trait]
impl Tool for PanickingTool {
    fn name(&self) -> &'static str {
        "panic"
    }

    fn description(&self) -> String {
        "Panics".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object" })
    }

    async fn run(&self, _input: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        panic!("tool panicked on purpose");
    }
}
