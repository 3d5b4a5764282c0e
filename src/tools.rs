//! Tools the model can call
//!
//! Tools are stateless singletons. Everything a call needs (the model, the
//! fetcher) arrives through `ToolContext`, and every outcome is a value or a
//! `ToolError`; the executor turns both into a `ToolResult`.

mod browse;
mod executor;
pub mod extract;
mod fetch;
mod generate_component;

pub use browse::{BrowseOutput, BrowseTool};
pub use executor::ToolExecutor;
pub use fetch::{FetchError, Fetcher, HttpFetcher};
pub use generate_component::{ComponentOutput, GenerateComponentTool};

use crate::llm::{LlmService, ToolDefinition};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Everything a tool invocation may touch
#[derive(Clone)]
pub struct ToolContext {
    llm: Arc<dyn LlmService>,
    fetcher: Arc<dyn Fetcher>,
}

impl ToolContext {
    pub fn new(llm: Arc<dyn LlmService>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { llm, fetcher }
    }

    /// Text-generation capability
    pub fn llm(&self) -> &Arc<dyn LlmService> {
        &self.llm
    }

    /// Network-fetch capability
    pub fn fetcher(&self) -> &Arc<dyn Fetcher> {
        &self.fetcher
    }
}

/// Ways a tool invocation can fail. The display text is what the model sees.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments did not match the tool's schema; details are only logged
    #[error("invalid arguments")]
    InvalidArguments(Vec<String>),
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    #[error("failed to fetch URL: {0}")]
    Fetch(#[from] FetchError),
    #[error("could not extract text content from the URL")]
    EmptyContent,
    #[error("generation failed: {0}")]
    Generation(String),
    #[error("tool timed out after {}s", .0.as_secs_f64())]
    Timeout(Duration),
    #[error("tool crashed: {0}")]
    Crashed(String),
}

/// Trait for tools that can be executed by the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, as the model sees it
    fn name(&self) -> &'static str;

    /// Tool description for the model
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute with arguments that already passed schema validation
    async fn run(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

/// Registration and lookup failures
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("tool '{0}' is already registered")]
    DuplicateTool(String),
    #[error("tool '{0}' is not registered")]
    NotFound(String),
    #[error("tool '{name}' has an invalid argument schema: {reason}")]
    InvalidSchema { name: String, reason: String },
}

/// A tool together with its compiled argument schema
pub struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: jsonschema::Validator,
}

impl RegisteredTool {
    pub fn tool(&self) -> &Arc<dyn Tool> {
        &self.tool
    }

    /// Check arguments against the schema, collecting every violation
    pub fn validate(&self, arguments: &Value) -> Result<(), Vec<String>> {
        let errors: Vec<String> = self
            .validator
            .iter_errors(arguments)
            .map(|e| e.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Collection of tools available to conversations.
///
/// Filled once at startup and shared read-only afterwards.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<RegisteredTool>,
}

impl ToolRegistry {
    /// Registry with the built-in tools
    pub fn standard() -> Result<Self, RegistryError> {
        let mut registry = Self::default();
        registry.register(Arc::new(BrowseTool))?;
        registry.register(Arc::new(GenerateComponentTool))?;
        Ok(registry)
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name = tool.name();
        if self.tools.iter().any(|t| t.tool.name() == name) {
            return Err(RegistryError::DuplicateTool(name.to_string()));
        }

        let validator =
            jsonschema::validator_for(&tool.input_schema()).map_err(|e| {
                RegistryError::InvalidSchema {
                    name: name.to_string(),
                    reason: e.to_string(),
                }
            })?;

        tracing::debug!(tool = name, "Registered tool");
        self.tools.push(RegisteredTool { tool, validator });
        Ok(())
    }

    pub fn resolve(&self, name: &str) -> Result<&RegisteredTool, RegistryError> {
        self.tools
            .iter()
            .find(|t| t.tool.name() == name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// Get all tool definitions for the model
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.tool.name().to_string(),
                description: t.tool.description(),
                input_schema: t.tool.input_schema(),
            })
            .collect()
    }
}
