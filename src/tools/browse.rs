//! Browse tool - fetch a web page and summarize it
//!
//! The same `BrowseTool::browse` serves the model's tool call and the
//! direct `/tool/browse` endpoint.

use super::extract::{extract_text, truncate_chars};
use super::{Tool, ToolContext, ToolError};
use crate::system_prompt::summary_prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Extracted text beyond this many characters is not sent for summarization
pub const MAX_CONTENT_CHARS: usize = 15_000;

#[derive(Debug, Deserialize)]
struct BrowseInput {
    url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BrowseOutput {
    pub summary: String,
}

pub struct BrowseTool;

impl BrowseTool {
    /// Fetch `url`, reduce it to visible text and summarize it in a few sentences
    pub async fn browse(url: &str, ctx: &ToolContext) -> Result<BrowseOutput, ToolError> {
        let html = ctx.fetcher().fetch(url).await?;

        let text = extract_text(&html);
        if text.is_empty() {
            return Err(ToolError::EmptyContent);
        }

        let content = truncate_chars(&text, MAX_CONTENT_CHARS);
        tracing::debug!(
            url,
            extracted_chars = text.chars().count(),
            sent_chars = content.chars().count(),
            "Summarizing page"
        );

        let summary = ctx
            .llm()
            .generate_text(&summary_prompt(url, &content))
            .await
            .map_err(|e| ToolError::Generation(e.message))?;

        Ok(BrowseOutput {
            summary: summary.trim().to_string(),
        })
    }
}

#[async_trait]
impl Tool for BrowseTool {
    fn name(&self) -> &'static str {
        "browse"
    }

    fn description(&self) -> String {
        "Fetches content from a URL and summarizes it.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["url"],
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The URL to browse"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let input: BrowseInput = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidArguments(vec![e.to_string()]))?;
        let output = Self::browse(&input.url, ctx).await?;
        Ok(json!(output))
    }
}
