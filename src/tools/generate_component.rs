//! Component generation tool - React/Chakra UI component from API docs

use super::{Tool, ToolContext, ToolError};
use crate::system_prompt::component_prompt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateComponentInput {
    api_docs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentOutput {
    pub component_code: String,
}

/// Shape the generation capability must produce
fn output_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "componentCode": {
                "type": "string",
                "description": "The React component code with Chakra UI styling."
            }
        },
        "required": ["componentCode"]
    })
}

pub struct GenerateComponentTool;

impl GenerateComponentTool {
    pub async fn generate(api_docs: &str, ctx: &ToolContext) -> Result<ComponentOutput, ToolError> {
        let object = ctx
            .llm()
            .generate_object(&component_prompt(api_docs), &output_schema())
            .await
            .map_err(|e| ToolError::Generation(e.message))?;

        let component_code = object
            .get("componentCode")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|code| !code.is_empty())
            .ok_or_else(|| {
                ToolError::Generation("response did not contain a componentCode".to_string())
            })?;

        Ok(ComponentOutput {
            component_code: component_code.to_string(),
        })
    }
}

#[async_trait]
impl Tool for GenerateComponentTool {
    fn name(&self) -> &'static str {
        "generateComponent"
    }

    fn description(&self) -> String {
        "Generates a React component with Chakra UI styling from provided API documentation."
            .to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["apiDocs"],
            "properties": {
                "apiDocs": {
                    "type": "string",
                    "description": "The API documentation to use for component generation."
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let input: GenerateComponentInput = serde_json::from_value(input)
            .map_err(|e| ToolError::InvalidArguments(vec![e.to_string()]))?;
        let output = Self::generate(&input.api_docs, ctx).await?;
        Ok(json!(output))
    }
}
