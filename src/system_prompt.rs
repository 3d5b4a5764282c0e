//! Prompt text sent to the model
//!
//! The chat instruction goes out with every model call of a turn. The other
//! two are single-shot prompts used by the tools.

/// Instruction accompanying every chat request
pub const SYSTEM_PROMPT: &str = "When you use a tool, always provide a brief textual summary of what the tool did or what you found, in addition to the tool call itself. You can also generate React components with Chakra UI from API documentation. To do this, provide the API documentation to the `generateComponent` tool.";

/// Prompt asking for a short summary of page text fetched from `url`
pub fn summary_prompt(url: &str, content: &str) -> String {
    format!("Summarize the following content from {url} in 3-5 sentences:\n\n{content}")
}

/// Prompt asking for a Chakra UI component built from `api_docs`
pub fn component_prompt(api_docs: &str) -> String {
    format!(
        r"You are an expert in generating beautiful and functional React components using Chakra UI and TypeScript.

Your task is to create a new component based on the provided API documentation.

**Instructions:**
1.  **Analyze the API:** Understand the data structure and the props the component will need.
2.  **Create Props Interface:** Define a clear TypeScript interface for the component's props.
3.  **Build the Component:** Write clean, well-structured JSX with appropriate Chakra UI components (e.g., Box, Stack, Heading, Text, etc.).
4.  **Style with Chakra:** Use Chakra's style props for elegant and responsive design.
5.  **Include a Usage Example:** Provide a clear example of how to import and use the component.
6.  **Format Output:** Respond with the component code and usage example within a single markdown block (e.g., ```tsx ... ```).

**API Documentation:**
```
{api_docs}
```
"
    )
}
