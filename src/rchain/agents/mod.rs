//! Tool-using agents and the loop that drives them.
//!
//! An [`Agent`] looks at the input and the steps taken so far and either
//! requests tool calls or finishes. [`AgentExecutor`] runs the tools, feeds
//! observations back and stops on a final answer or the iteration limit.

mod executor;
mod react;
mod structured_chat;
mod tool_calling;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::rchain::messages::Message;
use crate::rchain::prompts::TemplateError;
use crate::rchain::provider::ProviderError;
use crate::rchain::tools::Tool;

pub use executor::{AgentExecutor, AgentOutput};
pub use react::{ReActAgent, ReActOutputParser};
pub use structured_chat::{StructuredChatAgent, StructuredChatOutputParser};
pub use tool_calling::ToolCallingAgent;

/// Shared handle to a tool.
pub type ToolRef = Arc<dyn Tool>;

/// Model output that could not be read as an action or a final answer.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct OutputParserError {
    pub message: String,
    /// Text to feed back to the model instead of the generic retry hint.
    pub observation: Option<String>,
    pub llm_output: String,
}

impl OutputParserError {
    pub fn new(message: impl Into<String>, llm_output: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            observation: None,
            llm_output: llm_output.into(),
        }
    }

    pub fn with_observation(mut self, observation: impl Into<String>) -> Self {
        self.observation = Some(observation.into());
        self
    }
}

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    OutputParser(#[from] OutputParserError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// One tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentAction {
    pub tool: String,
    pub tool_input: Value,
    /// Raw model text that produced the action.
    pub log: String,
    pub tool_call_id: Option<String>,
    /// Assistant message carrying native tool calls.
    pub message: Option<Message>,
}

impl AgentAction {
    pub fn new(tool: impl Into<String>, tool_input: Value, log: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            tool_input,
            log: log.into(),
            tool_call_id: None,
            message: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AgentFinish {
    pub output: String,
    pub log: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AgentDecision {
    Actions(Vec<AgentAction>),
    Finish(AgentFinish),
}

/// A completed action together with what the tool returned.
#[derive(Debug, Clone, PartialEq)]
pub struct IntermediateStep {
    pub action: AgentAction,
    pub observation: String,
}

#[async_trait]
pub trait Agent: Send + Sync {
    async fn plan(
        &self,
        input: &str,
        chat_history: &[Message],
        steps: &[IntermediateStep],
    ) -> Result<AgentDecision, AgentError>;
}

/// `name: description` per tool, one per line.
pub fn render_text_description(tools: &[ToolRef]) -> String {
    tools
        .iter()
        .map(|tool| format!("{}: {}", tool.name(), tool.description()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Like [`render_text_description`] with each tool's argument schema appended.
pub fn render_text_description_and_args(tools: &[ToolRef]) -> String {
    tools
        .iter()
        .map(|tool| {
            let schema = tool.definition().function.to_schema();
            format!(
                "{}: {}, args: {}",
                tool.name(),
                tool.description(),
                schema["properties"]
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn tool_names(tools: &[ToolRef]) -> String {
    tools
        .iter()
        .map(|tool| tool.name().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replays previous steps as `log`, `Observation:` and a fresh `Thought:`.
pub fn format_log_to_str(steps: &[IntermediateStep]) -> String {
    let mut thoughts = String::new();
    for step in steps {
        thoughts.push_str(&step.action.log);
        thoughts.push_str("\nObservation: ");
        thoughts.push_str(&step.observation);
        thoughts.push_str("\nThought: ");
    }
    thoughts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::tools::{FnTool, ToolParam};
    use serde_json::json;

    fn tools() -> Vec<ToolRef> {
        vec![
            Arc::new(FnTool::new("Time", "Useful for when you need to know the current time", |_| {
                Ok("10:15 AM".to_string())
            })),
            Arc::new(
                FnTool::new("Wikipedia", "Useful for when you need to find information about a topic.", |_| {
                    Ok(String::new())
                })
                .with_param(ToolParam::string("query", "Topic")),
            ),
        ]
    }

    #[test]
    fn renders_tool_descriptions() {
        let tools = tools();
        assert_eq!(
            render_text_description(&tools),
            "Time: Useful for when you need to know the current time\n\
             Wikipedia: Useful for when you need to find information about a topic."
        );
        assert_eq!(tool_names(&tools), "Time, Wikipedia");
        assert!(render_text_description_and_args(&tools)
            .contains(r#"Wikipedia: Useful for when you need to find information about a topic., args: {"query":"#));
    }

    #[test]
    fn log_replays_observations() {
        let steps = vec![IntermediateStep {
            action: AgentAction::new("Time", json!(""), "Thought: check the clock\nAction: Time\nAction Input: "),
            observation: "10:15 AM".to_string(),
        }];
        assert_eq!(
            format_log_to_str(&steps),
            "Thought: check the clock\nAction: Time\nAction Input: \nObservation: 10:15 AM\nThought: "
        );
    }
}
