use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, warn};

use super::{
    Agent, AgentAction, AgentDecision, AgentError, AgentFinish, IntermediateStep,
    OutputParserError, ToolRef, format_log_to_str, render_text_description_and_args, tool_names,
};
use crate::rchain::chat_models::ChatModel;
use crate::rchain::messages::Message;
use crate::rchain::prompts::{ChatPromptTemplate, PromptValue, variables};

/// System prompt asking for exactly one JSON action blob per turn.
pub const STRUCTURED_CHAT_SYSTEM: &str = r#"Respond to the human as helpfully and accurately as possible. You have access to the following tools:

{tools}

Use a json blob to specify a tool by providing an action key (tool name) and an action_input key (tool input).

Valid "action" values: "Final Answer" or {tool_names}

Provide only ONE action per $JSON_BLOB, as shown:

```
{{
  "action": $TOOL_NAME,
  "action_input": $INPUT
}}
```

Follow this format:

Question: input question to answer
Thought: consider previous and subsequent steps
Action:
```
$JSON_BLOB
```
Observation: action result
... (repeat Thought/Action/Observation N times)
Thought: I know what to respond
Action:
```
{{
  "action": "Final Answer",
  "action_input": "Final response to human"
}}

Begin! Reminder to ALWAYS respond with a valid json blob of a single action. Use tools if necessary. Respond directly if appropriate. Format is Action:```$JSON_BLOB```then Observation"#;

pub const STRUCTURED_CHAT_HUMAN: &str =
    "{input}\n\n{agent_scratchpad}\n (reminder to respond in a JSON blob no matter what)";

const SCRATCHPAD_PREFIX: &str =
    "This was your previous work (but I haven't seen any of it! I only see what you return as final answer):\n";

static ACTION_BLOB_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json\s+)?(\W.*?)```").expect("fail to create the action blob pattern")
});

/// Reads a fenced `{"action": ..., "action_input": ...}` blob.
///
/// Text without a fenced blob is taken as the final answer.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuredChatOutputParser;

impl StructuredChatOutputParser {
    pub fn parse(&self, text: &str) -> Result<AgentDecision, OutputParserError> {
        let Some(captures) = ACTION_BLOB_RE.captures(text) else {
            return Ok(AgentDecision::Finish(AgentFinish {
                output: text.to_string(),
                log: text.to_string(),
            }));
        };

        let invalid = || OutputParserError::new(format!("Could not parse LLM output: {text}"), text);
        let mut blob: Value = serde_json::from_str(captures[1].trim()).map_err(|_| invalid())?;
        if let Value::Array(items) = blob {
            warn!("Got multiple action responses; using the first one");
            blob = items.into_iter().next().ok_or_else(invalid)?;
        }
        let action = blob["action"].as_str().ok_or_else(invalid)?;
        let action_input = blob.get("action_input").cloned().unwrap_or(Value::Object(Default::default()));

        if action == "Final Answer" {
            let output = match action_input {
                Value::String(output) => output,
                other => other.to_string(),
            };
            return Ok(AgentDecision::Finish(AgentFinish {
                output,
                log: text.to_string(),
            }));
        }
        Ok(AgentDecision::Actions(vec![AgentAction::new(
            action,
            action_input,
            text,
        )]))
    }
}

/// Chat agent that answers with JSON action blobs and sees prior history.
#[derive(Debug, Clone)]
pub struct StructuredChatAgent {
    llm: ChatModel,
    prompt: ChatPromptTemplate,
}

impl StructuredChatAgent {
    pub fn new(llm: &ChatModel, tools: &[ToolRef]) -> Result<Self, AgentError> {
        let prompt = ChatPromptTemplate::from_messages([
            ("system", STRUCTURED_CHAT_SYSTEM),
            ("placeholder", "{chat_history}"),
            ("human", STRUCTURED_CHAT_HUMAN),
        ])?
        .partial("tools", render_text_description_and_args(tools))
        .partial("tool_names", tool_names(tools));
        Ok(Self {
            llm: llm.with_stop(["\nObservation"]),
            prompt,
        })
    }

    pub(crate) fn render(
        &self,
        input: &str,
        chat_history: &[Message],
        steps: &[IntermediateStep],
    ) -> Result<PromptValue, AgentError> {
        let scratchpad = format_log_to_str(steps);
        let scratchpad = if scratchpad.is_empty() {
            scratchpad
        } else {
            format!("{SCRATCHPAD_PREFIX}{scratchpad}")
        };
        let vars = variables([("input", input.to_string()), ("agent_scratchpad", scratchpad)]);
        Ok(self.prompt.format_with_history(&vars, chat_history)?)
    }
}

#[async_trait]
impl Agent for StructuredChatAgent {
    async fn plan(
        &self,
        input: &str,
        chat_history: &[Message],
        steps: &[IntermediateStep],
    ) -> Result<AgentDecision, AgentError> {
        let prompt = self.render(input, chat_history, steps)?;
        let reply = self.llm.invoke(prompt).await?;
        debug!(steps = steps.len(), "structured chat agent replied");
        Ok(StructuredChatOutputParser.parse(&reply.content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::messages::Role;
    use crate::rchain::tools::FnTool;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn parses_tool_action_blob() {
        let text = "Thought: look it up\nAction:\n```json\n{\n  \"action\": \"Wikipedia\",\n  \"action_input\": \"Odysseus\"\n}\n```";
        let AgentDecision::Actions(actions) = StructuredChatOutputParser.parse(text).unwrap() else {
            panic!("expected an action");
        };
        assert_eq!(actions[0].tool, "Wikipedia");
        assert_eq!(actions[0].tool_input, json!("Odysseus"));
    }

    #[test]
    fn final_answer_action_finishes() {
        let text = "Action:\n```\n{\"action\": \"Final Answer\", \"action_input\": \"It is 10:15 AM.\"}\n```";
        let AgentDecision::Finish(finish) = StructuredChatOutputParser.parse(text).unwrap() else {
            panic!("expected a finish");
        };
        assert_eq!(finish.output, "It is 10:15 AM.");
    }

    #[test]
    fn plain_text_is_a_final_answer() {
        let decision = StructuredChatOutputParser.parse("Hello there!").unwrap();
        assert!(matches!(decision, AgentDecision::Finish(finish) if finish.output == "Hello there!"));
    }

    #[test]
    fn broken_blob_is_a_parse_error() {
        let err = StructuredChatOutputParser
            .parse("```\n{\"action\": \"Time\",\n```")
            .unwrap_err();
        assert!(err.message.starts_with("Could not parse LLM output:"));
    }

    #[test]
    fn prompt_splices_history_and_scratchpad() {
        let tools: Vec<ToolRef> = vec![Arc::new(FnTool::new(
            "Time",
            "Useful for when you need to know the current time.",
            |_| Ok(String::new()),
        ))];
        let agent = StructuredChatAgent::new(&ChatModel::openai("gpt-4o"), &tools).unwrap();
        let history = vec![Message::system("You are an AI assistant"), Message::human("hi"), Message::ai("hello")];
        let steps = vec![IntermediateStep {
            action: AgentAction::new("Time", json!({}), "Action: Time"),
            observation: "10:15 AM".to_string(),
        }];
        let prompt = agent.render("What time is it?", &history, &steps).unwrap();
        let messages = prompt.messages();

        assert_eq!(messages.len(), 5);
        assert!(messages[0].content.contains("Time: Useful for when you need to know the current time., args: {\"input\":"));
        assert!(messages[0].content.contains("{\n  \"action\": $TOOL_NAME,"));
        assert_eq!(messages[3].content, "hello");
        assert_eq!(messages[4].role, Role::Human);
        assert_eq!(
            messages[4].content,
            format!("What time is it?\n\n{SCRATCHPAD_PREFIX}Action: Time\nObservation: 10:15 AM\nThought: \n (reminder to respond in a JSON blob no matter what)")
        );
    }
}
