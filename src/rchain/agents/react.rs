use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::{
    Agent, AgentAction, AgentDecision, AgentError, AgentFinish, IntermediateStep,
    OutputParserError, ToolRef, format_log_to_str, render_text_description, tool_names,
};
use crate::rchain::chat_models::ChatModel;
use crate::rchain::messages::Message;
use crate::rchain::prompts::{PromptTemplate, variables};

/// The widely used ReAct prompt: Thought, Action, Action Input, Observation.
pub const REACT_PROMPT: &str = "Answer the following questions as best you can. You have access to the following tools:

{tools}

Use the following format:

Question: the input question you must answer
Thought: you should always think about what to do
Action: the action to take, should be one of [{tool_names}]
Action Input: the input to the action
Observation: the result of the action
... (this Thought/Action/Action Input/Observation can repeat N times)
Thought: I now know the final answer
Final Answer: the final answer to the original input question

Begin!

Question: {input}
Thought:{agent_scratchpad}";

const FINAL_ANSWER_ACTION: &str = "Final Answer:";
const MISSING_ACTION_AFTER_THOUGHT: &str = "Invalid Format: Missing 'Action:' after 'Thought:'";
const MISSING_ACTION_INPUT_AFTER_ACTION: &str =
    "Invalid Format: Missing 'Action Input:' after 'Action:'";
const FINAL_ANSWER_AND_PARSABLE_ACTION: &str =
    "Parsing LLM output produced both a final answer and a parse-able action:";

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)")
        .expect("fail to create the action pattern")
});
static ACTION_ONLY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)Action\s*\d*\s*:[\s]*(.*?)").expect("fail to create the action pattern"));
static ACTION_INPUT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)[\s]*Action\s*\d*\s*Input\s*\d*\s*:[\s]*(.*)").expect("fail to create the action pattern")
});

/// Reads `Action:`/`Action Input:` pairs or a `Final Answer:` from model text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReActOutputParser;

impl ReActOutputParser {
    pub fn parse(&self, text: &str) -> Result<AgentDecision, OutputParserError> {
        let includes_answer = text.contains(FINAL_ANSWER_ACTION);
        if let Some(captures) = ACTION_RE.captures(text) {
            if includes_answer {
                return Err(OutputParserError::new(
                    format!("{FINAL_ANSWER_AND_PARSABLE_ACTION} {text}"),
                    text,
                ));
            }
            let tool = captures[1].trim().to_string();
            let tool_input = captures[2].trim_matches(' ').trim_matches('"').to_string();
            return Ok(AgentDecision::Actions(vec![AgentAction::new(
                tool,
                Value::String(tool_input),
                text,
            )]));
        }

        if includes_answer {
            let output = text
                .rsplit(FINAL_ANSWER_ACTION)
                .next()
                .unwrap_or_default()
                .trim()
                .to_string();
            return Ok(AgentDecision::Finish(AgentFinish {
                output,
                log: text.to_string(),
            }));
        }

        let message = format!("Could not parse LLM output: `{text}`");
        if !ACTION_ONLY_RE.is_match(text) {
            Err(OutputParserError::new(message, text).with_observation(MISSING_ACTION_AFTER_THOUGHT))
        } else if !ACTION_INPUT_RE.is_match(text) {
            Err(OutputParserError::new(message, text)
                .with_observation(MISSING_ACTION_INPUT_AFTER_ACTION))
        } else {
            Err(OutputParserError::new(message, text))
        }
    }
}

/// Text-protocol agent; the model stops before writing its own observation.
#[derive(Debug, Clone)]
pub struct ReActAgent {
    llm: ChatModel,
    prompt: PromptTemplate,
}

impl ReActAgent {
    pub fn new(llm: &ChatModel, tools: &[ToolRef]) -> Result<Self, AgentError> {
        Self::with_prompt(llm, tools, REACT_PROMPT)
    }

    /// Uses a custom template with `{tools}`, `{tool_names}`, `{input}` and
    /// `{agent_scratchpad}` slots.
    pub fn with_prompt(llm: &ChatModel, tools: &[ToolRef], template: &str) -> Result<Self, AgentError> {
        let prompt = PromptTemplate::from_template(template)?
            .partial("tools", render_text_description(tools))
            .partial("tool_names", tool_names(tools));
        Ok(Self {
            llm: llm.with_stop(["\nObservation"]),
            prompt,
        })
    }

    pub(crate) fn render(&self, input: &str, steps: &[IntermediateStep]) -> Result<String, AgentError> {
        let vars = variables([
            ("input", input.to_string()),
            ("agent_scratchpad", format_log_to_str(steps)),
        ]);
        Ok(self.prompt.format(&vars)?)
    }
}

#[async_trait]
impl Agent for ReActAgent {
    async fn plan(
        &self,
        input: &str,
        _chat_history: &[Message],
        steps: &[IntermediateStep],
    ) -> Result<AgentDecision, AgentError> {
        let prompt = self.render(input, steps)?;
        let reply = self.llm.invoke(prompt).await?;
        debug!(steps = steps.len(), "react agent replied");
        Ok(ReActOutputParser.parse(&reply.content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::tools::FnTool;
    use std::sync::Arc;

    #[test]
    fn parses_action_and_strips_quotes() {
        let text = "I should check the time.\nAction: Time\nAction Input: \"now\"";
        let AgentDecision::Actions(actions) = ReActOutputParser.parse(text).unwrap() else {
            panic!("expected an action");
        };
        assert_eq!(actions[0].tool, "Time");
        assert_eq!(actions[0].tool_input, Value::String("now".to_string()));
        assert_eq!(actions[0].log, text);
    }

    #[test]
    fn parses_final_answer() {
        let text = "I now know the final answer\nFinal Answer: It is 10:15 AM.";
        assert_eq!(
            ReActOutputParser.parse(text).unwrap(),
            AgentDecision::Finish(AgentFinish {
                output: "It is 10:15 AM.".to_string(),
                log: text.to_string(),
            })
        );
    }

    #[test]
    fn both_answer_and_action_is_an_error() {
        let text = "Action: Time\nAction Input: now\nFinal Answer: noon";
        let err = ReActOutputParser.parse(text).unwrap_err();
        assert!(err.message.starts_with(FINAL_ANSWER_AND_PARSABLE_ACTION));
    }

    #[test]
    fn missing_action_feeds_back_format_hint() {
        let err = ReActOutputParser.parse("I am not sure what to do").unwrap_err();
        assert_eq!(err.observation.as_deref(), Some(MISSING_ACTION_AFTER_THOUGHT));

        let err = ReActOutputParser.parse("Action: Time").unwrap_err();
        assert_eq!(err.observation.as_deref(), Some(MISSING_ACTION_INPUT_AFTER_ACTION));
    }

    #[test]
    fn prompt_lists_tools_and_scratchpad() {
        let tools: Vec<ToolRef> = vec![Arc::new(FnTool::new(
            "Time",
            "Useful for when you need to know the current time",
            |_| Ok(String::new()),
        ))];
        let agent = ReActAgent::new(&ChatModel::openai("gpt-4o"), &tools).unwrap();
        let steps = vec![IntermediateStep {
            action: AgentAction::new("Time", Value::String(String::new()), " check\nAction: Time\nAction Input: "),
            observation: "10:15 AM".to_string(),
        }];
        let prompt = agent.render("What time is it?", &steps).unwrap();

        assert!(prompt.contains("Time: Useful for when you need to know the current time"));
        assert!(prompt.contains("should be one of [Time]"));
        assert!(prompt.ends_with("Question: What time is it?\nThought: check\nAction: Time\nAction Input: \nObservation: 10:15 AM\nThought: "));
    }
}
