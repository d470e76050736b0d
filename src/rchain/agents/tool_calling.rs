use async_trait::async_trait;
use tracing::debug;

use super::{Agent, AgentAction, AgentDecision, AgentError, AgentFinish, IntermediateStep, ToolRef};
use crate::rchain::chat_models::ChatModel;
use crate::rchain::messages::{AIMessage, Message};
use crate::rchain::prompts::{ChatPromptTemplate, PromptValue, variables};

/// Agent driven by the provider's native tool-calling API.
#[derive(Debug, Clone)]
pub struct ToolCallingAgent {
    llm: ChatModel,
    prompt: ChatPromptTemplate,
}

impl ToolCallingAgent {
    pub fn new(llm: &ChatModel, tools: &[ToolRef]) -> Result<Self, AgentError> {
        Self::with_system_prompt(llm, tools, "You are a helpful assistant")
    }

    pub fn with_system_prompt(
        llm: &ChatModel,
        tools: &[ToolRef],
        system: &str,
    ) -> Result<Self, AgentError> {
        let prompt = ChatPromptTemplate::from_messages([
            ("system", system),
            ("placeholder", "{chat_history}"),
            ("human", "{input}"),
        ])?;
        let definitions = tools.iter().map(|tool| tool.definition()).collect();
        Ok(Self {
            llm: llm.bind_tools(definitions),
            prompt,
        })
    }

    pub(crate) fn render(
        &self,
        input: &str,
        chat_history: &[Message],
        steps: &[IntermediateStep],
    ) -> Result<PromptValue, AgentError> {
        let vars = variables([("input", input)]);
        let mut messages = self
            .prompt
            .format_with_history(&vars, chat_history)?
            .into_messages();
        messages.extend(scratchpad_messages(steps));
        Ok(PromptValue::from(messages))
    }
}

/// Each assistant turn once, followed by the results of its tool calls.
fn scratchpad_messages(steps: &[IntermediateStep]) -> Vec<Message> {
    let mut messages: Vec<Message> = Vec::new();
    let mut last_turn: Option<&Message> = None;
    for step in steps {
        let (Some(turn), Some(call_id)) = (&step.action.message, &step.action.tool_call_id) else {
            messages.push(Message::ai(step.action.log.clone()));
            messages.push(Message::human(step.observation.clone()));
            continue;
        };
        if last_turn != Some(turn) {
            messages.push(turn.clone());
            last_turn = Some(turn);
        }
        messages.push(Message::tool_result(call_id.clone(), step.observation.clone()));
    }
    messages
}

fn decide(reply: AIMessage) -> AgentDecision {
    if reply.tool_calls.is_empty() {
        return AgentDecision::Finish(AgentFinish {
            log: reply.content.clone(),
            output: reply.content,
        });
    }

    let turn = Message::from(&reply);
    let responded = if reply.content.is_empty() {
        "\n".to_string()
    } else {
        format!("responded: {}\n", reply.content)
    };
    AgentDecision::Actions(
        reply
            .tool_calls
            .into_iter()
            .map(|call| {
                let log = format!(
                    "\nInvoking: `{}` with `{}`\n{responded}\n",
                    call.name,
                    call.args_as_string()
                );
                AgentAction {
                    tool: call.name,
                    tool_input: call.args,
                    log,
                    tool_call_id: Some(call.id),
                    message: Some(turn.clone()),
                }
            })
            .collect(),
    )
}

#[async_trait]
impl Agent for ToolCallingAgent {
    async fn plan(
        &self,
        input: &str,
        chat_history: &[Message],
        steps: &[IntermediateStep],
    ) -> Result<AgentDecision, AgentError> {
        let prompt = self.render(input, chat_history, steps)?;
        let reply = self.llm.invoke(prompt).await?;
        debug!(tool_calls = reply.tool_calls.len(), "tool calling agent replied");
        Ok(decide(reply))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::messages::Role;
    use crate::rchain::toolkit::MultiplyNumbersTool;
    use crate::rchain::tools::ToolCall;
    use serde_json::json;
    use std::sync::Arc;

    fn reply_with_calls() -> AIMessage {
        AIMessage {
            tool_calls: vec![
                ToolCall {
                    id: "call_a".to_string(),
                    name: "multiply_numbers".to_string(),
                    args: json!({"x": 10, "y": 20}),
                },
                ToolCall {
                    id: "call_b".to_string(),
                    name: "multiply_numbers".to_string(),
                    args: json!({"x": 2, "y": 3}),
                },
            ],
            ..AIMessage::new("")
        }
    }

    #[test]
    fn content_without_calls_finishes() {
        assert_eq!(
            decide(AIMessage::new("The product is 200.")),
            AgentDecision::Finish(AgentFinish {
                output: "The product is 200.".to_string(),
                log: "The product is 200.".to_string(),
            })
        );
    }

    #[test]
    fn every_call_becomes_an_action() {
        let AgentDecision::Actions(actions) = decide(reply_with_calls()) else {
            panic!("expected actions");
        };
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].tool_call_id.as_deref(), Some("call_b"));
        assert_eq!(actions[0].log, "\nInvoking: `multiply_numbers` with `{\"x\":10,\"y\":20}`\n\n\n");
    }

    #[test]
    fn scratchpad_keeps_one_assistant_turn_per_reply() {
        let AgentDecision::Actions(actions) = decide(reply_with_calls()) else {
            panic!("expected actions");
        };
        let steps = actions
            .into_iter()
            .zip(["200.0", "6.0"])
            .map(|(action, observation)| IntermediateStep {
                action,
                observation: observation.to_string(),
            })
            .collect::<Vec<_>>();

        let tools: Vec<ToolRef> = vec![Arc::new(MultiplyNumbersTool)];
        let agent = ToolCallingAgent::new(&ChatModel::openai("gpt-4o"), &tools).unwrap();
        let prompt = agent.render("Multiply 10 and 20", &[], &steps).unwrap();
        let roles = prompt.messages().iter().map(|message| message.role).collect::<Vec<_>>();

        assert_eq!(roles, vec![Role::System, Role::Human, Role::Ai, Role::Tool, Role::Tool]);
        assert_eq!(prompt.messages()[3].tool_call_id.as_deref(), Some("call_a"));
        assert_eq!(agent.llm.bound_tools().len(), 1);
    }
}
