use std::fmt;

use owo_colors::OwoColorize;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::{Agent, AgentAction, AgentDecision, AgentError, IntermediateStep, ToolRef};
use crate::rchain::memory::ConversationBufferMemory;
use crate::rchain::tools::ToolArgs;

const PARSE_ERROR_TOOL: &str = "_Exception";
const GENERIC_PARSE_OBSERVATION: &str = "Invalid or incomplete response";
const STOPPED_OUTPUT: &str = "Agent stopped due to iteration limit or time limit.";

/// Result of one executor run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentOutput {
    pub input: String,
    pub output: String,
}

impl fmt::Display for AgentOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let json = serde_json::to_string(self).map_err(|_| fmt::Error)?;
        f.write_str(&json)
    }
}

/// Loops an agent over its tools until it answers.
pub struct AgentExecutor<A> {
    agent: A,
    tools: Vec<ToolRef>,
    max_iterations: Option<usize>,
    handle_parsing_errors: bool,
    verbose: bool,
    memory: Option<ConversationBufferMemory>,
}

impl<A: Agent> AgentExecutor<A> {
    pub const DEFAULT_MAX_ITERATIONS: usize = 15;

    pub fn new(agent: A, tools: Vec<ToolRef>) -> Self {
        Self {
            agent,
            tools,
            max_iterations: Some(Self::DEFAULT_MAX_ITERATIONS),
            handle_parsing_errors: false,
            verbose: false,
            memory: None,
        }
    }

    /// `None` removes the limit.
    pub fn max_iterations(mut self, max_iterations: Option<usize>) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Feeds unparsable model output back as an observation instead of failing.
    pub fn handle_parsing_errors(mut self, handle: bool) -> Self {
        self.handle_parsing_errors = handle;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Conversation history given to the agent and extended after every run.
    pub fn memory(mut self, memory: ConversationBufferMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn memory_ref(&self) -> Option<&ConversationBufferMemory> {
        self.memory.as_ref()
    }

    pub fn memory_mut(&mut self) -> Option<&mut ConversationBufferMemory> {
        self.memory.as_mut()
    }

    pub async fn invoke(&mut self, input: &str) -> Result<AgentOutput, AgentError> {
        if self.verbose {
            println!("\n\n{}", "> Entering new AgentExecutor chain...".bold());
        }
        let history = self
            .memory
            .as_ref()
            .map(|memory| memory.messages().to_vec())
            .unwrap_or_default();

        let mut steps: Vec<IntermediateStep> = Vec::new();
        let mut iterations = 0;
        let mut output = None;
        while self.max_iterations.is_none_or(|max| iterations < max) {
            match self.agent.plan(input, &history, &steps).await {
                Ok(AgentDecision::Finish(finish)) => {
                    if self.verbose {
                        println!("{}", finish.log.green());
                    }
                    output = Some(finish.output);
                    break;
                }
                Ok(AgentDecision::Actions(actions)) => {
                    for action in actions {
                        if self.verbose {
                            println!("{}", action.log.green());
                        }
                        let observation = self.run_tool(&action).await;
                        if self.verbose {
                            println!("{}", observation.yellow());
                        }
                        steps.push(IntermediateStep { action, observation });
                    }
                }
                Err(AgentError::OutputParser(err)) if self.handle_parsing_errors => {
                    warn!(error = %err.message, "could not parse agent output");
                    let observation = err
                        .observation
                        .unwrap_or_else(|| GENERIC_PARSE_OBSERVATION.to_string());
                    if self.verbose {
                        println!("{}", observation.red());
                    }
                    steps.push(IntermediateStep {
                        action: AgentAction::new(
                            PARSE_ERROR_TOOL,
                            Value::String(observation.clone()),
                            err.llm_output,
                        ),
                        observation,
                    });
                }
                Err(err) => return Err(err),
            }
            iterations += 1;
        }

        let output = output.unwrap_or_else(|| {
            warn!(iterations, "agent stopped before a final answer");
            STOPPED_OUTPUT.to_string()
        });
        if self.verbose {
            println!("\n{}", "> Finished chain.".bold());
        }
        if let Some(memory) = self.memory.as_mut() {
            memory.save_context(input, &output);
        }
        info!(iterations, steps = steps.len(), "agent finished");
        Ok(AgentOutput {
            input: input.to_string(),
            output,
        })
    }

    async fn run_tool(&self, action: &AgentAction) -> String {
        let Some(tool) = self.tools.iter().find(|tool| tool.name() == action.tool) else {
            let names = self
                .tools
                .iter()
                .map(|tool| tool.name().to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return format!("{} is not a valid tool, try one of [{names}].", action.tool);
        };
        debug!(tool = %action.tool, input = %action.tool_input, "calling tool");
        let args = ToolArgs::from_input(&tool.parameters(), action.tool_input.clone());
        match tool.call(args).await {
            Ok(observation) => observation,
            Err(err) => {
                warn!(tool = %action.tool, error = %err, "tool failed");
                format!("Error: {err}")
            }
        }
    }
}
