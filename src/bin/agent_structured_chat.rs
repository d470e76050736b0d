use std::sync::Arc;

use inquire::{InquireError, Text};
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::agents::{AgentExecutor, StructuredChatAgent, ToolRef};
use rchain_cookbook::rchain::memory::ConversationBufferMemory;
use rchain_cookbook::rchain::messages::Message;
use rchain_cookbook::rchain::toolkit::{CurrentTimeTool, WikipediaTool};
use rchain_cookbook::{Error, Result, script};

const INITIAL_MESSAGE: &str = "You are an AI assistant that can provide helpful answers using available tools.\
\nIf you are unable to answer, you can use the following tools: Time and Wikipedia.";

async fn run() -> Result<()> {
    let tools: Vec<ToolRef> = vec![
        Arc::new(CurrentTimeTool::new(
            "Time",
            "Useful for when you need to know the current time.",
        )),
        Arc::new(WikipediaTool::default()),
    ];

    let llm = Settings::load()?.chat_model();
    let agent = StructuredChatAgent::new(&llm, &tools)?;

    // History reaches the prompt through the chat_history slot; every
    // exchange is appended by the executor.
    let mut memory = ConversationBufferMemory::new();
    memory.add_message(Message::system(INITIAL_MESSAGE));

    let mut agent_executor = AgentExecutor::new(agent, tools)
        .verbose(true)
        .handle_parsing_errors(true)
        .memory(memory);

    loop {
        let user_input = match Text::new("User (enter 'exit' to quit):").prompt() {
            Ok(input) => input,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(Error::Input(err.to_string())),
        };
        if user_input.trim().eq_ignore_ascii_case("exit") {
            break;
        }

        let response = agent_executor.invoke(&user_input).await?;
        println!("Bot: {}", response.output);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
