use std::sync::Arc;

use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::agents::{AgentExecutor, ToolCallingAgent, ToolRef};
use rchain_cookbook::rchain::toolkit::{MultiplyNumbersTool, TavilySearchTool};
use rchain_cookbook::script;

async fn run() -> Result<()> {
    let tools: Vec<ToolRef> = vec![
        Arc::new(TavilySearchTool::default()),
        Arc::new(MultiplyNumbersTool),
    ];

    let llm = Settings::load()?.chat_model();
    let agent = ToolCallingAgent::new(&llm, &tools)?;
    let mut agent_executor = AgentExecutor::new(agent, tools)
        .verbose(true)
        .handle_parsing_errors(true);

    let search_response = agent_executor.invoke("Search for Apple Intelligence").await?;
    println!("Response for 'Search for Apple Intelligence': {search_response}");

    let multiply_response = agent_executor.invoke("Multiply 10 and 20").await?;
    println!("Response for 'Multiply 10 and 20': {multiply_response}");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
