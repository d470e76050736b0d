use std::sync::Arc;

use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::agents::{AgentExecutor, ReActAgent, ToolRef};
use rchain_cookbook::rchain::toolkit::CurrentTimeTool;
use rchain_cookbook::script;

async fn run() -> Result<()> {
    let tools: Vec<ToolRef> = vec![Arc::new(CurrentTimeTool::default())];

    // Reason and act: the model writes Thought/Action lines and stops before
    // each Observation so the executor can run the tool.
    let llm = Settings::load()?.chat_model().temperature(0.0);
    let agent = ReActAgent::new(&llm, &tools)?;
    let mut agent_executor = AgentExecutor::new(agent, tools).verbose(true);

    let response = agent_executor.invoke("What time is it?").await?;
    println!("response: {response}");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
