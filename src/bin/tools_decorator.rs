use std::sync::Arc;

use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::agents::{AgentExecutor, ToolCallingAgent, ToolRef};
use rchain_cookbook::rchain::tools::{FnTool, ToolParam};
use rchain_cookbook::script;

/// Closure tools, from a bare single input up to a declared two-field schema.
fn tools() -> Vec<ToolRef> {
    let greet_user = FnTool::new("greet_user", "Greets the user by name.", |args| {
        Ok(format!("Hello, {}!", args.str("name")?))
    })
    .with_param(ToolParam::string("name", "Name of the user"));

    let reverse_string = FnTool::new("reverse_string", "Reverses the given string.", |args| {
        Ok(args.str("text")?.chars().rev().collect())
    })
    .with_param(ToolParam::string("text", "Text to be reversed"));

    let concatenate_strings = FnTool::new("concatenate_strings", "Concatenates two strings.", |args| {
        let (a, b) = (args.str("a")?, args.str("b")?);
        println!("a {a}");
        println!("b {b}");
        Ok(format!("{a}{b}"))
    })
    .with_param(ToolParam::string("a", "First string"))
    .with_param(ToolParam::string("b", "Second string"));

    vec![
        Arc::new(greet_user),
        Arc::new(reverse_string),
        Arc::new(concatenate_strings),
    ]
}

async fn run() -> Result<()> {
    let tools = tools();
    let llm = Settings::load()?.chat_model();
    let agent = ToolCallingAgent::new(&llm, &tools)?;
    let mut agent_executor = AgentExecutor::new(agent, tools)
        .verbose(true)
        .handle_parsing_errors(true);

    let greet_response = agent_executor.invoke("Greet Alice").await?;
    println!("Response for 'Greet Alice': {greet_response}");

    let reverse_response = agent_executor.invoke("Reverse the string 'hello'").await?;
    println!("Response for 'Reverse the string hello': {reverse_response}");

    let concat_response = agent_executor.invoke("Concatenate 'hello' and 'world'").await?;
    println!("Response for 'Concatenate hello and world': {concat_response}");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
