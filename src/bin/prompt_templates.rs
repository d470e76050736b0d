use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::prompts::{ChatPromptTemplate, variables};
use rchain_cookbook::script;

const MULTI_PLACEHOLDER_TEMPLATE: &str = "You are a helpful assistant.
Human: Tell me a {adjective} short story about a {animal}.
Assistant:";

async fn run() -> Result<()> {
    let model = Settings::load()?.chat_model();

    let prompt_template = ChatPromptTemplate::from_template("Tell me a joke about {topic}")?;
    let prompt = prompt_template.format_prompt(&variables([("topic", "lawyers")]))?;
    let result = model.invoke(prompt).await?;
    println!("Response: {}", result.content);

    let prompt_multiple = ChatPromptTemplate::from_template(MULTI_PLACEHOLDER_TEMPLATE)?;
    let prompt = prompt_multiple.format_prompt(&variables([("adjective", "funny"), ("animal", "panda")]))?;
    let result = model.invoke(prompt).await?;
    println!("Response: {}", result.content);

    let prompt_template = ChatPromptTemplate::from_messages([
        ("system", "You are a comedian who tells jokes about {topic}."),
        ("human", "Tell me {joke_count} jokes."),
    ])?;
    let prompt = prompt_template.format_prompt(&variables([("topic", "lawyers"), ("joke_count", "3")]))?;
    let result = model.invoke(prompt).await?;
    println!("Response: {}", result.content);
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
