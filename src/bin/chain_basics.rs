use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::prompts::{ChatPromptTemplate, variables};
use rchain_cookbook::rchain::runnables::{Runnable, RunnableExt, StrOutputParser};
use rchain_cookbook::script;

async fn run() -> Result<()> {
    let model = Settings::load()?.chat_model();
    let prompt_template = ChatPromptTemplate::from_messages([
        ("system", "You are a comedian who tells jokes about {topic}."),
        ("human", "Tell me {joke_count} jokes."),
    ])?;

    let chain = prompt_template.pipe(model).pipe(StrOutputParser);

    let result = chain
        .invoke(variables([("topic", "lawyers"), ("joke_count", "3")]))
        .await?;
    println!("{result}");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
