use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::messages::AIMessage;
use rchain_cookbook::rchain::prompts::{ChatPromptTemplate, PromptValue, Variables, variables};
use rchain_cookbook::rchain::runnables::{
    AsyncRunnableLambda, ChainError, Runnable, RunnableExt, RunnableLambda, lambda,
};
use rchain_cookbook::script;

async fn run() -> Result<()> {
    let model = Settings::load()?.chat_model();
    let prompt_template = ChatPromptTemplate::from_messages([
        ("system", "You are a comedian who tells jokes about {topic}."),
        ("human", "Tell me {joke_count} jokes."),
    ])?;

    // Each step is a plain closure; the sequence is the same chain as the piped one.
    let format_prompt =
        RunnableLambda::new(move |vars: Variables| Ok(prompt_template.format_prompt(&vars)?));
    let invoke_model = AsyncRunnableLambda::new(move |prompt: PromptValue| {
        let model = model.clone();
        async move { Ok::<_, ChainError>(model.invoke(prompt.to_messages()).await?) }
    });
    let parse_output = lambda(|message: AIMessage| message.content);

    let chain = format_prompt.pipe(invoke_model).pipe(parse_output);

    let response = chain
        .invoke(variables([("topic", "lawyers"), ("joke_count", "3")]))
        .await?;
    println!("{response}");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
