use std::collections::BTreeMap;

use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::chat_models::ChatModel;
use rchain_cookbook::rchain::prompts::{ChatPromptTemplate, variables};
use rchain_cookbook::rchain::runnables::{
    BoxRunnable, ChainError, Runnable, RunnableExt, RunnableLambda, RunnableParallel,
    StrOutputParser,
};
use rchain_cookbook::script;

const SYSTEM_MSG_EXPERT_REVIEWER: &str = "You are an expert product reviewer.";

/// Asks the model for one side of the review given the feature list.
fn analysis_chain(model: &ChatModel, question: &str) -> Result<BoxRunnable<String, String>> {
    let template = ChatPromptTemplate::from_messages([
        ("system", SYSTEM_MSG_EXPERT_REVIEWER),
        ("human", question),
    ])?;
    let format = RunnableLambda::new(move |features: String| {
        Ok(template.format_prompt(&variables([("features", features)]))?)
    });
    Ok(format.pipe(model.clone()).pipe(StrOutputParser).boxed())
}

fn combine_pros_and_cons(branches: BTreeMap<String, String>) -> Result<String, ChainError> {
    let side = |name: &str| {
        branches
            .get(name)
            .ok_or_else(|| ChainError::step(format!("missing '{name}' branch output")))
    };
    Ok(format!("Pros:\n{}\n\nCons:\n{}", side("pros")?, side("cons")?))
}

async fn run() -> Result<()> {
    let model = Settings::load()?.chat_model();
    let prompt_template = ChatPromptTemplate::from_messages([
        ("system", SYSTEM_MSG_EXPERT_REVIEWER),
        ("human", "List the main features of the product {product_name}."),
    ])?;

    let branches = RunnableParallel::new()
        .branch(
            "pros",
            analysis_chain(&model, "Given these features: {features}, list the pros of these features.")?,
        )
        .branch(
            "cons",
            analysis_chain(&model, "Given these features: {features}, list the cons of these features.")?,
        );

    let chain = prompt_template
        .pipe(model)
        .pipe(StrOutputParser)
        .pipe(branches)
        .pipe(RunnableLambda::new(combine_pros_and_cons));

    let result = chain
        .invoke(variables([("product_name", "MacBook Pro")]))
        .await?;
    println!("{result}");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
