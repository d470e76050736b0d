use clap::{Parser, ValueEnum};
use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::chat_models::ChatModel;
use rchain_cookbook::rchain::prompts::{ChatPromptTemplate, variables};
use rchain_cookbook::rchain::runnables::{
    BoxRunnable, Runnable, RunnableBranch, RunnableExt, RunnableLambda, StrOutputParser,
};
use rchain_cookbook::script;

const SYSTEM_MSG_HELPFUL_ASSISTANT: &str = "You are a helpful assistant.";

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Review {
    Good,
    Bad,
    Neutral,
    Unsure,
}

impl Review {
    fn text(self) -> &'static str {
        match self {
            Self::Good => "The product is excellent. I really enjoyed using it and found it very helpful.",
            Self::Bad => "The product is terrible. It broke after just one use and the quality is very poor.",
            Self::Neutral => "The product is okay. It works as expected but nothing exceptional.",
            Self::Unsure => {
                "I'm not sure about the product yet. Can you tell me more about its features and benefits?"
            }
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "chain_branching", about = "Route feedback to a reply chain by sentiment")]
struct Cli {
    /// Sample review to classify.
    #[arg(long, value_enum, default_value_t = Review::Good)]
    review: Review,
}

/// Feeds the classifier's answer into `{feedback}` of a response prompt.
fn feedback_chain(model: &ChatModel, instruction: &str) -> Result<BoxRunnable<String, String>> {
    let template = ChatPromptTemplate::from_messages([
        ("system", SYSTEM_MSG_HELPFUL_ASSISTANT),
        ("human", instruction),
    ])?;
    let format = RunnableLambda::new(move |feedback: String| {
        Ok(template.format_prompt(&variables([("feedback", feedback)]))?)
    });
    Ok(format.pipe(model.clone()).pipe(StrOutputParser).boxed())
}

async fn run(review: Review) -> Result<()> {
    let model = Settings::load()?.chat_model();

    let branches = RunnableBranch::new(feedback_chain(
        &model,
        "Generate a message to escalate this feedback to a human agent: {feedback}.",
    )?)
    .when(
        |sentiment: &String| sentiment.contains("positive"),
        feedback_chain(&model, "Generate a thank you note for this positive feedback: {feedback}.")?,
    )
    .when(
        |sentiment: &String| sentiment.contains("negative"),
        feedback_chain(&model, "Generate a response addressing this negative feedback: {feedback}.")?,
    )
    .when(
        |sentiment: &String| sentiment.contains("neutral"),
        feedback_chain(
            &model,
            "Generate a request for more details for this neutral feedback: {feedback}.",
        )?,
    );

    let classification_template = ChatPromptTemplate::from_messages([
        ("system", SYSTEM_MSG_HELPFUL_ASSISTANT),
        (
            "human",
            "Classify the sentiment of this feedback as positive, negative, neutral, or escalate: {feedback}.",
        ),
    ])?;
    let classification_chain = classification_template.pipe(model).pipe(StrOutputParser);

    let chain = classification_chain.pipe(branches);

    let result = chain.invoke(variables([("feedback", review.text())])).await?;
    println!("{result}");
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    script::init();
    script::exit_on_error(run(cli.review).await);
}
