use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::script;

const QUESTION: &str = "How long is a quarter in a game of basketball according to NBA rules?";

async fn run() -> Result<()> {
    let model = Settings::load()?.chat_model();

    let result = model.invoke(QUESTION).await?;
    println!("Full result (model.invoke(QUESTION)):");
    println!("{result}");
    println!("Content only (model.invoke(QUESTION).content):");
    println!("{}", result.content);
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
