use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::chat_models::ChatModel;
use rchain_cookbook::rchain::messages::Message;
use rchain_cookbook::script;

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let messages = vec![
        Message::system("Solve the following math problems"),
        Message::human("What is 81 divided by 9?"),
    ];

    let models = [
        ("OpenAI", ChatModel::openai("gpt-4o")),
        ("Anthropic", ChatModel::anthropic("claude-3-opus-20240229")),
        ("Google", ChatModel::google("gemini-1.5-flash")),
    ];
    for (label, model) in models {
        let result = model.retry(settings.retry).invoke(messages.clone()).await?;
        println!("{label} response: {}", result.content);
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
