use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::messages::Message;
use rchain_cookbook::script;

async fn run() -> Result<()> {
    let model = Settings::load()?.chat_model();

    // The system message frames the assistant's role and tone.
    let mut messages = vec![
        Message::system("Solve the following math problems"),
        Message::human("What is 81 divided by 9?"),
    ];
    let result = model.invoke(messages.clone()).await?;
    println!("Answer from AI model: {}", result.content);

    // Earlier AI turns are replayed as context for the next question.
    messages.push(Message::ai("81 divided by 9 is 9."));
    messages.push(Message::human("What is 10 times 5?"));
    let result = model.invoke(messages).await?;
    println!("Answer from AI model: {}", result.content);
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
