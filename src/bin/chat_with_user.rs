use inquire::{InquireError, Text};
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::messages::Message;
use rchain_cookbook::{Error, Result, script};

async fn run() -> Result<()> {
    let model = Settings::load()?.chat_model();
    let mut chat_history = vec![Message::system("You are an all-purpose AI assistant")];

    loop {
        let query = match Text::new("User ('exit' to quit):").prompt() {
            Ok(query) => query,
            Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => break,
            Err(err) => return Err(Error::Input(err.to_string())),
        };
        if query.trim().eq_ignore_ascii_case("exit") {
            break;
        }
        chat_history.push(Message::human(query));

        let result = model.invoke(chat_history.as_slice()).await?;
        println!("AI: {}", result.content);
        chat_history.push(Message::ai(result.content));
    }

    println!("---- Message History ----");
    for message in &chat_history {
        println!("{message}");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
