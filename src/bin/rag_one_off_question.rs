use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::documents::Document;
use rchain_cookbook::rchain::messages::Message;
use rchain_cookbook::rchain::vectorstores::SearchType;
use rchain_cookbook::script;

const CHROMA_DB_WITH_METADATA: &str = "chroma_db_with_metadata";
const QUERY: &str = "How can I learn more about LangChain?";

fn combined_input(query: &str, docs: &[Document]) -> String {
    let contents = docs
        .iter()
        .map(|doc| doc.page_content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!(
        "Here are some documents that might help answer the question: {query}\
         \n\nRelevant Documents:\n{contents}\
         \n\nPlease provide an answer based only on the provided documents.\
         If the answer is not found in the documents, respond with 'I'm not sure'."
    )
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let chroma = settings.chroma().await?;
    let retriever = chroma
        .open(CHROMA_DB_WITH_METADATA, settings.embeddings())
        .await?
        .as_retriever(SearchType::similarity(1));
    let relevant_docs = retriever.retrieve(QUERY).await?;

    println!("\n--- Relevant Documents ---");
    for (i, doc) in relevant_docs.iter().enumerate() {
        println!("Document {}:\n{}\n", i + 1, doc.page_content);
    }

    let messages = vec![
        Message::system("You are a helpful assistant."),
        Message::human(combined_input(QUERY, &relevant_docs)),
    ];
    let result = settings.chat_model().invoke(messages).await?;

    println!("\n--- Generated Response ---");
    println!("Full result:\n{result}\n");
    println!("Content only:\n{}\n", result.content);
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
