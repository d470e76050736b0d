use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::loaders::WebBaseLoader;
use rchain_cookbook::rchain::text_splitter::{CharacterTextSplitter, TextSplitter};
use rchain_cookbook::rchain::vectorstores::SearchType;
use rchain_cookbook::script;

const CHROMA_DB_APPLE: &str = "chroma_db_apple";
const APPLE_URL: &str = "https://www.apple.com/";
const QUERY: &str = "What new products are announced on apple.com?";

async fn run() -> Result<()> {
    let settings = Settings::load()?;

    let documents = WebBaseLoader::new([APPLE_URL]).load().await?;
    let docs = CharacterTextSplitter::new(1000, 0)?.split_documents(&documents)?;
    script::print_chunk_info(&docs);

    let embeddings = settings.embeddings();
    let chroma = settings.chroma().await?;
    let db = if chroma.exists(CHROMA_DB_APPLE).await? {
        println!("Vector store {CHROMA_DB_APPLE} already exists. No need to initialize");
        chroma.open(CHROMA_DB_APPLE, embeddings).await?
    } else {
        println!("\n--- Creating vector store {CHROMA_DB_APPLE} ---");
        let db = chroma.from_documents(CHROMA_DB_APPLE, &docs, embeddings).await?;
        println!("--- Finished creating vector store {CHROMA_DB_APPLE} ---");
        db
    };

    let retriever = db.as_retriever(SearchType::similarity(3));
    let relevant_docs = retriever.retrieve(QUERY).await?;
    script::print_relevant_documents("Relevant Documents", &relevant_docs);
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
