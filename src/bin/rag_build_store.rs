use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::loaders::TextLoader;
use rchain_cookbook::rchain::text_splitter::{CharacterTextSplitter, TextSplitter};
use rchain_cookbook::script;

const ODYSSEY_BOOK: &str = "odyssey.txt";
const CHROMA_DB: &str = "chroma_db";

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let chroma = settings.chroma().await?;

    if chroma.exists(CHROMA_DB).await? {
        println!("Vector store already exists. No need to initialize.");
        return Ok(());
    }
    println!("Vector store does not exist. Initializing vector store...");

    let documents = TextLoader::new(settings.data_file(ODYSSEY_BOOK)).load()?;
    let chunks = CharacterTextSplitter::new(1000, 0)?.split_documents(&documents)?;
    script::print_chunk_info(&chunks);

    println!("--- Creating embeddings ---");
    let embeddings = settings.embeddings();
    println!("\n--- Finished creating embeddings ---");

    println!("\n--- Creating vector store ---");
    chroma.from_documents(CHROMA_DB, &chunks, embeddings).await?;
    println!("\n--- Finished creating vector store ---");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
