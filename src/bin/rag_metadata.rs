use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::loaders::DirectoryLoader;
use rchain_cookbook::rchain::text_splitter::{CharacterTextSplitter, TextSplitter};
use rchain_cookbook::script;

const CHROMA_DB_WITH_METADATA: &str = "chroma_db_with_metadata";

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    println!("Books directory: {}", settings.data_dir.display());
    println!("Vector store: {CHROMA_DB_WITH_METADATA} at {}", settings.chroma_url);

    let chroma = settings.chroma().await?;
    if chroma.exists(CHROMA_DB_WITH_METADATA).await? {
        println!("Vector store already exists. No need to initialize.");
        return Ok(());
    }
    println!("Vector store does not exist. Initializing vector store...");

    // Each book keeps its file name as `source`.
    let documents = DirectoryLoader::new(&settings.data_dir).extension("txt").load()?;
    let docs = CharacterTextSplitter::new(1000, 0)?.split_documents(&documents)?;

    println!("\n--- Document Chunks Information ---");
    println!("Number of document chunks: {}", docs.len());

    println!("\n--- Creating embeddings ---");
    let embeddings = settings.embeddings();
    println!("\n--- Embeddings created ---");

    println!("\n--- Creating and persisting vector store ---");
    chroma
        .from_documents(CHROMA_DB_WITH_METADATA, &docs, embeddings)
        .await?;
    println!("\n--- Finished creating and persisting vector store");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
