use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::loaders::FireCrawlLoader;
use rchain_cookbook::rchain::text_splitter::{CharacterTextSplitter, TextSplitter};
use rchain_cookbook::rchain::vectorstores::{ChromaServer, SearchType};
use rchain_cookbook::script;

const CHROMA_DB_FIRECRAWL: &str = "chroma_db_firecrawl";
const APPLE_URL: &str = "https://www.apple.com/";
const QUERY: &str = "Apple Intelligence?";

/// Scrapes the page, splits it and stores the chunks.
async fn create_vector_store(settings: &Settings, chroma: &ChromaServer) -> Result<()> {
    let docs = FireCrawlLoader::from_env(APPLE_URL)?.load().await?;
    let split_docs = CharacterTextSplitter::new(1000, 0)?.split_documents(&docs)?;
    script::print_chunk_info(&split_docs);

    chroma
        .from_documents(CHROMA_DB_FIRECRAWL, &split_docs, settings.embeddings())
        .await?;
    Ok(())
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let chroma = settings.chroma().await?;

    if chroma.exists(CHROMA_DB_FIRECRAWL).await? {
        println!("Vector store {CHROMA_DB_FIRECRAWL} already exists. No need to initialize.");
    } else {
        create_vector_store(&settings, &chroma).await?;
    }

    let retriever = chroma
        .open(CHROMA_DB_FIRECRAWL, settings.embeddings())
        .await?
        .as_retriever(SearchType::similarity(3));
    let relevant_docs = retriever.retrieve(QUERY).await?;
    print!("{}", script::format_relevant_documents(&relevant_docs));
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
