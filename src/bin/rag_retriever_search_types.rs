use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::embeddings::OpenAIEmbeddings;
use rchain_cookbook::rchain::vectorstores::{ChromaServer, SearchType, VectorStoreError};
use rchain_cookbook::script;

const CHROMA_DB_WITH_METADATA: &str = "chroma_db_with_metadata";
const QUERY: &str = "How did Juliet die?";

async fn query_vector_store(
    chroma: &ChromaServer,
    store_name: &str,
    query: &str,
    embeddings: &OpenAIEmbeddings,
    search: SearchType,
) -> Result<(), VectorStoreError> {
    if !chroma.exists(store_name).await? {
        println!("Vector store {store_name} does not exist.");
        return Ok(());
    }
    println!("\n--- Querying the Vector Store {store_name} ---");
    let retriever = chroma
        .open(store_name, embeddings.clone())
        .await?
        .as_retriever(search);
    let relevant_docs = retriever.retrieve(query).await?;
    script::print_relevant_documents(&format!("Relevant Documents for {store_name}"), &relevant_docs);
    Ok(())
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let chroma = settings.chroma().await?;
    let embeddings = settings.embeddings();

    // Top k by vector distance.
    println!("\n--- Using Similarity Search ---");
    query_vector_store(&chroma, CHROMA_DB_WITH_METADATA, QUERY, &embeddings, SearchType::similarity(3)).await?;

    // Fetches `fetch_k` candidates, then trades relevance for diversity:
    // lambda_mult 1 means no diversity, 0 means maximum diversity.
    println!("\n--- Using Max Marginal Relevance (MMR) ---");
    let mmr = SearchType::Mmr {
        k: 3,
        fetch_k: SearchType::DEFAULT_FETCH_K,
        lambda_mult: 0.5,
    };
    query_vector_store(&chroma, CHROMA_DB_WITH_METADATA, QUERY, &embeddings, mmr).await?;

    // Only documents whose relevance score reaches the threshold.
    println!("\n--- Using Similarity Score Threshold ---");
    query_vector_store(
        &chroma,
        CHROMA_DB_WITH_METADATA,
        QUERY,
        &embeddings,
        SearchType::score_threshold(3, 0.1),
    )
    .await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
