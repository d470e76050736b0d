use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::documents::Document;
use rchain_cookbook::rchain::embeddings::{Embeddings, HuggingFaceEmbeddings, OpenAIEmbeddings};
use rchain_cookbook::rchain::loaders::TextLoader;
use rchain_cookbook::rchain::text_splitter::{CharacterTextSplitter, TextSplitter};
use rchain_cookbook::rchain::vectorstores::{ChromaServer, SearchType, VectorStoreError};
use rchain_cookbook::script;

const ODYSSEY_BOOK: &str = "odyssey.txt";
const OPENAI_TEXT_EMBEDDING_ADA_002: &str = "text-embedding-ada-002";
const CHROMA_DB_OPENAI: &str = "chroma_db_openai";
const CHROMA_DB_HUGGINGFACE: &str = "chroma_db_huggingface";
const QUERY: &str = "Who is Odysseus' wife?";

async fn create_vector_store<E: Embeddings + Clone + 'static>(
    chroma: &ChromaServer,
    docs: &[Document],
    embeddings: &E,
    store_name: &str,
) -> Result<(), VectorStoreError> {
    if chroma.exists(store_name).await? {
        println!("\n--- Vector store {store_name} ---");
        return Ok(());
    }
    println!("\n--- Creating vector store {store_name} ---");
    chroma.from_documents(store_name, docs, embeddings.clone()).await?;
    println!("\n--- Finished creating vector store {store_name} ---");
    Ok(())
}

async fn query_vector_store<E: Embeddings + Clone + 'static>(
    chroma: &ChromaServer,
    store_name: &str,
    query: &str,
    embeddings: &E,
) -> Result<(), VectorStoreError> {
    if !chroma.exists(store_name).await? {
        println!("Vector store {store_name} does not exist.");
        return Ok(());
    }
    println!("\n--- Querying the Vector Store {store_name} ---");
    let retriever = chroma
        .open(store_name, embeddings.clone())
        .await?
        .as_retriever(SearchType::score_threshold(3, 0.1));
    let relevant_docs = retriever.retrieve(query).await?;
    script::print_relevant_documents(&format!("Relevant Documents for {store_name}"), &relevant_docs);
    Ok(())
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let documents = TextLoader::new(settings.data_file(ODYSSEY_BOOK)).load()?;
    let docs = CharacterTextSplitter::new(1000, 0)?.split_documents(&documents)?;
    script::print_chunk_info(&docs);

    let chroma = settings.chroma().await?;

    // Hosted, billed per token.
    println!("\n--- Using OpenAI Embeddings ---");
    let openai_embeddings = OpenAIEmbeddings::new(OPENAI_TEXT_EMBEDDING_ADA_002).retry(settings.retry);
    create_vector_store(&chroma, &docs, &openai_embeddings, CHROMA_DB_OPENAI).await?;

    // Open sentence-transformers model served by the Hugging Face inference API.
    println!("\n--- Using Hugging Face Transformers ---");
    let huggingface_embeddings = HuggingFaceEmbeddings::default().retry(settings.retry);
    create_vector_store(&chroma, &docs, &huggingface_embeddings, CHROMA_DB_HUGGINGFACE).await?;

    println!("Embedding demonstrations for OpenAI and Hugging Face completed.");

    query_vector_store(&chroma, CHROMA_DB_OPENAI, QUERY, &openai_embeddings).await?;
    query_vector_store(&chroma, CHROMA_DB_HUGGINGFACE, QUERY, &huggingface_embeddings).await?;

    println!("Querying demonstrations completed.");
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
