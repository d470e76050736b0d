use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::documents::Document;
use rchain_cookbook::rchain::embeddings::OpenAIEmbeddings;
use rchain_cookbook::rchain::loaders::TextLoader;
use rchain_cookbook::rchain::text_splitter::{
    CharacterTextSplitter, RecursiveCharacterTextSplitter, SentenceTransformersTokenTextSplitter,
    SplitterError, TextSplitter, TokenTextSplitter,
};
use rchain_cookbook::rchain::vectorstores::{ChromaServer, SearchType, VectorStoreError};
use rchain_cookbook::script;

const ROMEO_AND_JULIET_BOOK: &str = "romeo_and_juliet.txt";
const CHROMA_DB_CHAR: &str = "chroma_db_char";
const CHROMA_DB_SENT: &str = "chroma_db_sent";
const CHROMA_DB_TOKEN: &str = "chroma_db_token";
const CHROMA_DB_REC_CHAR: &str = "chroma_db_rec_char";
const CHROMA_DB_CUSTOM: &str = "chroma_db_custom";
const QUERY: &str = "How did Juliet die?";

/// Splits on blank lines only, one chunk per paragraph.
struct ParagraphSplitter;

impl TextSplitter for ParagraphSplitter {
    fn split_text(&self, text: &str) -> Result<Vec<String>, SplitterError> {
        Ok(text.split("\n\n").map(str::to_string).collect())
    }
}

async fn create_vector_store(
    chroma: &ChromaServer,
    embeddings: &OpenAIEmbeddings,
    docs: &[Document],
    store_name: &str,
) -> Result<(), VectorStoreError> {
    if chroma.exists(store_name).await? {
        println!("Vector store {store_name} already exists. No need to initialize.");
        return Ok(());
    }
    println!("\n--- Creating vector store {store_name} ---");
    chroma.from_documents(store_name, docs, embeddings.clone()).await?;
    println!("--- Finished creating vector store {store_name} ---");
    Ok(())
}

async fn query_vector_store(
    chroma: &ChromaServer,
    embeddings: &OpenAIEmbeddings,
    store_name: &str,
    query: &str,
) -> Result<(), VectorStoreError> {
    if !chroma.exists(store_name).await? {
        println!("Vector store {store_name} does not exist.");
        return Ok(());
    }
    println!("\n--- Querying the Vector Store {store_name} ---");
    let retriever = chroma
        .open(store_name, embeddings.clone())
        .await?
        .as_retriever(SearchType::score_threshold(1, 0.1));
    let relevant_docs = retriever.retrieve(query).await?;
    script::print_relevant_documents(&format!("Relevant Documents for {store_name}"), &relevant_docs);
    Ok(())
}

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let documents = TextLoader::new(settings.data_file(ROMEO_AND_JULIET_BOOK)).load()?;
    let chroma = settings.chroma().await?;
    let embeddings = settings.embeddings();

    println!("\n--- Using Character-based Splitting ---");
    let char_docs = CharacterTextSplitter::new(1000, 100)?.split_documents(&documents)?;
    create_vector_store(&chroma, &embeddings, &char_docs, CHROMA_DB_CHAR).await?;

    // Windows sized to the sentence-transformers model keep sentences intact.
    println!("\n--- Using Sentence-based Splitting ---");
    let sent_docs = SentenceTransformersTokenTextSplitter::new()?.split_documents(&documents)?;
    create_vector_store(&chroma, &embeddings, &sent_docs, CHROMA_DB_SENT).await?;

    println!("\n--- Using Token-based Splitting ---");
    let token_docs = TokenTextSplitter::new(512, 0)?.split_documents(&documents)?;
    create_vector_store(&chroma, &embeddings, &token_docs, CHROMA_DB_TOKEN).await?;

    println!("\n--- Using Recursive Character-based Splitting ---");
    let rec_char_docs = RecursiveCharacterTextSplitter::new(1000, 100)?.split_documents(&documents)?;
    create_vector_store(&chroma, &embeddings, &rec_char_docs, CHROMA_DB_REC_CHAR).await?;

    println!("\n--- Using Custom Splitting ---");
    let custom_docs = ParagraphSplitter.split_documents(&documents)?;
    create_vector_store(&chroma, &embeddings, &custom_docs, CHROMA_DB_CUSTOM).await?;

    for store_name in [
        CHROMA_DB_CHAR,
        CHROMA_DB_SENT,
        CHROMA_DB_TOKEN,
        CHROMA_DB_REC_CHAR,
        CHROMA_DB_CUSTOM,
    ] {
        query_vector_store(&chroma, &embeddings, store_name, QUERY).await?;
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
