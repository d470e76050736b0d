use rchain_cookbook::Result;
use rchain_cookbook::config::Settings;
use rchain_cookbook::rchain::vectorstores::SearchType;
use rchain_cookbook::script;

const CHROMA_DB: &str = "chroma_db";
const QUERY: &str = "Who is Odysseus' wife?";

async fn run() -> Result<()> {
    let settings = Settings::load()?;
    let chroma = settings.chroma().await?;
    let db = chroma.open(CHROMA_DB, settings.embeddings()).await?;

    // 0.9 is strict; lower it when nothing comes back.
    let retriever = db.as_retriever(SearchType::score_threshold(3, 0.9));
    let relevant_docs = retriever.retrieve(QUERY).await?;

    script::print_relevant_documents("Relevant Documents", &relevant_docs);
    Ok(())
}

#[tokio::main]
async fn main() {
    script::init();
    script::exit_on_error(run().await);
}
