use thiserror::Error;

use crate::config::ConfigError;
use crate::rchain::agents::AgentError;
use crate::rchain::embeddings::EmbeddingError;
use crate::rchain::loaders::LoaderError;
use crate::rchain::prompts::TemplateError;
use crate::rchain::provider::ProviderError;
use crate::rchain::runnables::ChainError;
use crate::rchain::text_splitter::SplitterError;
use crate::rchain::tools::ToolError;
use crate::rchain::vectorstores::VectorStoreError;

/// Any failure a tutorial can hit; displayed verbatim before exiting.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Loader(#[from] LoaderError),
    #[error(transparent)]
    Splitter(#[from] SplitterError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    VectorStore(#[from] VectorStoreError),
    #[error(transparent)]
    Tool(#[from] ToolError),
    #[error(transparent)]
    Agent(#[from] AgentError),
    #[error("{0}")]
    Input(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
