//! Small LLM orchestration layer used by the tutorial binaries.
//!
//! Chat models, prompt templates and runnables compose into chains; loaders,
//! splitters, embeddings and the Chroma store cover retrieval; tools and
//! agents cover tool use.

/// Tool-using agents and their executor.
pub mod agents;
pub(crate) mod anthropic;
/// Provider-agnostic chat model client.
pub mod chat_models;
pub(crate) mod chat_runtime;
pub mod documents;
/// Embedding model clients.
pub mod embeddings;
pub(crate) mod google;
/// Document loaders for files, directories and web pages.
pub mod loaders;
pub mod memory;
/// Chat messages and model replies.
pub mod messages;
pub(crate) mod openai;
/// Prompt templates and formatted prompt values.
pub mod prompts;
/// Provider selection and API key lookup.
pub mod provider;
/// Composable pipeline steps.
pub mod runnables;
pub mod text_splitter;
/// Ready-made tools for agents.
pub mod toolkit;
/// Tool schema and invocation helpers.
pub mod tools;
/// Vector stores and retrievers.
pub mod vectorstores;
