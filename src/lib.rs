//! Runnable LLM tutorials: chat models, prompt templates, chains,
//! retrieval-augmented generation and tool-using agents.
//!
//! Each tutorial is a binary under `src/bin`; the shared building blocks live
//! in [`rchain`].

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod rchain;
pub mod script;

pub use error::{Error, Result};
