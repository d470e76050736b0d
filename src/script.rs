//! Bootstrap shared by the tutorial binaries.

use std::fmt::Display;
use std::process;

use tracing::debug;

use crate::logging;
use crate::rchain::documents::Document;

/// Loads `.env` from the working directory and installs the log subscriber.
pub fn init() {
    let dotenv = dotenvy::dotenv();
    logging::init();
    match dotenv {
        Ok(path) => debug!(path = %path.display(), "loaded environment file"),
        Err(err) => debug!(error = %err, "no environment file loaded"),
    }
}

/// Prints the error to stderr and exits with status 1.
pub fn exit_on_error<T, E: Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            eprintln!("{err}");
            process::exit(1);
        }
    }
}

/// Numbered listing of retrieved documents with their `source`.
pub fn format_relevant_documents(docs: &[Document]) -> String {
    let mut out = String::new();
    for (i, doc) in docs.iter().enumerate() {
        out.push_str(&format!("Document {}:\n{}\n\n", i + 1, doc.page_content));
        if !doc.metadata.is_empty() {
            out.push_str(&format!("Source: {}\n\n", doc.source().unwrap_or("Unknown")));
        }
    }
    out
}

/// Chunk count and the first chunk, printed after splitting.
pub fn print_chunk_info(chunks: &[Document]) {
    println!("\n--- Document Chunks Information ---");
    println!("Number of document chunks: {}", chunks.len());
    if let Some(first) = chunks.first() {
        println!("Sample chunk:\n{}\n", first.page_content);
    }
}

pub fn print_relevant_documents(heading: &str, docs: &[Document]) {
    println!("\n--- {heading} ---");
    print!("{}", format_relevant_documents(docs));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rchain::documents::SOURCE_KEY;

    #[test]
    fn lists_documents_with_sources() {
        let docs = vec![
            Document::new("Penelope waits.").with_metadata(SOURCE_KEY, "odyssey.txt"),
            Document::new("No metadata here."),
        ];
        assert_eq!(
            format_relevant_documents(&docs),
            "Document 1:\nPenelope waits.\n\nSource: odyssey.txt\n\nDocument 2:\nNo metadata here.\n\n"
        );
    }
}
