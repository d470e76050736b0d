//! Document loaders: local text files, directories, web pages, Firecrawl.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use reqwest::{Client, StatusCode};
use scraper::{Html, Node, Selector};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, info};

use crate::rchain::documents::{Document, SOURCE_KEY, flatten_metadata};

#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("The file {} does not exist. Please check the path.", .0.display())]
    FileNotFound(PathBuf),
    #[error("The directory {} does not exist. Please check the path.", .0.display())]
    DirectoryNotFound(PathBuf),
    #[error("Failed to read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{0} environment variable not set.")]
    MissingApiKey(&'static str),
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: StatusCode,
        body: String,
    },
    #[error("unexpected response from {url}: {reason}")]
    Malformed { url: String, reason: String },
}

/// Loads one file as one document.
#[derive(Debug, Clone)]
pub struct TextLoader {
    path: PathBuf,
}

impl TextLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn load(&self) -> Result<Vec<Document>, LoaderError> {
        if !self.path.is_file() {
            return Err(LoaderError::FileNotFound(self.path.clone()));
        }
        let text = read_text(&self.path)?;
        Ok(vec![
            Document::new(text).with_metadata(SOURCE_KEY, self.path.display().to_string()),
        ])
    }
}

fn read_text(path: &Path) -> Result<String, LoaderError> {
    let bytes = fs::read(path).map_err(|source| LoaderError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Loads every file with a given extension, tagging each with its file name.
#[derive(Debug, Clone)]
pub struct DirectoryLoader {
    dir: PathBuf,
    extension: String,
}

impl DirectoryLoader {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            extension: "txt".to_string(),
        }
    }

    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Files are read in name order so runs are reproducible.
    pub fn load(&self) -> Result<Vec<Document>, LoaderError> {
        if !self.dir.is_dir() {
            return Err(LoaderError::DirectoryNotFound(self.dir.clone()));
        }
        let io_err = |source| LoaderError::Io {
            path: self.dir.clone(),
            source,
        };
        let mut files = fs::read_dir(&self.dir)
            .map_err(io_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(io_err)?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.extension))
            })
            .collect::<Vec<_>>();
        files.sort();

        let mut documents = Vec::with_capacity(files.len());
        for path in files {
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(file = %name, "loading");
            documents.push(Document::new(read_text(&path)?).with_metadata(SOURCE_KEY, name));
        }
        Ok(documents)
    }
}

/// Fetches pages over HTTP and keeps their visible text.
#[derive(Debug, Clone)]
pub struct WebBaseLoader {
    urls: Vec<String>,
    client: Client,
}

impl WebBaseLoader {
    pub fn new<S: Into<String>>(urls: impl IntoIterator<Item = S>) -> Self {
        Self {
            urls: urls.into_iter().map(Into::into).collect(),
            client: Client::new(),
        }
    }

    pub async fn load(&self) -> Result<Vec<Document>, LoaderError> {
        let mut documents = Vec::with_capacity(self.urls.len());
        for url in &self.urls {
            info!(%url, "fetching page");
            let http_err = |source| LoaderError::Http {
                url: url.clone(),
                source,
            };
            let response = self.client.get(url).send().await.map_err(http_err)?;
            let status = response.status();
            let body = response.text().await.map_err(http_err)?;
            if !status.is_success() {
                return Err(LoaderError::Status {
                    url: url.clone(),
                    status,
                    body,
                });
            }

            let (title, text) = html_to_text(&body);
            let mut document = Document::new(text).with_metadata(SOURCE_KEY, url.as_str());
            if let Some(title) = title {
                document = document.with_metadata("title", title);
            }
            documents.push(document);
        }
        Ok(documents)
    }
}

const SKIPPED_ELEMENTS: [&str; 4] = ["script", "style", "noscript", "template"];

/// Returns the page title and body text, one line per text node.
pub fn html_to_text(html: &str) -> (Option<String>, String) {
    let document = Html::parse_document(html);
    let title = Selector::parse("title")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .map(|element| normalize_line(&element.text().collect::<String>()))
        .filter(|title| !title.is_empty());

    let Some(body) = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
    else {
        return (title, String::new());
    };

    let mut lines = Vec::new();
    for node in body.descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|element| SKIPPED_ELEMENTS.contains(&element.name()))
        });
        if hidden {
            continue;
        }
        let line = normalize_line(text);
        if !line.is_empty() {
            lines.push(line);
        }
    }
    (title, lines.join("\n\n"))
}

fn normalize_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

const FIRECRAWL_SCRAPE_URL: &str = "https://api.firecrawl.dev/v1/scrape";
const FIRECRAWL_API_KEY: &str = "FIRECRAWL_API_KEY";

/// Scrapes one page through the hosted Firecrawl API as markdown.
#[derive(Debug, Clone)]
pub struct FireCrawlLoader {
    api_key: String,
    url: String,
    client: Client,
}

impl FireCrawlLoader {
    pub fn new(api_key: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            url: url.into(),
            client: Client::new(),
        }
    }

    pub fn from_env(url: impl Into<String>) -> Result<Self, LoaderError> {
        let api_key = env::var(FIRECRAWL_API_KEY)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or(LoaderError::MissingApiKey(FIRECRAWL_API_KEY))?;
        Ok(Self::new(api_key, url))
    }

    pub async fn load(&self) -> Result<Vec<Document>, LoaderError> {
        info!(url = %self.url, "scraping with firecrawl");
        let http_err = |source| LoaderError::Http {
            url: FIRECRAWL_SCRAPE_URL.to_string(),
            source,
        };
        let response = self
            .client
            .post(FIRECRAWL_SCRAPE_URL)
            .bearer_auth(&self.api_key)
            .json(&json!({"url": self.url, "formats": ["markdown"]}))
            .send()
            .await
            .map_err(http_err)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LoaderError::Status {
                url: FIRECRAWL_SCRAPE_URL.to_string(),
                status,
                body,
            });
        }
        let body: Value = response.json().await.map_err(http_err)?;
        parse_firecrawl(&self.url, &body).map(|document| vec![document])
    }
}

fn parse_firecrawl(url: &str, body: &Value) -> Result<Document, LoaderError> {
    let malformed = |reason: &str| LoaderError::Malformed {
        url: FIRECRAWL_SCRAPE_URL.to_string(),
        reason: reason.to_string(),
    };
    if body["success"].as_bool() == Some(false) {
        return Err(malformed(body["error"].as_str().unwrap_or("scrape failed")));
    }
    let markdown = body["data"]["markdown"]
        .as_str()
        .ok_or_else(|| malformed("missing data.markdown"))?;

    let mut metadata = body["data"]["metadata"]
        .as_object()
        .cloned()
        .unwrap_or_default();
    flatten_metadata(&mut metadata);
    metadata.retain(|_, value| !value.is_null() && !value.is_object());
    metadata
        .entry(SOURCE_KEY)
        .or_insert_with(|| Value::String(url.to_string()));

    Ok(Document {
        page_content: markdown.to_string(),
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_loader_reports_missing_file() {
        let err = TextLoader::new("/definitely/missing/odyssey.txt").load().unwrap_err();
        assert_eq!(
            err.to_string(),
            "The file /definitely/missing/odyssey.txt does not exist. Please check the path."
        );
    }

    #[test]
    fn directory_loader_tags_sources_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b_romeo.txt"), "Two households").unwrap();
        fs::write(dir.path().join("a_odyssey.txt"), "Sing to me of the man").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let docs = DirectoryLoader::new(dir.path()).load().unwrap();
        let sources = docs.iter().map(|doc| doc.source().unwrap()).collect::<Vec<_>>();
        assert_eq!(sources, vec!["a_odyssey.txt", "b_romeo.txt"]);
        assert_eq!(docs[1].page_content, "Two households");
    }

    #[test]
    fn directory_loader_reports_missing_directory() {
        let err = DirectoryLoader::new("/definitely/missing/books").load().unwrap_err();
        assert!(matches!(err, LoaderError::DirectoryNotFound(_)));
    }

    #[test]
    fn html_text_skips_scripts_and_keeps_title() {
        let html = r#"<html><head><title> Apple </title></head>
            <body><h1>iPhone   16</h1><script>var x = 1;</script>
            <p>Hello, <b>Apple Intelligence</b>.</p><style>p{}</style></body></html>"#;
        let (title, text) = html_to_text(html);
        assert_eq!(title.as_deref(), Some("Apple"));
        assert_eq!(text, "iPhone 16\n\nHello,\n\nApple Intelligence\n\n.");
    }

    #[test]
    fn firecrawl_metadata_is_flattened() {
        let body = json!({
            "success": true,
            "data": {
                "markdown": "# Apple Intelligence",
                "metadata": {"title": "Apple", "ogLocaleAlternate": ["en_GB", "fr_FR"], "sourceURL": "https://www.apple.com/"}
            }
        });
        let doc = parse_firecrawl("https://www.apple.com/", &body).unwrap();
        assert_eq!(doc.page_content, "# Apple Intelligence");
        assert_eq!(doc.metadata["ogLocaleAlternate"], "en_GB, fr_FR");
        assert_eq!(doc.source(), Some("https://www.apple.com/"));
    }
}
