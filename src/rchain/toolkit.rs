//! Ready-made tools used by the agent tutorials.

use std::env;

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::rchain::tools::{Tool, ToolArgs, ToolError, ToolParam};

/// Local wall-clock time as `HH:MM AM/PM`.
#[derive(Debug, Clone)]
pub struct CurrentTimeTool {
    name: String,
    description: String,
}

impl CurrentTimeTool {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

impl Default for CurrentTimeTool {
    fn default() -> Self {
        Self::new("Time", "Useful for when you need to know the current time")
    }
}

#[async_trait]
impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn call(&self, _args: ToolArgs) -> Result<String, ToolError> {
        Ok(Local::now().format("%I:%M %p").to_string())
    }
}

const WIKIPEDIA_API: &str = "https://en.wikipedia.org/w/api.php";
const WIKIPEDIA_NOT_FOUND: &str = "I could not find any information on that.";

/// Summary of the best Wikipedia match, cut to a few sentences.
#[derive(Debug, Clone)]
pub struct WikipediaTool {
    sentences: usize,
    client: Client,
}

impl WikipediaTool {
    pub fn new(sentences: usize) -> Self {
        Self {
            sentences,
            client: Client::new(),
        }
    }

    async fn summary(&self, query: &str) -> Result<Option<String>, reqwest::Error> {
        let search: Value = self
            .client
            .get(WIKIPEDIA_API)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("srsearch", query),
                ("srlimit", "1"),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let Some(title) = search["query"]["search"][0]["title"].as_str() else {
            return Ok(None);
        };
        debug!(title, "wikipedia match");

        let page: Value = self
            .client
            .get(WIKIPEDIA_API)
            .query(&[
                ("action", "query"),
                ("prop", "extracts"),
                ("exintro", "1"),
                ("explaintext", "1"),
                ("redirects", "1"),
                ("titles", title),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        let extract = page["query"]["pages"]
            .as_object()
            .and_then(|pages| pages.values().find_map(|page| page["extract"].as_str()))
            .map(|extract| first_sentences(extract, self.sentences))
            .filter(|extract| !extract.is_empty());
        Ok(extract)
    }
}

impl Default for WikipediaTool {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Leading `count` sentences, ending at `.`, `!` or `?` followed by whitespace.
pub fn first_sentences(text: &str, count: usize) -> String {
    let text = text.trim();
    let mut seen = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((index, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?')
            && chars.peek().is_none_or(|(_, next)| next.is_whitespace())
        {
            seen += 1;
            if seen == count {
                return text[..index + c.len_utf8()].to_string();
            }
        }
    }
    text.to_string()
}

#[async_trait]
impl Tool for WikipediaTool {
    fn name(&self) -> &str {
        "Wikipedia"
    }

    fn description(&self) -> &str {
        "Useful for when you need to find information about a topic."
    }

    async fn call(&self, args: ToolArgs) -> Result<String, ToolError> {
        let query = args.single_str("input")?;
        match self.summary(query).await {
            Ok(Some(summary)) => Ok(summary),
            Ok(None) => Ok(WIKIPEDIA_NOT_FOUND.to_string()),
            Err(err) => {
                warn!(error = %err, "wikipedia lookup failed");
                Ok(WIKIPEDIA_NOT_FOUND.to_string())
            }
        }
    }
}

const TAVILY_SEARCH_URL: &str = "https://api.tavily.com/search";

/// Web search through the Tavily API (`TAVILY_API_KEY`).
#[derive(Debug, Clone, Default)]
pub struct TavilySearchTool {
    client: Client,
}

#[async_trait]
impl Tool for TavilySearchTool {
    fn name(&self) -> &str {
        "simple_search"
    }

    fn description(&self) -> &str {
        "Useful for when you need to answer question about current events"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![ToolParam::string("query", "Should be a search query")]
    }

    async fn call(&self, args: ToolArgs) -> Result<String, ToolError> {
        let query = args.str("query")?;
        let api_key = env::var("TAVILY_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| ToolError::Failed("TAVILY_API_KEY is not set in the environment".to_string()))?;

        let results: Value = self
            .client
            .post(TAVILY_SEARCH_URL)
            .bearer_auth(&api_key)
            .json(&json!({"query": query}))
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| ToolError::Failed(err.to_string()))?
            .json()
            .await
            .map_err(|err| ToolError::Failed(err.to_string()))?;
        Ok(format!("Search results for: {query}\n\n\n{results}\n"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MultiplyNumbersTool;

/// Renders floats the way the tutorials print them: `10.0`, `2.5`.
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        value.to_string()
    }
}

#[async_trait]
impl Tool for MultiplyNumbersTool {
    fn name(&self) -> &str {
        "multiply_numbers"
    }

    fn description(&self) -> &str {
        "Useful for multiplying two numbers"
    }

    fn parameters(&self) -> Vec<ToolParam> {
        vec![
            ToolParam::number("x", "First number to multiply"),
            ToolParam::number("y", "Second number to multiply"),
        ]
    }

    async fn call(&self, args: ToolArgs) -> Result<String, ToolError> {
        let x = args.f64("x")?;
        let y = args.f64("y")?;
        Ok(format!(
            "The product of {} and {} is {}",
            format_number(x),
            format_number(y),
            format_number(x * y)
        ))
    }
}
