use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Metadata key naming where a document came from.
pub const SOURCE_KEY: &str = "source";

/// Text fragment with free-form metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub page_content: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn new(page_content: impl Into<String>) -> Self {
        Self {
            page_content: page_content.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn source(&self) -> Option<&str> {
        self.metadata.get(SOURCE_KEY).and_then(Value::as_str)
    }
}

/// Vector stores only accept scalar metadata; lists become `", "`-joined strings.
pub fn flatten_metadata(metadata: &mut Map<String, Value>) {
    for value in metadata.values_mut() {
        if let Value::Array(items) = value {
            let joined = items
                .iter()
                .map(|item| match item {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", ");
            *value = Value::String(joined);
        }
    }
}
