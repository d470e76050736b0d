use std::env;
use std::fmt;
use std::str::FromStr;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Openai,
    Fireworks,
    Anthropic,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 4] = [
        Provider::Openai,
        Provider::Fireworks,
        Provider::Anthropic,
        Provider::Google,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Fireworks => "fireworks",
            Self::Anthropic => "anthropic",
            Self::Google => "google",
        }
    }

    /// Model used when neither a profile nor the environment names one.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::Openai => "gpt-4o",
            Self::Fireworks => "accounts/fireworks/models/kimi-k2-instruct-0905",
            Self::Anthropic => "claude-3-opus-20240229",
            Self::Google => "gemini-1.5-flash",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown provider '{0}'. Supported values: openai, fireworks, anthropic, google.")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::Openai),
            "fireworks" => Ok(Self::Fireworks),
            "anthropic" => Ok(Self::Anthropic),
            "google" | "gemini" => Ok(Self::Google),
            _ => Err(UnknownProvider(value.to_string())),
        }
    }
}

pub fn endpoint(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "https://api.openai.com/v1/chat/completions",
        Provider::Fireworks => "https://api.fireworks.ai/inference/v1/chat/completions",
        Provider::Anthropic => "https://api.anthropic.com/v1/messages",
        Provider::Google => "https://generativelanguage.googleapis.com/v1beta/models",
    }
}

pub fn api_key_env(provider: Provider) -> &'static str {
    match provider {
        Provider::Openai => "OPENAI_API_KEY",
        Provider::Fireworks => "FIREWORKS_API_KEY",
        Provider::Anthropic => "ANTHROPIC_API_KEY",
        Provider::Google => "GOOGLE_API_KEY",
    }
}

/// Reads the provider key, treating blank values as unset.
pub fn api_key(provider: Provider) -> Result<String, ProviderError> {
    api_key_with(provider, |key| env::var(key).ok())
}

pub fn api_key_with(
    provider: Provider,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<String, ProviderError> {
    let key_env = api_key_env(provider);
    lookup(key_env)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(ProviderError::MissingApiKey { provider, key_env })
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{key_env} is not set in the environment")]
    MissingApiKey {
        provider: Provider,
        key_env: &'static str,
    },
    #[error("{provider} request failed: {source}")]
    Request {
        provider: Provider,
        #[source]
        source: reqwest::Error,
    },
    #[error("{provider} API error {status}: {body}")]
    Api {
        provider: Provider,
        status: StatusCode,
        body: String,
    },
    #[error("{provider} returned a malformed response: {reason}")]
    Malformed { provider: Provider, reason: String },
    #[error("{provider} response did not contain message content")]
    EmptyResponse { provider: Provider },
}

#[cfg(test)]
mod tests {
    use super::{Provider, api_key_with};

    #[test]
    fn parses_provider_names_case_insensitively() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::Openai);
        assert_eq!(" gemini ".parse::<Provider>().unwrap(), Provider::Google);
        assert_eq!("anthropic".parse::<Provider>().unwrap(), Provider::Anthropic);
    }

    #[test]
    fn unknown_provider_lists_supported_values() {
        let err = "bad".parse::<Provider>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Unknown provider 'bad'. Supported values: openai, fireworks, anthropic, google."
        );
    }

    #[test]
    fn every_provider_has_a_default_model() {
        for provider in Provider::ALL {
            assert!(!provider.default_model().is_empty());
        }
    }

    #[test]
    fn blank_or_missing_key_is_rejected() {
        let err = api_key_with(Provider::Google, |_| None).unwrap_err();
        assert_eq!(err.to_string(), "GOOGLE_API_KEY is not set in the environment");

        let blank = api_key_with(Provider::Openai, |_| Some("  ".to_string())).unwrap_err();
        assert_eq!(blank.to_string(), "OPENAI_API_KEY is not set in the environment");

        let key = api_key_with(Provider::Fireworks, |name| {
            (name == "FIREWORKS_API_KEY").then(|| " fw-123 ".to_string())
        });
        assert_eq!(key.unwrap(), "fw-123");
    }
}
