use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::rchain::chat_models::{ChatModel, RetryOptions};
use crate::rchain::embeddings::OpenAIEmbeddings;
use crate::rchain::provider::Provider;
use crate::rchain::vectorstores::{ChromaServer, VectorStoreError};

pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_CHROMA_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATA_DIR: &str = "books";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot resolve config path: set RCHAIN_CONFIG or HOME/XDG_CONFIG_HOME.")]
    NoConfigPath,
    #[error("Failed to read config file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Config file '{}' does not contain a [profiles] section.", path.display())]
    NoProfiles { path: PathBuf },
    #[error("Profile '{name}' not found in config file '{}'.", path.display())]
    UnknownProfile { name: String, path: PathBuf },
    #[error("Invalid value '{value}' for {key}: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// One `[profiles.<name>]` table; every field is optional.
#[derive(Debug, Clone, Deserialize, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ProfileConfig {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub embedding_model: Option<String>,
    pub temperature: Option<f32>,
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay: Option<u64>,
    pub chroma_url: Option<String>,
    pub data_dir: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    profiles: Option<HashMap<String, ProfileConfig>>,
}

/// Effective settings for a tutorial run.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub provider: Provider,
    pub model: String,
    pub embedding_model: String,
    pub temperature: Option<f32>,
    pub retry: RetryOptions,
    pub chroma_url: String,
    pub data_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider: Provider::Openai,
            model: Provider::Openai.default_model().to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            temperature: None,
            retry: RetryOptions::default(),
            chroma_url: DEFAULT_CHROMA_URL.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
        }
    }
}

impl Settings {
    /// Defaults, then the profile named by `RCHAIN_PROFILE`, then `RCHAIN_*` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::resolve(|key| env::var(key).ok())
    }

    pub fn resolve(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut settings = Self::default();
        if let Some(profile) = non_empty(lookup("RCHAIN_PROFILE")) {
            let path = config_path_with(&lookup)?;
            settings.apply_profile(&read_profile(&path, &profile)?)?;
        }

        if let Some(model) = non_empty(lookup("RCHAIN_MODEL")) {
            settings.model = model;
        }
        if let Some(model) = non_empty(lookup("RCHAIN_EMBEDDING_MODEL")) {
            settings.embedding_model = model;
        }
        if let Some(url) = non_empty(lookup("RCHAIN_CHROMA_URL")) {
            settings.chroma_url = url;
        }
        if let Some(dir) = non_empty(lookup("RCHAIN_DATA_DIR")) {
            settings.data_dir = PathBuf::from(dir);
        }
        if let Some(timeout) = non_empty(lookup("RCHAIN_TIMEOUT")) {
            settings.retry.timeout_secs = Some(parse_number("RCHAIN_TIMEOUT", &timeout)?);
        }
        if let Some(retries) = non_empty(lookup("RCHAIN_RETRIES")) {
            settings.retry.retries = parse_number("RCHAIN_RETRIES", &retries)?;
        }
        Ok(settings)
    }

    fn apply_profile(&mut self, profile: &ProfileConfig) -> Result<(), ConfigError> {
        if let Some(provider) = &profile.provider {
            self.provider = provider.parse().map_err(|err| ConfigError::InvalidValue {
                key: "provider".to_string(),
                value: provider.clone(),
                reason: format!("{err}"),
            })?;
            self.model = self.provider.default_model().to_string();
        }
        if let Some(model) = &profile.model {
            self.model = model.clone();
        }
        if let Some(model) = &profile.embedding_model {
            self.embedding_model = model.clone();
        }
        if profile.temperature.is_some() {
            self.temperature = profile.temperature;
        }
        if let Some(timeout) = profile.timeout {
            self.retry.timeout_secs = Some(timeout);
        }
        if let Some(retries) = profile.retries {
            self.retry.retries = retries;
        }
        if let Some(delay) = profile.retry_delay {
            self.retry.retry_delay_ms = delay;
        }
        if let Some(url) = &profile.chroma_url {
            self.chroma_url = url.clone();
        }
        if let Some(dir) = &profile.data_dir {
            self.data_dir = dir.clone();
        }
        Ok(())
    }

    /// Chat model for the configured provider and model.
    pub fn chat_model(&self) -> ChatModel {
        let model = ChatModel::new(self.provider, self.model.clone()).retry(self.retry);
        match self.temperature {
            Some(temperature) => model.temperature(temperature),
            None => model,
        }
    }

    pub fn embeddings(&self) -> OpenAIEmbeddings {
        OpenAIEmbeddings::new(self.embedding_model.clone()).retry(self.retry)
    }

    pub async fn chroma(&self) -> Result<ChromaServer, VectorStoreError> {
        ChromaServer::connect(&self.chroma_url).await
    }

    /// Resolves a file under the data directory.
    pub fn data_file(&self, name: impl AsRef<Path>) -> PathBuf {
        self.data_dir.join(name)
    }
}

/// Checks that the file parses and that every profile (or just `profile`) resolves.
pub fn validate_config(profile: Option<&str>) -> Result<PathBuf, ConfigError> {
    let path = config_path()?;
    let profiles = read_profiles(&path)?;
    let names: Vec<&String> = match profile {
        Some(name) => vec![
            profiles
                .keys()
                .find(|key| key.as_str() == name)
                .ok_or_else(|| ConfigError::UnknownProfile {
                    name: name.to_string(),
                    path: path.clone(),
                })?,
        ],
        None => profiles.keys().collect(),
    };
    for name in names {
        Settings::default().apply_profile(&profiles[name])?;
    }
    Ok(path)
}

fn read_profiles(path: &Path) -> Result<HashMap<String, ProfileConfig>, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ConfigFile = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    config.profiles.ok_or_else(|| ConfigError::NoProfiles {
        path: path.to_path_buf(),
    })
}

fn read_profile(path: &Path, name: &str) -> Result<ProfileConfig, ConfigError> {
    read_profiles(path)?
        .remove(name)
        .ok_or_else(|| ConfigError::UnknownProfile {
            name: name.to_string(),
            path: path.to_path_buf(),
        })
}

pub fn config_path() -> Result<PathBuf, ConfigError> {
    config_path_with(|key| env::var(key).ok())
}

fn config_path_with(lookup: impl Fn(&str) -> Option<String>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = non_empty(lookup("RCHAIN_CONFIG")) {
        return Ok(PathBuf::from(path));
    }
    if let Some(xdg) = non_empty(lookup("XDG_CONFIG_HOME")) {
        return Ok(PathBuf::from(xdg).join("rchain").join("config.toml"));
    }
    let home = non_empty(lookup("HOME")).ok_or(ConfigError::NoConfigPath)?;
    Ok(PathBuf::from(home)
        .join(".config")
        .join("rchain")
        .join("config.toml"))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|err: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_profile_or_env() {
        let settings = Settings::resolve(env_of(&[])).unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.model, "gpt-4o");
        assert_eq!(settings.data_file("odyssey.txt"), PathBuf::from("books/odyssey.txt"));
    }

    #[test]
    fn profile_then_env_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[profiles.claude]\nprovider = \"anthropic\"\ntemperature = 0.2\nretries = 5\nchroma_url = \"http://chroma:8000\""
        )
        .unwrap();
        let path = file.path().to_string_lossy().to_string();

        let settings = Settings::resolve(env_of(&[
            ("RCHAIN_CONFIG", &path),
            ("RCHAIN_PROFILE", "claude"),
            ("RCHAIN_RETRIES", "1"),
        ]))
        .unwrap();

        assert_eq!(settings.provider, Provider::Anthropic);
        assert_eq!(settings.model, Provider::Anthropic.default_model());
        assert_eq!(settings.temperature, Some(0.2));
        assert_eq!(settings.retry.retries, 1);
        assert_eq!(settings.chroma_url, "http://chroma:8000");
    }

    #[test]
    fn unknown_profile_names_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[profiles.default]\nmodel = \"gpt-4o-mini\"").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let err = Settings::resolve(env_of(&[("RCHAIN_CONFIG", &path), ("RCHAIN_PROFILE", "missing")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProfile { ref name, .. } if name == "missing"));
    }

    #[test]
    fn rejects_bad_numbers_and_providers() {
        let err = Settings::resolve(env_of(&[("RCHAIN_TIMEOUT", "soon")])).unwrap_err();
        assert!(err.to_string().starts_with("Invalid value 'soon' for RCHAIN_TIMEOUT"));

        let profile = ProfileConfig {
            provider: Some("mistral".to_string()),
            ..Default::default()
        };
        assert!(Settings::default().apply_profile(&profile).is_err());
    }

    #[test]
    fn config_path_prefers_explicit_then_xdg() {
        assert_eq!(
            config_path_with(env_of(&[("RCHAIN_CONFIG", " /tmp/r.toml "), ("HOME", "/home/u")])).unwrap(),
            PathBuf::from("/tmp/r.toml")
        );
        assert_eq!(
            config_path_with(env_of(&[("XDG_CONFIG_HOME", "/xdg"), ("HOME", "/home/u")])).unwrap(),
            PathBuf::from("/xdg/rchain/config.toml")
        );
        assert!(matches!(config_path_with(env_of(&[])), Err(ConfigError::NoConfigPath)));
    }
}
