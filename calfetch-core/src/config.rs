//! calfetch configuration.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::cache::EventCacheBuilder;
use crate::error::{CalFetchError, CalFetchResult};
use crate::event::RemoteEvent;

/// Prefix of the environment variables that override the config file,
/// e.g. `CALFETCH_API_KEY`.
pub const ENV_PREFIX: &str = "CALFETCH";

/// Configuration at ~/.config/calfetch/config.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub calendar_id: String,

    #[serde(default)]
    pub always_refetch: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
}

impl CacheConfig {
    pub fn config_path() -> CalFetchResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalFetchError::Config("Could not determine config directory".into()))?
            .join("calfetch");

        Ok(config_dir.join("config.toml"))
    }

    /// Load from the default config path, then apply `CALFETCH_*` variables.
    pub fn load() -> CalFetchResult<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> CalFetchResult<Self> {
        Self::load_with(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with(path: &Path, environment: Environment) -> CalFetchResult<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment)
            .build()
            .map_err(|e| CalFetchError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalFetchError::Config(e.to_string()))
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalFetchResult<()> {
        let contents = "\
# calfetch configuration

# Google API key with access to the Calendar API:
# api_key = \"AIza...\"

# Calendar to read, e.g. a public calendar address:
# calendar_id = \"en.usa#holiday@group.v.calendar.google.com\"

# Fetch every requested window again instead of reusing what was fetched:
# always_refetch = false
";

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalFetchError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalFetchError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }

    /// Copy of this config that is safe to print.
    pub fn redacted(&self) -> Self {
        let count = self.api_key.chars().count();
        let hidden = if count <= 4 { count } else { count - 4 };
        let api_key: String = "*"
            .repeat(hidden)
            .chars()
            .chain(self.api_key.chars().skip(hidden))
            .collect();

        CacheConfig {
            api_key,
            ..self.clone()
        }
    }

    /// An [`EventCacheBuilder`] preloaded with this configuration.
    pub fn builder(&self) -> EventCacheBuilder<RemoteEvent> {
        let builder = EventCacheBuilder::new(&self.api_key, &self.calendar_id)
            .always_refetch(self.always_refetch);

        match &self.api_base_url {
            Some(url) => builder.api_base_url(url),
            None => builder,
        }
    }
}
