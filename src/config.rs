//! Application configuration.
//!
//! Layered: optional TOML file, then environment (a `.env` file is loaded
//! first), then command-line flags. Example file:
//!
//! ```toml
//! backend = "remote"
//!
//! [local]
//! database = "crmdesk.db"
//! require_confirmation = false
//!
//! [remote]
//! url = "https://project.supabase.co"
//! anon_key = "..."
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

pub const ENV_BACKEND: &str = "CRMDESK_BACKEND";
pub const ENV_DATABASE: &str = "CRMDESK_DATABASE";
pub const ENV_REMOTE_URL: &str = "SUPABASE_URL";
pub const ENV_REMOTE_KEY: &str = "SUPABASE_ANON_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// SQLite file on this machine.
    #[default]
    Local,
    /// Hosted backend over HTTP.
    Remote,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Remote => write!(f, "remote"),
        }
    }
}

impl FromStr for Backend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "remote" => Ok(Backend::Remote),
            _ => bail!("Invalid backend '{}'. Valid values: local, remote", s),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// New accounts must be confirmed before they can sign in.
    #[serde(default = "default_true")]
    pub require_confirmation: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            require_confirmation: true,
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("crmdesk.db")
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub anon_key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: Backend,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
}

/// Values given on the command line; they win over everything else.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub backend: Option<Backend>,
    pub database: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse configuration")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file {}", path.display()))?;
        Self::from_toml(&content).with_context(|| format!("Invalid configuration in {}", path.display()))
    }

    /// Loads the full layered configuration and validates it.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!(error = %e, "could not load .env file");
            }
        }
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.apply_overrides(overrides);
        config.validate()?;
        Ok(config)
    }

    /// Applies environment variables read through `lookup`. Empty values are
    /// ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(backend) = get(ENV_BACKEND) {
            self.backend = backend
                .parse()
                .with_context(|| format!("Invalid {ENV_BACKEND}"))?;
        }
        if let Some(database) = get(ENV_DATABASE) {
            self.local.database = PathBuf::from(database);
        }
        if let Some(url) = get(ENV_REMOTE_URL) {
            self.remote.url = Some(url);
        }
        if let Some(key) = get(ENV_REMOTE_KEY) {
            self.remote.anon_key = Some(key);
        }
        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(backend) = overrides.backend {
            self.backend = backend;
        }
        if let Some(database) = &overrides.database {
            self.local.database = database.clone();
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.backend == Backend::Remote {
            let missing = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
            if missing(&self.remote.url) {
                bail!("The remote backend needs a URL (set {ENV_REMOTE_URL} or remote.url)");
            }
            if missing(&self.remote.anon_key) {
                bail!("The remote backend needs an anon key (set {ENV_REMOTE_KEY} or remote.anon_key)");
            }
        }
        if self.backend == Backend::Local && self.local.database.as_os_str().is_empty() {
            bail!("The local backend needs a database path");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn empty_file_gives_local_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.local.database, PathBuf::from("crmdesk.db"));
        assert!(config.local.require_confirmation);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn layers_apply_in_order() {
        let mut config = AppConfig::from_toml(
            r#"
            backend = "local"
            [local]
            database = "from-file.db"
            "#,
        )
        .unwrap();

        let env: HashMap<&str, &str> = [
            (ENV_BACKEND, "remote"),
            (ENV_DATABASE, "from-env.db"),
            (ENV_REMOTE_URL, "https://example.supabase.co"),
            (ENV_REMOTE_KEY, "anon"),
        ]
        .into();
        config.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.backend, Backend::Remote);
        assert_eq!(config.local.database, PathBuf::from("from-env.db"));

        config.apply_overrides(&Overrides {
            backend: Some(Backend::Local),
            database: Some(PathBuf::from("from-cli.db")),
        });
        assert_eq!(config.backend, Backend::Local);
        assert_eq!(config.local.database, PathBuf::from("from-cli.db"));
    }

    #[test]
    fn remote_requires_url_and_key() {
        let mut config = AppConfig {
            backend: Backend::Remote,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        config.remote.url = Some("https://example.supabase.co".into());
        assert!(config.validate().is_err());
        config.remote.anon_key = Some("anon".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn bad_backend_in_env_is_reported() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(|k| (k == ENV_BACKEND).then(|| "cloud".to_string()))
            .unwrap_err();
        assert!(format!("{err:#}").contains("Invalid backend"));
    }
}
