//! Server configuration.
//!
//! Loaded once at startup from a TOML file and threaded through handler state;
//! nothing reads configuration globally.

use std::fs;

use nufeed_core::{error::FeedError, FeedResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// A customizable link shown on the feed landing page.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Link {
    pub href: String,
    pub title: String,
}

/// Application's configuration
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Display name of the feed.
    /// Default: "NuFeed repository"
    pub name: String,

    /// Short description shown in the landing page.
    pub description: String,

    /// Customizable links for the landing page.
    pub links: Vec<Link>,

    /// Whether the landing page shows the configured links.
    /// Default: false
    pub display_links: bool,

    /// Hash algorithm recorded for uploaded packages.
    /// Default: SHA512
    pub hash_algorithm: String,

    /// Address to bind the HTTP listener to.
    /// Default: 127.0.0.1
    pub bind: String,

    /// Port for the HTTP listener.
    /// Default: 5000
    pub port: u16,

    /// Path to the SQLite package database.
    /// Default: nufeed.db
    pub db_path: String,

    /// Directory holding the package archives.
    /// Default: packages
    pub packages_path: String,

    /// External base URL advertised in feed documents, without a trailing
    /// slash. When unset, the bind address and port are used.
    pub external_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: "NuFeed repository".into(),
            description: "This is a NuGet repository server.".into(),
            links: vec![],
            display_links: false,
            hash_algorithm: "SHA512".into(),
            bind: "127.0.0.1".into(),
            port: 5000,
            db_path: "nufeed.db".into(),
            packages_path: "packages".into(),
            external_url: None,
        }
    }
}

impl Config {
    /// Loads configuration from `path`, or the defaults when no path is given.
    pub fn load(path: Option<&str>) -> FeedResult<Self> {
        let config = match path {
            Some(path) => {
                let raw = fs::read_to_string(path).map_err(|err| FeedError::IoError {
                    action: format!("reading config file {path}"),
                    source: err,
                })?;
                toml::from_str(&raw)
                    .map_err(|err| FeedError::Custom(format!("invalid config: {err}")))?
            }
            None => Self::default(),
        };

        if let Some(external) = &config.external_url {
            Url::parse(external)
                .map_err(|err| FeedError::Custom(format!("invalid external_url: {err}")))?;
        }

        Ok(config)
    }

    /// The base URL feed documents are rendered against.
    pub fn base_url(&self) -> String {
        match &self.external_url {
            Some(external) => external.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.bind, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::load(None).unwrap();
        assert_eq!(config.name, "NuFeed repository");
        assert_eq!(config.hash_algorithm, "SHA512");
        assert_eq!(config.base_url(), "http://127.0.0.1:5000");
    }

    #[test]
    fn test_parse_with_partial_fields() {
        let config: Config = toml::from_str(
            r#"
            name = "Team feed"
            port = 8080
            external_url = "https://nuget.example.com/feed/"

            [[links]]
            href = "https://example.com/docs"
            title = "Docs"
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "Team feed");
        assert_eq!(config.port, 8080);
        assert_eq!(config.links.len(), 1);
        // Untouched fields keep their defaults.
        assert_eq!(config.db_path, "nufeed.db");
        // The advertised base never carries a trailing slash.
        assert_eq!(config.base_url(), "https://nuget.example.com/feed");
    }

    #[test]
    fn test_invalid_external_url_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nufeed.toml");
        std::fs::write(&path, "external_url = \"not a url\"").unwrap();

        let result = Config::load(path.to_str());
        assert!(result.is_err());
    }
}
