//! TOML file schema, one struct per `[section]`.

use super::serde_helpers::string_or_number;
use crate::enricher::cache::DEFAULT_CACHE_FILE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub matomo: MatomoConfig,
    pub log: LogConfig,
    pub agent: AgentConfig,
    pub title: TitleConfig,
    pub batch: BatchConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatomoConfig {
    /// Base URL of the Matomo instance
    pub url: String,
    #[serde(deserialize_with = "string_or_number")]
    pub site_id: String,
    /// Public site URL that relative request paths are resolved against
    pub website_url: Option<String>,
    pub token_auth: String,
    /// Also report 4xx/5xx hits to the Agent plugin endpoint
    pub plugin: bool,
    pub downloads: bool,
}

impl Default for MatomoConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            site_id: String::new(),
            website_url: None,
            token_auth: String::new(),
            plugin: false,
            downloads: true,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub log_format: String,
    pub log_path: PathBuf,
    /// Substring allow-list; empty tracks every user agent
    pub user_agents: Vec<String>,
    pub excluded_urls: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub log_level: String,
    pub log_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleConfig {
    pub collect_titles: bool,
    /// Origin titles are fetched from instead of the reported URL's
    pub title_domain: Option<String>,
    pub cache_file: PathBuf,
}

impl Default for TitleConfig {
    fn default() -> Self {
        Self {
            collect_titles: false,
            title_domain: None,
            cache_file: PathBuf::from(DEFAULT_CACHE_FILE),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    pub enabled: bool,
}
