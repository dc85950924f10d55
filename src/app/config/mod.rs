mod cli;
pub mod groups;
pub mod serde_helpers;
mod validation;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("Failed to read config file {path}: {source}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Parse error: {0}")]
    ParseError(#[from] toml::de::Error),
}

pub use cli::{Cli, Config, DEFAULT_CONFIG_PATH};
pub use groups::{AgentConfig, BatchConfig, FileConfig, LogConfig, MatomoConfig, TitleConfig};
