use super::groups::{AgentConfig, BatchConfig, FileConfig, LogConfig, MatomoConfig, TitleConfig};
use super::serde_helpers::split_list;
use super::ConfigError;
use crate::parser::LogFormat;
use crate::sender::client::normalize_base_url;
use crate::sender::{Endpoints, SiteContext};
use clap::Parser;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "/opt/matomo-log-agent/config.toml";

/// Command-line flags. Every flag overrides the matching config file value.
#[derive(Parser, Debug, Clone)]
#[command(name = "matomo-log-agent", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(long, env = "MATOMO_AGENT_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Replay the log file once from the start instead of tailing it
    #[arg(long, env = "MATOMO_AGENT_CATLOG")]
    pub catlog: bool,

    /// Requests per second in replay mode
    #[arg(long, env = "MATOMO_AGENT_RPS", default_value_t = 1)]
    pub rps: u32,

    /// Matomo base URL
    #[arg(long, env = "MATOMO_URL")]
    pub matomo_url: Option<String>,

    /// Matomo token_auth
    #[arg(long, env = "MATOMO_TOKEN_AUTH")]
    pub token_auth: Option<String>,

    /// Matomo site id
    #[arg(long, env = "MATOMO_SITE_ID")]
    pub site_id: Option<String>,

    /// Report 4xx/5xx hits to the Agent plugin endpoint
    #[arg(long, env = "MATOMO_PLUGIN", num_args = 0..=1, default_missing_value = "true")]
    pub plugin: Option<bool>,

    /// Track downloads
    #[arg(long, env = "MATOMO_DOWNLOADS", num_args = 0..=1, default_missing_value = "true")]
    pub downloads: Option<bool>,

    /// Log format (nginx, apache or csv)
    #[arg(long, env = "MATOMO_AGENT_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Access log to read
    #[arg(long, env = "MATOMO_AGENT_LOG_PATH")]
    pub log_path: Option<PathBuf>,

    /// Comma-separated user agent substrings to track
    #[arg(long, env = "MATOMO_AGENT_USER_AGENTS")]
    pub user_agents: Option<String>,

    /// Agent log level (error, warn, info, debug, trace)
    #[arg(long, env = "MATOMO_AGENT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Agent log file; stderr when unset
    #[arg(long, env = "MATOMO_AGENT_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Fetch page titles and report them as action names
    #[arg(long, env = "MATOMO_AGENT_COLLECT_TITLE", num_args = 0..=1, default_missing_value = "true")]
    pub collect_title: Option<bool>,

    /// Origin to fetch page titles from
    #[arg(long, env = "MATOMO_AGENT_TITLE_DOMAIN")]
    pub title_domain: Option<String>,

    /// Send hits as bulk requests
    #[arg(long, env = "MATOMO_AGENT_BATCH", num_args = 0..=1, default_missing_value = "true")]
    pub batch: Option<bool>,
}

/// Resolved runtime configuration: flags over file values over defaults.
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub config_path: PathBuf,
    pub catlog: bool,
    pub rps: u32,
    pub matomo: MatomoConfig,
    pub log: LogConfig,
    pub agent: AgentConfig,
    pub title: TitleConfig,
    pub batch: BatchConfig,
}

impl FileConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::FileError {
            path: path.display().to_string(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }
}

impl Config {
    pub fn from_args<I, T>(args: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::from_cli(Cli::parse_from(args))
    }

    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let file = FileConfig::from_file(&cli.config)?;
        let mut config = Self::merge(cli, file);
        config.post_process()?;
        config.validate()?;
        Ok(config)
    }

    fn merge(cli: Cli, file: FileConfig) -> Self {
        let FileConfig {
            mut matomo,
            mut log,
            mut agent,
            mut title,
            mut batch,
        } = file;

        if let Some(url) = cli.matomo_url {
            matomo.url = url;
        }
        if let Some(token) = cli.token_auth {
            matomo.token_auth = token;
        }
        if let Some(site_id) = cli.site_id {
            matomo.site_id = site_id;
        }
        if let Some(plugin) = cli.plugin {
            matomo.plugin = plugin;
        }
        if let Some(downloads) = cli.downloads {
            matomo.downloads = downloads;
        }
        if let Some(format) = cli.log_format {
            log.log_format = format;
        }
        if let Some(path) = cli.log_path {
            log.log_path = path;
        }
        if let Some(agents) = cli.user_agents {
            log.user_agents = split_list(&agents);
        }
        if let Some(level) = cli.log_level {
            agent.log_level = level;
        }
        if let Some(file) = cli.log_file {
            agent.log_file = Some(file);
        }
        if let Some(collect) = cli.collect_title {
            title.collect_titles = collect;
        }
        if let Some(domain) = cli.title_domain {
            title.title_domain = Some(domain);
        }
        if let Some(enabled) = cli.batch {
            batch.enabled = enabled;
        }

        Self {
            config_path: cli.config,
            catlog: cli.catlog,
            rps: cli.rps,
            matomo,
            log,
            agent,
            title,
            batch,
        }
    }

    pub fn post_process(&mut self) -> Result<(), ConfigError> {
        if !self.matomo.url.trim().is_empty() {
            self.matomo.url = normalize_base_url(&self.matomo.url);
        }
        self.matomo.site_id = self.matomo.site_id.trim().to_string();
        self.log.log_format = self.log.log_format.trim().to_lowercase();

        // Blank entries would match every user agent or URL
        self.log.user_agents.retain(|agent| !agent.trim().is_empty());
        self.log.excluded_urls.retain(|url| !url.trim().is_empty());

        self.matomo.website_url = self
            .matomo
            .website_url
            .take()
            .filter(|url| !url.trim().is_empty());
        self.title.title_domain = self
            .title
            .title_domain
            .take()
            .filter(|domain| !domain.trim().is_empty());

        Ok(())
    }

    /// Tracker, Agent and API endpoints derived from `matomo.url`.
    pub fn endpoints(&self) -> Result<Endpoints, ConfigError> {
        Endpoints::from_base(&self.matomo.url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid Matomo URL '{}': {e}", self.matomo.url))
        })
    }

    pub fn log_format(&self) -> Result<LogFormat, ConfigError> {
        self.log.log_format.parse().map_err(|_| {
            ConfigError::InvalidConfig(format!(
                "Unknown log format '{}'. Valid formats: nginx, apache, csv",
                self.log.log_format
            ))
        })
    }

    pub fn site_context(&self) -> SiteContext {
        SiteContext {
            site_id: self.matomo.site_id.clone(),
            token_auth: self.matomo.token_auth.clone(),
        }
    }

    /// Delay between deliveries in replay mode.
    pub fn replay_interval(&self) -> Duration {
        (Duration::from_secs(1) / self.rps.max(1)).max(Duration::from_nanos(1))
    }
}
