pub mod config;
pub mod initialization;
pub mod logging_system;
pub mod pipeline;
pub mod shutdown;

pub use config::{Cli, Config, ConfigError};
pub use initialization::{InitializationError, LogLevel};
pub use logging_system::{LoggingSystem, setup_logging};
pub use pipeline::{LineOutcome, Pipeline, RunSummary};

use crate::{
    buffer::BatchBuffer,
    collector::{DEFAULT_POLL_INTERVAL, ReplaySource, TailSource},
    domain::AgentError,
    enricher::{TitleCache, TitleEnricher},
    sender::{ClientConfig, HitTransmitter, MatomoClient},
};
use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct App {
    config: Arc<Config>,
    pipeline: Pipeline,
}

impl App {
    /// Build the delivery pipeline and check the token against Matomo.
    ///
    /// A rejected token or unreadable title cache is fatal.
    pub async fn from_config(config: Config) -> Result<Self, AgentError> {
        let config = Arc::new(config);

        let client = MatomoClient::new(ClientConfig::new(config.endpoints()?))?;
        let version = client
            .validate_token(&config.matomo.token_auth)
            .await
            .map_err(AgentError::TokenValidation)?;
        info!(matomo_version = %version, "Connected to Matomo");

        let enricher = if config.title.collect_titles {
            let cache = TitleCache::load(&config.title.cache_file).await?;
            let entries = cache.len().await;
            info!(
                path = %cache.path().display(),
                entries,
                "Loaded title cache"
            );
            Some(TitleEnricher::new(client.client.clone(), Arc::new(cache)))
        } else {
            None
        };

        let buffer = config.batch.enabled.then(|| Arc::new(BatchBuffer::default()));
        if let Some(buffer) = &buffer {
            info!(threshold = buffer.threshold(), "Batching enabled");
        }
        let transmitter = HitTransmitter::new(client, config.matomo.token_auth.clone());
        let pipeline = Pipeline::new(Arc::clone(&config), transmitter, enricher, buffer)?;

        Ok(Self { config, pipeline })
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Process the configured log until it ends (replay) or a shutdown
    /// signal arrives (tail). Buffered hits are flushed either way.
    pub async fn run(self) -> Result<RunSummary, AgentError> {
        let cancel = CancellationToken::new();
        let listener = shutdown::spawn_signal_listener(cancel.clone());
        let log_path = &self.config.log.log_path;

        let result = if self.config.catlog {
            info!(
                path = %log_path.display(),
                rps = self.config.rps,
                "Starting in catlog mode"
            );
            match ReplaySource::open(log_path).await {
                Ok(source) => {
                    let throttle = Some(self.config.replay_interval());
                    self.pipeline.run(source, throttle, &cancel).await
                }
                Err(e) => Err(e),
            }
        } else {
            info!(path = %log_path.display(), "Start tailing the log");
            match TailSource::open(log_path, DEFAULT_POLL_INTERVAL).await {
                Ok(source) => self.pipeline.run(source, None, &cancel).await,
                Err(e) => Err(e),
            }
        };

        let flushed = self.pipeline.flush().await;
        cancel.cancel();
        if let Err(e) = listener.await {
            warn!(error = %e, "Signal listener terminated abnormally");
        }

        let stats = self.pipeline.transmitter().client.stats.snapshot();
        info!(
            requests = stats.total_requests,
            successful = stats.successful_requests,
            failed = stats.failed_requests,
            avg_response_ms = stats.average_response_time_ms,
            success_rate = stats.success_rate(),
            flushed,
            "Delivery statistics"
        );

        let summary = result?;
        info!(
            lines = summary.lines,
            delivered = summary.delivered,
            buffered = summary.buffered,
            filtered = summary.filtered,
            unparsable = summary.unparsable,
            failed = summary.failed,
            "Finished processing log"
        );
        Ok(summary)
    }
}

// Main entry point for the application
pub async fn main() -> anyhow::Result<()> {
    let config = Config::from_cli(Cli::parse()).context("Failed to load configuration")?;

    // Held until exit so the file writer flushes
    let _guard = setup_logging(&config.agent.log_level, config.agent.log_file.as_deref())
        .context("Failed to initialize logging")?;

    info!("Starting matomo-log-agent v{}", crate::VERSION);
    info!(
        matomo = %config.matomo.url,
        site_id = %config.matomo.site_id,
        format = %config.log.log_format,
        batch = config.batch.enabled,
        titles = config.title.collect_titles,
        "Configuration loaded"
    );

    let app = App::from_config(config).await.context("Startup failed")?;
    app.run().await?;
    Ok(())
}
