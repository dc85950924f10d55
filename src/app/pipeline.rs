use super::config::{Config, ConfigError};
use crate::{
    buffer::{Batch, BatchBuffer},
    classifier::{self, Classification},
    collector::{CollectorError, LineSource},
    domain::HitRecord,
    domain::hit::join_url,
    enricher::TitleEnricher,
    parser::{LineParser, ParseError},
    sender::{HitParams, HitTransmitter, SiteContext},
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use url::{Position, Url};

/// Terminal state of one log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineOutcome {
    /// Posted to the tracker
    Delivered,
    /// Queued for the next bulk request
    Buffered,
    /// Classified out (static asset, excluded URL or untracked user agent)
    DiscardedFiltered,
    /// Line or timestamp could not be parsed
    DiscardedUnparsable,
    /// Delivery attempted once and failed
    DeliveryFailed,
}

/// Per-outcome counters for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub lines: u64,
    pub delivered: u64,
    pub buffered: u64,
    pub filtered: u64,
    pub unparsable: u64,
    pub failed: u64,
}

impl RunSummary {
    pub fn record(&mut self, outcome: LineOutcome) {
        self.lines += 1;
        match outcome {
            LineOutcome::Delivered => self.delivered += 1,
            LineOutcome::Buffered => self.buffered += 1,
            LineOutcome::DiscardedFiltered => self.filtered += 1,
            LineOutcome::DiscardedUnparsable => self.unparsable += 1,
            LineOutcome::DeliveryFailed => self.failed += 1,
        }
    }
}

/// Parse, classify, enrich and deliver access-log lines.
///
/// Cloning is cheap; clones share the title cache and the batch buffer.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: Arc<Config>,
    parser: LineParser,
    site: SiteContext,
    transmitter: HitTransmitter,
    enricher: Option<TitleEnricher>,
    buffer: Option<Arc<BatchBuffer>>,
}

impl Pipeline {
    pub fn new(
        config: Arc<Config>,
        transmitter: HitTransmitter,
        enricher: Option<TitleEnricher>,
        buffer: Option<Arc<BatchBuffer>>,
    ) -> Result<Self, ConfigError> {
        let parser = LineParser::new(config.log_format()?)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        let site = config.site_context();

        Ok(Self {
            config,
            parser,
            site,
            transmitter,
            enricher,
            buffer,
        })
    }

    pub fn transmitter(&self) -> &HitTransmitter {
        &self.transmitter
    }

    pub fn buffer(&self) -> Option<&Arc<BatchBuffer>> {
        self.buffer.as_ref()
    }

    /// Parse one line, logging and swallowing failures.
    pub fn parse_line(&self, line: &str) -> Option<HitRecord> {
        match self.parser.parse(line) {
            Ok(hit) => Some(hit),
            Err(ParseError::EmptyLine) => None,
            Err(e) => {
                warn!(format = %self.parser.format(), error = %e, line, "Error parsing line");
                None
            }
        }
    }

    /// Parse and process a single line.
    pub async fn process_line(&self, line: &str) -> LineOutcome {
        match self.parse_line(line) {
            Some(hit) => self.process_hit(hit).await,
            None => LineOutcome::DiscardedUnparsable,
        }
    }

    /// Classify, enrich and deliver one parsed hit.
    ///
    /// Every delivery is attempted at most once. Failures are logged and
    /// reported through the returned outcome, never retried.
    pub async fn process_hit(&self, hit: HitRecord) -> LineOutcome {
        let config = &self.config;
        let class = Classification::of(&hit.url, &hit.user_agent, &config.log.user_agents);

        if class.ignored {
            debug!(url = %hit.url, "Ignoring static or probe request");
            return LineOutcome::DiscardedFiltered;
        }
        if classifier::is_excluded(&hit.url, &config.log.excluded_urls) {
            debug!(url = %hit.url, "URL excluded");
            return LineOutcome::DiscardedFiltered;
        }
        if !class.user_agent_allowed {
            debug!(user_agent = %hit.user_agent, "User agent not tracked");
            return LineOutcome::DiscardedFiltered;
        }

        // No title fetch for hits that cannot be sent
        if hit.normalized.is_none() {
            warn!(url = %hit.url, timestamp = %hit.timestamp, "Dropping hit without a usable timestamp");
            return LineOutcome::DiscardedUnparsable;
        }

        let url = hit.resolved_url(config.matomo.website_url.as_deref());
        let title = self.lookup_title(&hit, &url).await;
        let download = class.is_download && config.matomo.downloads;

        let params = match HitParams::from_hit(&hit, &self.site, &url, title.as_deref(), download) {
            Ok(params) => params,
            Err(e) => {
                warn!(url = %url, error = %e, "Dropping hit");
                return LineOutcome::DiscardedUnparsable;
            }
        };

        if config.matomo.plugin && classifier::is_error_status(&hit.status) {
            if let Err(e) = self.transmitter.send_error_hit(&params).await {
                error!(url = %url, status = %hit.status, error = %e, "Failed to report error hit");
            }
        }

        match &self.buffer {
            Some(buffer) => {
                if let Some(batch) = buffer.push(params) {
                    self.send_batch(batch).await;
                }
                LineOutcome::Buffered
            }
            None => match self.transmitter.send_hit(&params).await {
                Ok(_) => LineOutcome::Delivered,
                Err(e) => {
                    error!(url = %url, error = %e, "Failed to send hit");
                    LineOutcome::DeliveryFailed
                }
            },
        }
    }

    /// Drain whatever is buffered as one final bulk request.
    ///
    /// Returns the number of hits handed to the tracker.
    pub async fn flush(&self) -> usize {
        let Some(batch) = self.buffer.as_ref().and_then(|buffer| buffer.drain()) else {
            return 0;
        };
        let size = batch.size();
        info!(hits = size, "Flushing buffered hits");
        self.send_batch(batch).await;
        size
    }

    /// Consume `source` until it is exhausted or `cancel` fires.
    ///
    /// With `throttle` set, parsed hits are delivered no faster than one per
    /// period; unparsable lines do not consume a tick.
    pub async fn run<S: LineSource>(
        &self,
        mut source: S,
        throttle: Option<Duration>,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, CollectorError> {
        let mut ticker = throttle.map(replay_ticker);
        let mut summary = RunSummary::default();

        loop {
            let line = tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                line = source.next_line() => line?,
            };
            let Some(line) = line else {
                break;
            };

            let Some(hit) = self.parse_line(&line) else {
                summary.record(LineOutcome::DiscardedUnparsable);
                continue;
            };

            if let Some(ticker) = ticker.as_mut() {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
            }

            summary.record(self.process_hit(hit).await);
        }

        Ok(summary)
    }

    async fn send_batch(&self, batch: Batch) {
        if let Err(e) = self.transmitter.send_batch(&batch).await {
            error!(batch_id = batch.id(), hits = batch.size(), error = %e, "Failed to send batch");
        }
    }

    async fn lookup_title(&self, hit: &HitRecord, resolved: &str) -> Option<String> {
        let enricher = self.enricher.as_ref()?;
        let target = title_source_url(hit, resolved, self.config.title.title_domain.as_deref());

        match enricher.title_for(&target).await {
            Ok(title) => Some(title),
            Err(e) => {
                warn!(url = %target, error = %e, "Title lookup failed");
                None
            }
        }
    }
}

fn replay_ticker(period: Duration) -> Interval {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

/// URL a page title is fetched from: the request path on `title_domain`
/// when one is configured, the resolved hit URL otherwise.
fn title_source_url(hit: &HitRecord, resolved: &str, title_domain: Option<&str>) -> String {
    let Some(domain) = title_domain else {
        return resolved.to_string();
    };

    match Url::parse(&hit.url) {
        Ok(absolute) => join_url(domain, &absolute[Position::BeforePath..]),
        Err(_) => join_url(domain, &hit.url),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(url: &str) -> HitRecord {
        crate::parser::parse(
            &format!(r#"10.0.0.1 - - [10/Oct/2024:13:55:36 +0200] "GET {url} HTTP/1.1" 200 1 "-" "curl/8.0""#),
            "nginx",
        )
        .unwrap()
    }

    #[test]
    fn test_title_source_defaults_to_resolved_url() {
        let hit = hit("/about");
        assert_eq!(
            title_source_url(&hit, "https://www.example.com/about", None),
            "https://www.example.com/about"
        );
    }

    #[test]
    fn test_title_source_uses_title_domain() {
        let relative = hit("/about?lang=en");
        assert_eq!(
            title_source_url(&relative, "ignored", Some("http://backend.internal")),
            "http://backend.internal/about?lang=en"
        );

        let absolute = hit("https://www.example.com/docs/");
        assert_eq!(
            title_source_url(&absolute, "ignored", Some("http://backend.internal/")),
            "http://backend.internal/docs/"
        );
    }

    #[test]
    fn test_summary_counts_every_outcome() {
        let mut summary = RunSummary::default();
        for outcome in [
            LineOutcome::Delivered,
            LineOutcome::Delivered,
            LineOutcome::Buffered,
            LineOutcome::DiscardedFiltered,
            LineOutcome::DiscardedUnparsable,
            LineOutcome::DeliveryFailed,
        ] {
            summary.record(outcome);
        }

        assert_eq!(
            summary,
            RunSummary {
                lines: 6,
                delivered: 2,
                buffered: 1,
                filtered: 1,
                unparsable: 1,
                failed: 1,
            }
        );
    }
}
