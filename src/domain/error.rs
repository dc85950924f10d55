use thiserror::Error;

/// Top-level error type for the agent.
///
/// Only fatal conditions surface here; per-line failures are logged and
/// discarded inside the pipeline.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::app::ConfigError),

    #[error("Logging initialization error: {0}")]
    Logging(#[from] crate::app::InitializationError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] crate::sender::ClientError),

    #[error("Token validation failed: {0}")]
    TokenValidation(#[source] crate::sender::ClientError),

    #[error("Title cache error: {0}")]
    TitleCache(#[from] crate::enricher::EnrichError),

    #[error("Log source error: {0}")]
    Source(#[from] crate::collector::CollectorError),
}
