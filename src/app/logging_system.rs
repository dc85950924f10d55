use super::initialization::{InitializationError, LogDirective, LogLevel};
use parking_lot::RwLock;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Directive set used to build the global `EnvFilter`.
pub struct LoggingSystem {
    directives: RwLock<Vec<LogDirective>>,
}

impl LoggingSystem {
    pub fn new() -> Self {
        Self {
            directives: RwLock::new(Vec::new()),
        }
    }

    /// Add a `target=level` directive; malformed directives are skipped.
    pub fn add_directive(&self, directive_str: &str) -> Result<(), InitializationError> {
        match LogDirective::parse(directive_str) {
            Ok(directive) => {
                self.directives.write().push(directive);
                Ok(())
            }
            Err(e) if e.is_recoverable() => {
                eprintln!("Warning: {e}, skipping directive");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Keep HTTP client internals quiet unless asked for.
    pub fn add_default_directives(&self) {
        let mut directives = self.directives.write();
        for target in ["hyper", "reqwest", "h2"] {
            directives.push(LogDirective::new(target, LogLevel::Warn));
        }
    }

    pub fn build_filter_string(&self, default_level: LogLevel) -> String {
        let directives = self.directives.read();

        std::iter::once(default_level.as_str().to_string())
            .chain(directives.iter().map(LogDirective::to_filter_string))
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Install the global subscriber.
    ///
    /// `RUST_LOG`, when set, replaces the computed filter. With `log_file`
    /// set, output goes to a daily-rolling file through a non-blocking
    /// writer; the returned guard must live until shutdown to flush it.
    pub fn initialize_tracing(
        &self,
        default_level: LogLevel,
        log_file: Option<&Path>,
    ) -> Result<Option<WorkerGuard>, InitializationError> {
        let filter_string = self.build_filter_string(default_level);
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(&filter_string).map_err(|e| {
                InitializationError::LoggingInitFailed {
                    details: format!("Failed to create EnvFilter with '{filter_string}'"),
                    source: Box::new(e),
                }
            })?,
        };

        let registry = tracing_subscriber::registry().with(env_filter);

        let guard = match log_file {
            Some(path) => {
                let (directory, file_name) = split_log_path(path)?;
                let appender = tracing_appender::rolling::daily(directory, file_name);
                let (writer, guard) = tracing_appender::non_blocking(appender);

                registry
                    .with(fmt::layer().with_writer(writer).with_ansi(false).with_target(true))
                    .try_init()
                    .map_err(|e| InitializationError::LoggingInitFailed {
                        details: "Failed to set global tracing subscriber".to_string(),
                        source: Box::new(e),
                    })?;
                Some(guard)
            }
            None => {
                registry
                    .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
                    .try_init()
                    .map_err(|e| InitializationError::LoggingInitFailed {
                        details: "Failed to set global tracing subscriber".to_string(),
                        source: Box::new(e),
                    })?;
                None
            }
        };

        Ok(guard)
    }
}

impl Default for LoggingSystem {
    fn default() -> Self {
        Self::new()
    }
}

fn split_log_path(path: &Path) -> Result<(&Path, &std::ffi::OsStr), InitializationError> {
    let file_name = path
        .file_name()
        .ok_or_else(|| InitializationError::InvalidLogFile {
            path: path.display().to_string(),
        })?;
    let directory = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    Ok((directory, file_name))
}

/// Split `level[,target=level...]` into the default level and a directive
/// set. An unknown default level falls back to `info` and is returned so it
/// can be reported once tracing is up.
fn configure(
    spec: &str,
) -> Result<(LoggingSystem, LogLevel, Option<InitializationError>), InitializationError> {
    let (level, extra) = spec.split_once(',').unwrap_or((spec, ""));
    let (default_level, level_error) = match level.parse::<LogLevel>() {
        Ok(level) => (level, None),
        Err(e) => (LogLevel::Info, Some(e)),
    };

    let logging_system = LoggingSystem::new();
    logging_system.add_default_directives();
    for directive in extra.split(',').map(str::trim).filter(|d| !d.is_empty()) {
        logging_system.add_directive(directive)?;
    }

    Ok((logging_system, default_level, level_error))
}

/// Set up process-wide logging from the agent's level and optional file.
///
/// `level` may carry extra `target=level` directives after a comma.
pub fn setup_logging(
    level: &str,
    log_file: Option<&Path>,
) -> Result<Option<WorkerGuard>, InitializationError> {
    let (logging_system, default_level, level_error) = configure(level)?;
    let guard = logging_system.initialize_tracing(default_level, log_file)?;

    if let Some(e) = level_error {
        tracing::warn!(error = %e, "falling back to info");
    }
    if log_file.is_none() {
        tracing::warn!("No log file provided, using default stderr");
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_valid_and_invalid_directives() {
        let logging_system = LoggingSystem::new();

        assert!(logging_system.add_directive("hyper=warn").is_ok());
        assert!(logging_system.add_directive("invalid").is_ok());
        assert!(logging_system.add_directive("target=loud").is_ok());
        assert_eq!(logging_system.build_filter_string(LogLevel::Info), "info,hyper=warn");
    }

    #[test]
    fn test_default_directives() {
        let logging_system = LoggingSystem::new();
        logging_system.add_default_directives();

        assert_eq!(
            logging_system.build_filter_string(LogLevel::Debug),
            "debug,hyper=warn,reqwest=warn,h2=warn"
        );
    }

    #[test]
    fn test_level_spec_with_extra_directives() {
        let (logging_system, level, level_error) =
            configure("debug, matomo_log_agent::sender=trace,bogus").unwrap();

        assert_eq!(level, LogLevel::Debug);
        assert!(level_error.is_none());
        assert_eq!(
            logging_system.build_filter_string(level),
            "debug,hyper=warn,reqwest=warn,h2=warn,matomo_log_agent::sender=trace"
        );
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let (logging_system, level, level_error) = configure("loud").unwrap();

        assert_eq!(level, LogLevel::Info);
        assert!(matches!(
            level_error,
            Some(InitializationError::InvalidLogLevel { .. })
        ));
        assert_eq!(
            logging_system.build_filter_string(level),
            "info,hyper=warn,reqwest=warn,h2=warn"
        );
    }

    #[test]
    fn test_filter_without_directives() {
        assert_eq!(LoggingSystem::new().build_filter_string(LogLevel::Info), "info");
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/matomo-agent.log")).unwrap();
        assert_eq!(dir, Path::new("/var/log"));
        assert_eq!(name, "matomo-agent.log");

        let (dir, name) = split_log_path(Path::new("agent.log")).unwrap();
        assert_eq!(dir, Path::new("."));
        assert_eq!(name, "agent.log");

        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_concurrent_directive_modification() {
        let logging_system = Arc::new(LoggingSystem::new());

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let logging_system = Arc::clone(&logging_system);
                thread::spawn(move || {
                    logging_system.add_directive(&format!("target{i}=info")).unwrap();
                    logging_system.build_filter_string(LogLevel::Info)
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().is_ok());
        }
        let filter = logging_system.build_filter_string(LogLevel::Info);
        assert_eq!(filter.split(',').count(), 51);
    }
}
