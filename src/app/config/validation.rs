use super::{Config, ConfigError};

/// Replay is paced at nanosecond resolution, so faster rates round to zero.
const MAX_RPS: u32 = 1_000_000_000;

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.matomo.url.trim().is_empty() {
            return Err(ConfigError::InvalidUrl("Matomo URL is not set".to_string()));
        }
        self.endpoints()?;

        if self.matomo.site_id.is_empty() {
            return Err(ConfigError::InvalidConfig("Site id is not set".to_string()));
        }

        if self.matomo.token_auth.trim().is_empty() {
            return Err(ConfigError::InvalidConfig("token_auth is not set".to_string()));
        }

        self.log_format()?;

        if self.log.log_path.as_os_str().is_empty() {
            return Err(ConfigError::InvalidConfig("Log path is not set".to_string()));
        }

        if self.rps == 0 || self.rps > MAX_RPS {
            return Err(ConfigError::InvalidConfig(format!(
                "Requests per second must be between 1 and {MAX_RPS}, got {}",
                self.rps
            )));
        }

        Ok(())
    }
}
