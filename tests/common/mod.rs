#![allow(dead_code)]

use matomo_log_agent::app::{Config, Pipeline};
use matomo_log_agent::buffer::BatchBuffer;
use matomo_log_agent::enricher::{TitleCache, TitleEnricher};
use matomo_log_agent::sender::{ClientConfig, HitTransmitter, MatomoClient};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::MockServer;

pub const TOKEN: &str = "secret-token";

pub fn access_line(url: &str, status: u16, user_agent: &str) -> String {
    format!(
        r#"192.0.2.10 - - [10/Oct/2024:13:55:36 +0200] "GET {url} HTTP/1.1" {status} 512 "https://ref.example/" "{user_agent}""#
    )
}

pub fn browser_line(url: &str, status: u16) -> String {
    access_line(url, status, "Mozilla/5.0 (X11; Linux x86_64)")
}

/// Config pointing at `server`, with the access log and title cache in `dir`.
pub fn base_config(server: &MockServer, dir: &TempDir) -> Config {
    let config_path = dir.path().join("config.toml");
    let contents = format!(
        r#"
[matomo]
url = "{url}"
site_id = 3
token_auth = "{TOKEN}"
website_url = "https://www.example.com"

[log]
log_format = "nginx"
log_path = "{log}"

[title]
cache_file = "{cache}"
"#,
        url = server.uri(),
        log = log_path(dir).display(),
        cache = cache_path(dir).display(),
    );
    std::fs::write(&config_path, contents).unwrap();

    Config::from_args(["matomo-log-agent", "--config", config_path.to_str().unwrap()]).unwrap()
}

pub fn log_path(dir: &TempDir) -> PathBuf {
    dir.path().join("access.log")
}

pub fn cache_path(dir: &TempDir) -> PathBuf {
    dir.path().join("titles.txt")
}

pub fn client(config: &Config) -> MatomoClient {
    MatomoClient::new(ClientConfig::new(config.endpoints().unwrap())).unwrap()
}

/// Pipeline over `config` without token validation.
pub fn pipeline(config: Config, batch_threshold: Option<usize>) -> Pipeline {
    let client = client(&config);
    let enricher = config.title.collect_titles.then(|| {
        TitleEnricher::new(
            client.client.clone(),
            Arc::new(TitleCache::new(&config.title.cache_file)),
        )
    });
    let buffer = batch_threshold.map(|threshold| Arc::new(BatchBuffer::new(threshold).unwrap()));
    let transmitter = HitTransmitter::new(client, TOKEN);

    Pipeline::new(Arc::new(config), transmitter, enricher, buffer).unwrap()
}

pub async fn request_bodies(server: &MockServer, path: &str) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|request| request.url.path() == path)
        .map(|request| String::from_utf8(request.body).unwrap())
        .collect()
}
