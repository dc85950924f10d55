use super::{EnrichError, TitleCache};
use reqwest::Client;
use std::sync::Arc;
use tracing::debug;

const TITLE_OPEN: &str = "<title>";
const TITLE_CLOSE: &str = "</title>";

/// Text between the first `<title>` and the first `</title>`.
///
/// Newlines and carriage returns are removed and surrounding whitespace is
/// trimmed. No entity decoding. A missing tag, a close tag that precedes
/// the open tag, or an empty result yields `None`.
pub fn extract_title(body: &str) -> Option<String> {
    let open = body.find(TITLE_OPEN)?;
    let close = body.find(TITLE_CLOSE)?;
    if close <= open {
        return None;
    }

    let title: String = body[open + TITLE_OPEN.len()..close]
        .chars()
        .filter(|c| !matches!(c, '\n' | '\r'))
        .collect();
    let title = title.trim();

    (!title.is_empty()).then(|| title.to_string())
}

#[derive(Debug, Clone)]
pub struct TitleEnricher {
    client: Client,
    cache: Arc<TitleCache>,
}

impl TitleEnricher {
    pub fn new(client: Client, cache: Arc<TitleCache>) -> Self {
        Self { client, cache }
    }

    /// Title for `url`, from the cache or a single GET on a miss.
    ///
    /// The cache lock is not held across the fetch, so two concurrent misses
    /// for the same URL may both fetch; only the first result is stored.
    pub async fn title_for(&self, url: &str) -> Result<String, EnrichError> {
        if let Some(title) = self.cache.get(url).await {
            return Ok(title);
        }

        let title = self.fetch(url).await?;
        if !self.cache.insert_if_absent(url, &title).await? {
            debug!(url, "title already cached by a concurrent lookup");
        }
        Ok(title)
    }

    async fn fetch(&self, url: &str) -> Result<String, EnrichError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(EnrichError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        extract_title(&body).ok_or_else(|| EnrichError::NotFound {
            url: url.to_string(),
        })
    }
}
