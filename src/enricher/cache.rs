use super::EnrichError;
use std::borrow::Cow;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_CACHE_FILE: &str = "/tmp/matomo_agent-url_title_cache.txt";

/// Write-once URL to title map backed by an append-only `url:title` file.
///
/// The in-memory map is authoritative while the process runs; the file is
/// read only by [`TitleCache::load`]. Colons and percent signs in the URL
/// path are percent-encoded on disk so the first path colon is always the
/// separator.
#[derive(Debug)]
pub struct TitleCache {
    path: PathBuf,
    titles: Mutex<HashMap<String, String>>,
}

impl TitleCache {
    /// Empty cache that will append to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            titles: Mutex::new(HashMap::new()),
        }
    }

    /// Read every entry from `path`. A missing file yields an empty cache.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self, EnrichError> {
        let cache = Self::new(path);

        let contents = match fs::read_to_string(&cache.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %cache.path.display(), "title cache file absent, starting empty");
                return Ok(cache);
            }
            Err(e) => return Err(cache.io_error(e)),
        };

        {
            let mut titles = cache.titles.lock().await;
            for (key, title) in contents.lines().filter_map(split_entry) {
                // First entry wins, matching insert semantics
                titles
                    .entry(decode_key(key))
                    .or_insert_with(|| title.to_string());
            }
            info!(path = %cache.path.display(), entries = titles.len(), "title cache loaded");
        }

        Ok(cache)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn get(&self, url: &str) -> Option<String> {
        self.titles.lock().await.get(url).cloned()
    }

    pub async fn len(&self) -> usize {
        self.titles.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Insert `title` for `url` unless an entry already exists.
    ///
    /// The existence check, the file append and the map insert happen under
    /// one lock. Returns `false` when another writer got there first.
    pub async fn insert_if_absent(&self, url: &str, title: &str) -> Result<bool, EnrichError> {
        let mut titles = self.titles.lock().await;
        if titles.contains_key(url) {
            return Ok(false);
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        let line = format!("{}:{title}\n", encode_key(url));
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.io_error(e))?;
        file.flush().await.map_err(|e| self.io_error(e))?;

        titles.insert(url.to_string(), title.to_string());
        Ok(true)
    }

    fn io_error(&self, source: std::io::Error) -> EnrichError {
        EnrichError::CacheIo {
            path: self.path.display().to_string(),
            source,
        }
    }
}

/// Byte offset where the URL path begins, or the end of the scheme for a
/// URL without a path. Scheme and port colons precede it; keys without a
/// scheme start at 0.
fn path_start(url: &str) -> usize {
    url.find("://")
        .map(|scheme_end| {
            let authority = scheme_end + 3;
            url[authority..]
                .find('/')
                .map_or(authority, |slash| authority + slash)
        })
        .unwrap_or(0)
}

fn encode_key(url: &str) -> Cow<'_, str> {
    let start = path_start(url);
    let path = &url[start..];
    if !path.contains([':', '%']) {
        return Cow::Borrowed(url);
    }

    let mut encoded = String::with_capacity(url.len() + 8);
    encoded.push_str(&url[..start]);
    for c in path.chars() {
        match c {
            '%' => encoded.push_str("%25"),
            ':' => encoded.push_str("%3A"),
            c => encoded.push(c),
        }
    }
    Cow::Owned(encoded)
}

fn decode_key(key: &str) -> String {
    let start = path_start(key);
    let mut decoded = String::with_capacity(key.len());
    decoded.push_str(&key[..start]);

    let mut rest = &key[start..];
    while let Some(pos) = rest.find('%') {
        decoded.push_str(&rest[..pos]);
        let escape = &rest[pos..];
        if escape.starts_with("%25") {
            decoded.push('%');
            rest = &escape[3..];
        } else if escape.starts_with("%3A") {
            decoded.push(':');
            rest = &escape[3..];
        } else {
            decoded.push('%');
            rest = &escape[1..];
        }
    }
    decoded.push_str(rest);
    decoded
}

/// Split one `url:title` line at the first `:` of the URL path.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let start = path_start(line);
    let separator = start + line[start..].find(':')?;
    let (url, title) = (&line[..separator], &line[separator + 1..]);
    (!url.is_empty()).then_some((url, title))
}
