use super::{CollectorError, LineSource, decode_line};
use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, AsyncSeekExt, BufReader};
use tokio::time::sleep;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Follows a growing log file from its end.
///
/// At end of file the source polls for appended data. When the file
/// becomes shorter than the current offset (truncation or copy-truncate
/// rotation) it is reopened and read from the start.
#[derive(Debug)]
pub struct TailSource {
    path: PathBuf,
    reader: BufReader<File>,
    offset: u64,
    partial: Vec<u8>,
    poll_interval: Duration,
}

impl TailSource {
    pub async fn open(path: impl AsRef<Path>, poll_interval: Duration) -> Result<Self, CollectorError> {
        let path = path.as_ref().to_path_buf();
        let mut file = open_file(&path).await?;
        let offset = file
            .seek(SeekFrom::End(0))
            .await
            .map_err(|source| CollectorError::Read {
                path: path.clone(),
                source,
            })?;

        info!(path = %path.display(), offset, "tailing log file");

        Ok(Self {
            path,
            reader: BufReader::new(file),
            offset,
            partial: Vec::new(),
            poll_interval,
        })
    }

    async fn reopen_from_start(&mut self) -> Result<(), CollectorError> {
        let file = open_file(&self.path).await?;
        self.reader = BufReader::new(file);
        self.offset = 0;
        self.partial.clear();
        Ok(())
    }

    /// True when the file on disk is now shorter than what was consumed.
    async fn was_truncated(&self) -> bool {
        match fs::metadata(&self.path).await {
            Ok(meta) => meta.len() < self.offset,
            Err(e) => {
                debug!(error = %e, path = %self.path.display(), "metadata unavailable; retrying");
                false
            }
        }
    }
}

impl LineSource for TailSource {
    async fn next_line(&mut self) -> Result<Option<String>, CollectorError> {
        loop {
            let read = self
                .reader
                .read_until(b'\n', &mut self.partial)
                .await
                .map_err(|source| CollectorError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            self.offset += read as u64;

            // A line is complete only once its terminator has been written
            if self.partial.last() == Some(&b'\n') {
                let line = std::mem::take(&mut self.partial);
                return Ok(Some(decode_line(line)));
            }

            if read > 0 {
                continue;
            }

            if self.was_truncated().await {
                warn!(
                    path = %self.path.display(),
                    previous_offset = self.offset,
                    "file truncated or rotated; reading from start"
                );
                self.reopen_from_start().await?;
                continue;
            }

            sleep(self.poll_interval).await;
        }
    }
}

async fn open_file(path: &Path) -> Result<File, CollectorError> {
    File::open(path)
        .await
        .map_err(|source| CollectorError::Open {
            path: path.to_path_buf(),
            source,
        })
}
