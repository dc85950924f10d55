use super::{CollectorError, LineSource, decode_line};
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Reads a finished log file once, from the first line to the last.
#[derive(Debug)]
pub struct ReplaySource {
    path: PathBuf,
    reader: BufReader<File>,
}

impl ReplaySource {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CollectorError> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .await
            .map_err(|source| CollectorError::Open {
                path: path.clone(),
                source,
            })?;

        Ok(Self {
            path,
            reader: BufReader::new(file),
        })
    }
}

impl LineSource for ReplaySource {
    async fn next_line(&mut self) -> Result<Option<String>, CollectorError> {
        let mut bytes = Vec::new();
        let read = self
            .reader
            .read_until(b'\n', &mut bytes)
            .await
            .map_err(|source| CollectorError::Read {
                path: self.path.clone(),
                source,
            })?;

        Ok((read > 0).then(|| decode_line(bytes)))
    }
}
