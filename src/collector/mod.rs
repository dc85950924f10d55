//! Line sources feeding the pipeline.
//!
//! A source yields raw lines in file order. [`ReplaySource`] ends at end of
//! file; [`TailSource`] never ends on its own and is stopped by the caller.

pub mod replay;
pub mod tail;

use std::future::Future;
use std::path::PathBuf;
use thiserror::Error;

pub use replay::ReplaySource;
pub use tail::{DEFAULT_POLL_INTERVAL, TailSource};

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Failed to open log file {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to read log file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub trait LineSource: Send {
    /// Next complete line without its terminator; `None` once exhausted.
    fn next_line(&mut self) -> impl Future<Output = Result<Option<String>, CollectorError>> + Send;
}

/// Strip one trailing `\n` or `\r\n` and decode lossily.
pub(crate) fn decode_line(mut bytes: Vec<u8>) -> String {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
