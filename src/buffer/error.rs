use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Invalid batch threshold: {threshold}")]
    InvalidThreshold { threshold: usize },
}
