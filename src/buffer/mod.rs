pub mod batch;
pub mod error;

pub use batch::{Batch, BatchBuffer, DEFAULT_BATCH_SIZE};
pub use error::BufferError;
