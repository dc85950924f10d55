//! Domain layer for matomo-log-agent.
//!
//! Contains the canonical types shared across all modules:
//! - `HitRecord`: one observed request, the pipeline's core data type
//! - `NormalizedTimestamp`: a hit's timestamp after layout resolution
//! - `AgentError`: Top-level error type

pub mod error;
pub mod hit;

pub use error::AgentError;
pub use hit::{HitRecord, NormalizedTimestamp};
