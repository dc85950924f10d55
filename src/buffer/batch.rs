use super::BufferError;
use crate::sender::HitParams;
use parking_lot::Mutex;
use uuid::Uuid;

/// Hits per bulk request.
pub const DEFAULT_BATCH_SIZE: usize = 200;

/// A drained set of encoded hits, sent as one bulk request.
#[derive(Debug, Clone)]
pub struct Batch {
    id: String,
    entries: Vec<HitParams>,
}

impl Batch {
    pub fn new(entries: Vec<HitParams>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entries,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[HitParams] {
        &self.entries
    }
}

/// Pending hits with a size-triggered, all-or-nothing flush.
///
/// Appends and drains take the same lock, so an appender never observes a
/// half-drained buffer. Sending happens outside the lock on the returned
/// [`Batch`]; the buffer is already empty regardless of how that send ends.
#[derive(Debug)]
pub struct BatchBuffer {
    threshold: usize,
    pending: Mutex<Vec<HitParams>>,
}

impl Default for BatchBuffer {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_BATCH_SIZE,
            pending: Mutex::new(Vec::with_capacity(DEFAULT_BATCH_SIZE)),
        }
    }
}

impl BatchBuffer {
    pub fn new(threshold: usize) -> Result<Self, BufferError> {
        if threshold == 0 {
            return Err(BufferError::InvalidThreshold { threshold });
        }

        Ok(Self {
            threshold,
            pending: Mutex::new(Vec::with_capacity(threshold)),
        })
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Append `params`; returns the full drained batch once the threshold
    /// is reached.
    pub fn push(&self, params: HitParams) -> Option<Batch> {
        let mut pending = self.pending.lock();
        pending.push(params);

        if pending.len() < self.threshold {
            return None;
        }

        let entries = std::mem::replace(&mut *pending, Vec::with_capacity(self.threshold));
        Some(Batch::new(entries))
    }

    /// Take whatever is pending, for the end-of-run flush.
    pub fn drain(&self) -> Option<Batch> {
        let entries = std::mem::take(&mut *self.pending.lock());
        (!entries.is_empty()).then(|| Batch::new(entries))
    }
}
