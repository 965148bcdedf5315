use thiserror::Error;

use super::ReceiptRecord;

// Store error
//------------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Unexpected ledger schema: {0}")]
    Schema(String),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

// Record store
//------------------------------------------------------------------------------

/// Durable backing of a [`super::ReceiptLedger`]. The ledger is the only caller and
/// serializes access, so implementations need no locking of their own.
pub trait RecordStore: Send {
    /// Every persisted record in insertion order.
    fn load(&mut self) -> StoreResult<Vec<ReceiptRecord>>;

    /// Persists one record. On error nothing must have been persisted.
    fn append(&mut self, record: &ReceiptRecord) -> StoreResult<()>;
}

/// Process-lifetime store. Seed records are handed over on the first `load` and appends are
/// not retained, so the ledger's own list is the single in-memory copy.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    seed: Vec<ReceiptRecord>,
    appended: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: Vec<ReceiptRecord>) -> Self {
        Self { seed: records, appended: 0 }
    }

    /// Number of records accepted by `append`.
    pub fn appended(&self) -> usize {
        self.appended
    }
}

impl RecordStore for MemoryStore {
    fn load(&mut self) -> StoreResult<Vec<ReceiptRecord>> {
        Ok(std::mem::take(&mut self.seed))
    }

    fn append(&mut self, _record: &ReceiptRecord) -> StoreResult<()> {
        self.appended += 1;
        Ok(())
    }
}
