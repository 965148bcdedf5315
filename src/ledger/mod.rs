//! Durable, deduplicated register of accepted receipts.
//!
//! The ledger answers "has this access key been seen?" and appends the first sighting to a
//! [`RecordStore`]. The membership check and the append happen under one lock, so of several
//! concurrent submissions of the same key exactly one is accepted.

mod csv_store;
mod record;
mod store;

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

pub use csv_store::{CsvStore, CSV_COLUMNS, DEFAULT_LEDGER_PATH};
pub use record::{ReceiptRecord, RAW_DATA_CAP};
pub use store::{MemoryStore, RecordStore, StoreError, StoreResult};

use crate::common::Source;
use crate::key::AccessKey;

// Submit outcome
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum SubmitOutcome {
    Accepted(ReceiptRecord),
    Duplicate,
    StorageError(String),
}

impl SubmitOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

// Summary
//------------------------------------------------------------------------------

/// Record counts for a dashboard view.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub struct LedgerSummary {
    pub total: usize,
    pub camera: usize,
    pub camera_manual: usize,
    pub upload: usize,
}

impl LedgerSummary {
    pub fn count(&self, source: Source) -> usize {
        match source {
            Source::Camera => self.camera,
            Source::CameraManual => self.camera_manual,
            Source::Upload => self.upload,
        }
    }

    fn add(&mut self, source: Source) {
        self.total += 1;
        match source {
            Source::Camera => self.camera += 1,
            Source::CameraManual => self.camera_manual += 1,
            Source::Upload => self.upload += 1,
        }
    }
}

// Receipt ledger
//------------------------------------------------------------------------------

struct LedgerState<S> {
    store: S,
    keys: HashSet<AccessKey>,
    records: Vec<ReceiptRecord>,
}

pub struct ReceiptLedger<S: RecordStore> {
    state: Mutex<LedgerState<S>>,
}

impl<S: RecordStore> ReceiptLedger<S> {
    /// Loads every persisted record and indexes its key. If the store already holds
    /// duplicate keys, the earliest row wins and the rest are ignored.
    pub fn open(mut store: S) -> StoreResult<Self> {
        let loaded = store.load()?;
        let mut keys = HashSet::with_capacity(loaded.len());
        let mut records = Vec::with_capacity(loaded.len());

        for rec in loaded {
            if keys.insert(rec.access_key.clone()) {
                records.push(rec);
            } else {
                warn!(key = %rec.access_key, "Ignoring duplicate row in ledger store");
            }
        }
        info!(records = records.len(), "Receipt ledger opened");

        Ok(Self { state: Mutex::new(LedgerState { store, keys, records }) })
    }

    // Readers never observe a half-applied submit: the index changes only after the store
    // append succeeds, so a poisoned guard still holds consistent state.
    fn read(&self) -> MutexGuard<'_, LedgerState<S>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_duplicate(&self, key: &AccessKey) -> bool {
        self.read().keys.contains(key)
    }

    /// Records `key` now unless it is already present.
    pub fn submit(&self, key: &AccessKey, raw_payload: &str, source: Source) -> SubmitOutcome {
        self.submit_at(key, raw_payload, source, Utc::now())
    }

    /// Same as [`Self::submit`] with an explicit timestamp.
    pub fn submit_at(
        &self,
        key: &AccessKey,
        raw_payload: &str,
        source: Source,
        timestamp: DateTime<Utc>,
    ) -> SubmitOutcome {
        let mut state = match self.state.lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!(key = %key, "Ledger lock poisoned");
                return SubmitOutcome::StorageError("ledger lock poisoned".to_owned());
            }
        };

        if state.keys.contains(key) {
            debug!(key = %key, %source, "Duplicate receipt");
            return SubmitOutcome::Duplicate;
        }

        let record = ReceiptRecord::new(key.clone(), raw_payload, source, timestamp);
        if let Err(e) = state.store.append(&record) {
            warn!(key = %key, error = %e, "Failed to persist receipt");
            return SubmitOutcome::StorageError(e.to_string());
        }

        state.keys.insert(key.clone());
        state.records.push(record.clone());
        info!(key = %key, %source, "Receipt accepted");
        SubmitOutcome::Accepted(record)
    }

    /// Snapshot of every record in acceptance order.
    pub fn all(&self) -> Vec<ReceiptRecord> {
        self.read().records.clone()
    }

    pub fn get(&self, key: &AccessKey) -> Option<ReceiptRecord> {
        self.read().records.iter().find(|r| &r.access_key == key).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn summary(&self) -> LedgerSummary {
        let state = self.read();
        let mut summary = LedgerSummary::default();
        state.records.iter().for_each(|r| summary.add(r.source));
        summary
    }
}

impl ReceiptLedger<MemoryStore> {
    pub fn in_memory() -> Self {
        Self {
            state: Mutex::new(LedgerState {
                store: MemoryStore::new(),
                keys: HashSet::new(),
                records: Vec::new(),
            }),
        }
    }
}

impl ReceiptLedger<CsvStore> {
    /// Opens (creating if needed) a CSV ledger at `path`.
    pub fn open_csv(path: impl AsRef<std::path::Path>) -> StoreResult<Self> {
        Self::open(CsvStore::open(path)?)
    }
}

#[cfg(test)]
mod ledger_tests {
    use std::sync::{Arc, Barrier};
    use std::thread;

    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;
    use tempfile::TempDir;

    use super::{
        MemoryStore, ReceiptLedger, ReceiptRecord, RecordStore, StoreError, StoreResult,
        SubmitOutcome,
    };
    use crate::common::Source;
    use crate::key::AccessKey;

    const KEY_A: &str = "35250312345678000190650010000001231000001230";
    const KEY_B: &str = "35250312345678000190650010000001241000001240";

    fn key(s: &str) -> AccessKey {
        AccessKey::new(s).unwrap()
    }

    struct FailingStore;

    impl RecordStore for FailingStore {
        fn load(&mut self) -> StoreResult<Vec<ReceiptRecord>> {
            Ok(Vec::new())
        }

        fn append(&mut self, _: &ReceiptRecord) -> StoreResult<()> {
            Err(StoreError::Unavailable("disk full".to_owned()))
        }
    }

    #[test]
    fn test_accept_then_duplicate() {
        let ledger = ReceiptLedger::in_memory();
        let k = key(KEY_A);

        assert!(!ledger.is_duplicate(&k));
        let outcome = ledger.submit(&k, "raw", Source::Camera);
        let SubmitOutcome::Accepted(rec) = outcome else { panic!("expected acceptance") };
        assert_eq!(rec.access_key, k);
        assert_eq!(rec.source, Source::Camera);

        assert!(ledger.is_duplicate(&k));
        assert_eq!(ledger.submit(&k, "raw", Source::Upload), SubmitOutcome::Duplicate);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_failed_append_leaves_state() {
        let ledger = ReceiptLedger::open(FailingStore).unwrap();
        let k = key(KEY_A);

        let outcome = ledger.submit(&k, "raw", Source::Camera);
        assert!(matches!(outcome, SubmitOutcome::StorageError(ref msg) if msg.contains("disk full")));
        assert!(!ledger.is_duplicate(&k));
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_open_ignores_duplicate_rows() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let first = ReceiptRecord::new(key(KEY_A), "first", Source::Camera, ts);
        let again = ReceiptRecord::new(key(KEY_A), "again", Source::Upload, ts);
        let other = ReceiptRecord::new(key(KEY_B), "other", Source::Upload, ts);
        let store = MemoryStore::with_records(vec![first.clone(), again, other.clone()]);

        let ledger = ReceiptLedger::open(store).unwrap();
        assert_eq!(ledger.all(), vec![first.clone(), other]);
        assert_eq!(ledger.get(&key(KEY_A)), Some(first));
    }

    #[test]
    fn test_in_memory_keeps_single_copy() {
        let ledger = ReceiptLedger::in_memory();
        ledger.submit(&key(KEY_A), "a", Source::Camera);
        ledger.submit(&key(KEY_A), "a", Source::Camera);
        ledger.submit(&key(KEY_B), "b", Source::Upload);

        let mut state = ledger.state.lock().unwrap();
        assert_eq!(state.records.len(), 2);
        assert_eq!(state.store.appended(), 2);
        assert!(state.store.load().unwrap().is_empty());
    }

    #[test]
    fn test_summary() {
        let ledger = ReceiptLedger::in_memory();
        ledger.submit(&key(KEY_A), "a", Source::Camera);
        ledger.submit(&key(KEY_A), "a", Source::Camera);
        ledger.submit(&key(KEY_B), "b", Source::Upload);

        let summary = ledger.summary();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.count(Source::Camera), 1);
        assert_eq!(summary.count(Source::CameraManual), 0);
        assert_eq!(summary.count(Source::Upload), 1);
    }

    #[test]
    fn test_csv_ledger_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("fiscal_receipts.csv");

        {
            let ledger = ReceiptLedger::open_csv(&path).unwrap();
            assert!(ledger.submit(&key(KEY_A), "a", Source::CameraManual).is_accepted());
        }

        let ledger = ReceiptLedger::open_csv(&path).unwrap();
        assert!(ledger.is_duplicate(&key(KEY_A)));
        assert_eq!(ledger.submit(&key(KEY_A), "a", Source::Upload), SubmitOutcome::Duplicate);
        assert!(ledger.submit(&key(KEY_B), "b", Source::Upload).is_accepted());
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_concurrent_submits_accept_once() {
        const THREADS: usize = 8;
        let ledger = Arc::new(ReceiptLedger::in_memory());
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles = (0..THREADS)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    ledger.submit(&key(KEY_A), "raw", Source::Camera)
                })
            })
            .collect::<Vec<_>>();

        let outcomes = handles.into_iter().map(|h| h.join().unwrap()).collect::<Vec<_>>();
        let accepted = outcomes.iter().filter(|o| o.is_accepted()).count();
        let duplicates = outcomes.iter().filter(|o| **o == SubmitOutcome::Duplicate).count();
        assert_eq!(accepted, 1);
        assert_eq!(duplicates, THREADS - 1);
        assert_eq!(ledger.len(), 1);
    }

    proptest! {
        #[test]
        fn proptest_keys_stay_unique(picks in prop::collection::vec(0usize..4, 0..40)) {
            let pool = [
                "00000000000000000000000000000000000000000000",
                "11111111111111111111111111111111111111111111",
                "22222222222222222222222222222222222222222222",
                "33333333333333333333333333333333333333333333",
            ];
            let ledger = ReceiptLedger::in_memory();
            for &i in picks.iter() {
                ledger.submit(&key(pool[i]), "raw", Source::Upload);
            }

            let mut distinct = picks.clone();
            distinct.sort_unstable();
            distinct.dedup();
            prop_assert_eq!(ledger.len(), distinct.len());

            let mut seen = std::collections::HashSet::new();
            for rec in ledger.all() {
                prop_assert!(seen.insert(rec.access_key));
            }
        }
    }
}
