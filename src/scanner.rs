use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use tracing::debug;

use crate::common::{ScanError, ScanResult, Source};
use crate::key::{AccessKey, KeyMatcher, KeyPolicy};
use crate::ledger::{ReceiptLedger, ReceiptRecord, RecordStore, SubmitOutcome};
use crate::reader::{RecognitionSearch, SearchOptions, SearchOutcome};

pub const DEFAULT_RECENT_READS: usize = 10;
pub const DEFAULT_FRAME_INTERVAL: Duration = Duration::from_millis(150);

// Symbol policy
//------------------------------------------------------------------------------

/// How many decoded symbols of one image are turned into receipts.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum SymbolPolicy {
    /// Stop at the first symbol that yields a key, accepted or duplicate.
    #[default]
    FirstOnly,
    ProcessAll,
}

// Registration
//------------------------------------------------------------------------------

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Registration {
    Accepted(ReceiptRecord),
    Duplicate(AccessKey),
}

impl Registration {
    pub fn key(&self) -> &AccessKey {
        match self {
            Self::Accepted(rec) => &rec.access_key,
            Self::Duplicate(key) => key,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub search: SearchOutcome,
    /// One entry per processed symbol, or a single [`ScanError::DecodeExhausted`].
    pub reads: Vec<ScanResult<Registration>>,
}

impl ScanReport {
    pub fn accepted(&self) -> impl Iterator<Item = &ReceiptRecord> {
        self.reads.iter().filter_map(|r| match r {
            Ok(Registration::Accepted(rec)) => Some(rec),
            _ => None,
        })
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Registration> {
        self.reads.iter().filter_map(|r| r.as_ref().ok())
    }
}

// Scanner
//------------------------------------------------------------------------------

/// Image in, receipts out: recognition search, key extraction, then ledger submission.
pub struct Scanner<S: RecordStore> {
    search: RecognitionSearch,
    matcher: KeyMatcher,
    ledger: Arc<ReceiptLedger<S>>,
    policy: SymbolPolicy,
}

impl<S: RecordStore> Scanner<S> {
    pub fn new(ledger: Arc<ReceiptLedger<S>>) -> Self {
        Self::builder(ledger).build()
    }

    pub fn builder(ledger: Arc<ReceiptLedger<S>>) -> ScannerBuilder<S> {
        ScannerBuilder {
            ledger,
            options: SearchOptions::default(),
            key_policy: KeyPolicy::default(),
            symbol_policy: SymbolPolicy::default(),
        }
    }

    pub fn ledger(&self) -> &Arc<ReceiptLedger<S>> {
        &self.ledger
    }

    pub fn matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    pub fn scan(&self, img: &DynamicImage, source: Source) -> ScanReport {
        self.register(self.search.search(img), source)
    }

    pub fn scan_encoded(&self, bytes: &[u8], source: Source) -> ScanReport {
        self.register(self.search.search_encoded(bytes), source)
    }

    /// Extracts the access key of a decoded payload and submits it to the ledger.
    pub fn process_payload(&self, payload: &str, source: Source) -> ScanResult<Registration> {
        let key = self.matcher.extract(payload)?;
        match self.ledger.submit(&key, payload, source) {
            SubmitOutcome::Accepted(rec) => Ok(Registration::Accepted(rec)),
            SubmitOutcome::Duplicate => Ok(Registration::Duplicate(key)),
            SubmitOutcome::StorageError(msg) => Err(ScanError::Storage(msg)),
        }
    }

    fn register(&self, search: SearchOutcome, source: Source) -> ScanReport {
        if !search.is_success() {
            let reads = vec![Err(ScanError::DecodeExhausted { attempts: search.attempts })];
            return ScanReport { search, reads };
        }

        let mut reads = Vec::with_capacity(search.results.len());
        for payload in search.payloads() {
            let read = self.process_payload(payload, source);
            if let Err(e) = &read {
                debug!(error = %e, "Payload rejected");
            }

            let stop = match &read {
                Ok(_) => self.policy == SymbolPolicy::FirstOnly,
                Err(ScanError::Storage(_)) => true,
                Err(_) => false,
            };
            reads.push(read);
            if stop {
                break;
            }
        }

        ScanReport { search, reads }
    }
}

pub struct ScannerBuilder<S: RecordStore> {
    ledger: Arc<ReceiptLedger<S>>,
    options: SearchOptions,
    key_policy: KeyPolicy,
    symbol_policy: SymbolPolicy,
}

impl<S: RecordStore> ScannerBuilder<S> {
    pub fn search_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    pub fn key_policy(mut self, policy: KeyPolicy) -> Self {
        self.key_policy = policy;
        self
    }

    pub fn symbol_policy(mut self, policy: SymbolPolicy) -> Self {
        self.symbol_policy = policy;
        self
    }

    pub fn build(self) -> Scanner<S> {
        Scanner {
            search: RecognitionSearch::new(self.options),
            matcher: KeyMatcher::with_policy(self.key_policy),
            ledger: self.ledger,
            policy: self.symbol_policy,
        }
    }
}

// Capture helpers
//------------------------------------------------------------------------------

/// Most-recent-first list of accepted keys, bounded in length.
#[derive(Debug, Clone)]
pub struct RecentReads {
    keys: VecDeque<AccessKey>,
    capacity: usize,
}

impl Default for RecentReads {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_RECENT_READS)
    }
}

impl RecentReads {
    pub fn with_capacity(capacity: usize) -> Self {
        Self { keys: VecDeque::with_capacity(capacity), capacity }
    }

    pub fn push(&mut self, key: AccessKey) {
        if self.capacity == 0 {
            return;
        }
        self.keys.push_front(key);
        self.keys.truncate(self.capacity);
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccessKey> {
        self.keys.iter()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Drops camera frames that arrive sooner than `interval` after the last processed one.
#[derive(Debug, Clone)]
pub struct FrameThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl Default for FrameThrottle {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval, last: None }
    }

    /// Whether a frame arriving at `now` should be processed. Marks it processed if so.
    pub fn ready(&mut self, now: Instant) -> bool {
        let due = match self.last {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.last = Some(now);
        }
        due
    }
}
