//! # fiscalqr
//!
//! Reads the QR code printed on Brazilian fiscal receipts (NFC-e / NF-e), extracts the 44-digit
//! access key it carries and registers each receipt once in a durable ledger.
//!
//! ## Features
//!
//! - **Recognition under poor capture**: preprocessed variants (autofocus simulation, histogram
//!   equalization, contrast stretch, local threshold, denoise) tried at small rotations against
//!   two independent decoders, with a hard cap on attempts
//! - **Access key extraction**: `p` / `chNFe` query parameters of consultation urls, or any
//!   standalone run of exactly 44 digits, optionally restricted to known authority prefixes
//! - **Deduplicated ledger**: check-then-append under one lock over an in-memory or CSV store
//!
//! ## Quick Start
//!
//! ### Extracting a key from a decoded payload
//!
//! ```rust
//! use fiscalqr::KeyMatcher;
//!
//! let payload = "https://www.nfce.fazenda.sp.gov.br/qrcode?p=35250312345678000190650010000001231000001230|2|1|1|ABCDEF";
//! let key = KeyMatcher::new().extract(payload).unwrap();
//!
//! assert_eq!(key.state_code(), "35");
//! assert_eq!(key.model(), "65");
//! ```
//!
//! ### Scanning an image
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use fiscalqr::{ReceiptLedger, Scanner, Source};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ledger = Arc::new(ReceiptLedger::open_csv("fiscal_receipts.csv")?);
//! let scanner = Scanner::new(ledger);
//!
//! let img = image::open("receipt.jpg")?;
//! let report = scanner.scan(&img, Source::Upload);
//! for read in report.reads.iter() {
//!     match read {
//!         Ok(reg) => println!("{}", reg.key()),
//!         Err(e) => eprintln!("{e}"),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

#![allow(clippy::items_after_test_module)]

mod common;
pub mod key;
pub mod ledger;
pub mod reader;
pub mod scanner;

pub use common::{BoundingBox, DecodeResult, ScanError, ScanResult, Source};
pub use key::{AccessKey, FiscalUrl, KeyMatcher, KeyPolicy};
pub use ledger::{CsvStore, MemoryStore, ReceiptLedger, ReceiptRecord, RecordStore, SubmitOutcome};
pub use reader::{RecognitionSearch, SearchOptions, SearchOutcome};
pub use scanner::{FrameThrottle, RecentReads, Registration, ScanReport, Scanner, SymbolPolicy};
