use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{ReceiptRecord, RecordStore, StoreError, StoreResult};

pub const CSV_COLUMNS: [&str; 4] = ["access_key", "raw_data", "source", "timestamp"];
pub const DEFAULT_LEDGER_PATH: &str = "fiscal_receipts.csv";

// CSV store
//------------------------------------------------------------------------------

/// File-backed store, one row per receipt under a fixed header. Timestamps are RFC 3339 with
/// full sub-second precision.
#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    /// Opens `path`, writing the header first if the file is missing or empty. A file whose
    /// last line is unterminated gets a line break so the next row starts on its own line.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let is_blank = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => true,
            Err(e) => return Err(e.into()),
        };

        if is_blank {
            let mut wtr = csv::Writer::from_path(&path)?;
            wtr.write_record(CSV_COLUMNS)?;
            wtr.flush()?;
            info!(path = %path.display(), "Initialized receipt ledger");
        } else {
            terminate_last_line(&path)?;
        }

        Ok(Self { path })
    }

    /// Opens a ledger file that must already exist, leaving it untouched.
    pub fn open_existing(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !fs::metadata(&path)?.is_file() {
            return Err(StoreError::Unavailable(format!("{} is not a file", path.display())));
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl RecordStore for CsvStore {
    fn load(&mut self) -> StoreResult<Vec<ReceiptRecord>> {
        let mut rdr = csv::Reader::from_path(&self.path)?;

        let headers = rdr.headers()?;
        if !headers.iter().eq(CSV_COLUMNS) {
            let found = headers.iter().collect::<Vec<_>>().join(",");
            return Err(StoreError::Schema(found));
        }

        rdr.deserialize().collect::<Result<Vec<ReceiptRecord>, _>>().map_err(StoreError::from)
    }

    // The row is fully serialized before the file is touched.
    fn append(&mut self, record: &ReceiptRecord) -> StoreResult<()> {
        let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        wtr.serialize(record)?;
        let row = wtr.into_inner().map_err(|e| StoreError::Io(e.into_error()))?;

        let mut file = OpenOptions::new().append(true).open(&self.path)?;
        append_row(&mut file, &row)?;
        Ok(())
    }
}

// Row sink
//------------------------------------------------------------------------------

/// Append-only byte sink that can be cut back to an earlier length.
trait RowSink: Write {
    fn len(&self) -> io::Result<u64>;
    fn truncate(&mut self, len: u64) -> io::Result<()>;
    fn sync(&mut self) -> io::Result<()>;
}

impl RowSink for File {
    fn len(&self) -> io::Result<u64> {
        Ok(self.metadata()?.len())
    }

    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }

    fn sync(&mut self) -> io::Result<()> {
        self.sync_data()
    }
}

/// Writes and syncs `row`. On failure the sink is cut back to its prior length, so a row is
/// either fully persisted or absent.
fn append_row<S: RowSink>(sink: &mut S, row: &[u8]) -> io::Result<()> {
    let orig_len = sink.len()?;
    let res = sink.write_all(row).and_then(|_| sink.sync());

    if let Err(e) = res {
        if let Err(te) = sink.truncate(orig_len) {
            warn!(error = %te, len = orig_len, "Failed to roll back partial ledger row");
        }
        return Err(e);
    }
    Ok(())
}

fn terminate_last_line(path: &Path) -> io::Result<()> {
    let mut file = OpenOptions::new().read(true).append(true).open(path)?;
    file.seek(SeekFrom::End(-1))?;

    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    if last[0] != b'\n' {
        warn!(path = %path.display(), "Ledger file lacks a trailing line break, adding one");
        append_row(&mut file, b"\n")?;
    }
    Ok(())
}

#[cfg(test)]
mod csv_store_tests {
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    use std::io::{self, Write};

    use super::{append_row, CsvStore, RowSink, CSV_COLUMNS};
    use crate::common::Source;
    use crate::key::AccessKey;
    use crate::ledger::{ReceiptRecord, RecordStore, StoreError};

    fn record(key: &str, raw: &str, source: Source) -> ReceiptRecord {
        let ts = Utc.with_ymd_and_hms(2025, 3, 14, 9, 26, 53).unwrap()
            + chrono::Duration::nanoseconds(123_456_789);
        ReceiptRecord::new(AccessKey::new(key).unwrap(), raw, source, ts)
    }

    #[test]
    fn test_open_writes_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        CsvStore::open(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim_end(), CSV_COLUMNS.join(","));
    }

    #[test]
    fn test_open_keeps_existing_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        let rec = record("11111111111111111111111111111111111111111111", "a", Source::Camera);

        CsvStore::open(&path).unwrap().append(&rec).unwrap();
        let loaded = CsvStore::open(&path).unwrap().load().unwrap();
        assert_eq!(loaded, vec![rec]);
    }

    #[test]
    fn test_round_trip_with_awkward_payload() {
        let dir = TempDir::new().unwrap();
        let mut store = CsvStore::open(dir.path().join("ledger.csv")).unwrap();

        let recs = vec![
            record("11111111111111111111111111111111111111111111", "a,b \"quoted\"\nline", Source::Camera),
            record("22222222222222222222222222222222222222222222", "São João | 2 | 1", Source::CameraManual),
            record("33333333333333333333333333333333333333333333", "", Source::Upload),
        ];
        for r in recs.iter() {
            store.append(r).unwrap();
        }
        assert_eq!(store.load().unwrap(), recs);
    }

    #[test]
    fn test_schema_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, "chave_acesso,data_leitura,status_duplicidade\n").unwrap();

        let mut store = CsvStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Schema(_))));
    }

    #[test]
    fn test_corrupt_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, "access_key,raw_data,source,timestamp\n123,x,camera,yesterday\n")
            .unwrap();

        let mut store = CsvStore::open(&path).unwrap();
        assert!(matches!(store.load(), Err(StoreError::Csv(_))));
    }

    #[test]
    fn test_append_to_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        let mut store = CsvStore::open(&path).unwrap();
        drop(dir);

        let rec = record("11111111111111111111111111111111111111111111", "a", Source::Camera);
        assert!(matches!(store.append(&rec), Err(StoreError::Io(_))));
    }

    #[test]
    fn test_open_existing_never_creates() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");

        match CsvStore::open_existing(&path) {
            Err(StoreError::Io(e)) => assert_eq!(e.kind(), io::ErrorKind::NotFound),
            other => panic!("unexpected {other:?}"),
        }
        assert!(!path.exists());
        assert!(matches!(CsvStore::open_existing(dir.path()), Err(StoreError::Unavailable(_))));

        let rec = record("11111111111111111111111111111111111111111111", "a", Source::Camera);
        CsvStore::open(&path).unwrap().append(&rec).unwrap();
        assert_eq!(CsvStore::open_existing(&path).unwrap().load().unwrap(), vec![rec]);
    }

    // Accepts at most `capacity` bytes, then reports a full device.
    struct ShortSink {
        buf: Vec<u8>,
        capacity: usize,
        fail_sync: bool,
    }

    impl ShortSink {
        fn new(existing: &[u8], capacity: usize) -> Self {
            Self { buf: existing.to_vec(), capacity, fail_sync: false }
        }
    }

    impl Write for ShortSink {
        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            let room = self.capacity.saturating_sub(self.buf.len());
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left on device"));
            }
            let n = room.min(data.len());
            self.buf.extend_from_slice(&data[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl RowSink for ShortSink {
        fn len(&self) -> io::Result<u64> {
            Ok(self.buf.len() as u64)
        }

        fn truncate(&mut self, len: u64) -> io::Result<()> {
            self.buf.truncate(len as usize);
            Ok(())
        }

        fn sync(&mut self) -> io::Result<()> {
            if self.fail_sync {
                return Err(io::Error::new(io::ErrorKind::Other, "sync failed"));
            }
            Ok(())
        }
    }

    #[test]
    fn test_partial_write_rolled_back() {
        let existing = b"access_key,raw_data,source,timestamp\n";
        let mut sink = ShortSink::new(existing, existing.len() + 10);

        let res = append_row(&mut sink, b"11111111111111111111111111111111111111111111,a\n");
        assert!(res.is_err());
        assert_eq!(sink.buf, existing.to_vec());

        sink.capacity = usize::MAX;
        append_row(&mut sink, b"row\n").unwrap();
        assert_eq!(sink.buf, [&existing[..], &b"row\n"[..]].concat());
    }

    #[test]
    fn test_failed_sync_rolled_back() {
        let existing = b"header\n";
        let mut sink = ShortSink::new(existing, usize::MAX);
        sink.fail_sync = true;

        assert!(append_row(&mut sink, b"row\n").is_err());
        assert_eq!(sink.buf, existing.to_vec());
    }

    #[test]
    fn test_open_terminates_last_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.csv");
        std::fs::write(&path, CSV_COLUMNS.join(",")).unwrap();

        let mut store = CsvStore::open(&path).unwrap();
        let rec = record("11111111111111111111111111111111111111111111", "a", Source::Upload);
        store.append(&rec).unwrap();
        assert_eq!(store.load().unwrap(), vec![rec.clone()]);

        // Reopening a well-formed file leaves it alone.
        let before = std::fs::read(&path).unwrap();
        CsvStore::open(&path).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
