//! ReportStore is the redb-backed append-only log of fix reports.
//!
//! Reports are JSON-serialized into a single table keyed by a
//! monotonically increasing sequence number. There is no update or
//! delete: the log is an audit trail.

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use mend_core::FixReport;

use crate::error::{StateError, StateResult};
use crate::tables::REPORTS;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe report log backed by redb.
#[derive(Clone)]
pub struct ReportStore {
    db: Arc<Database>,
    next_seq: Arc<AtomicU64>,
}

impl ReportStore {
    /// Open (or create) a persistent report log at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self::from_database(db)?;
        debug!(?path, reports = store.len(), "report store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory report log.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self::from_database(db)?;
        debug!("in-memory report store opened");
        Ok(store)
    }

    fn from_database(db: Database) -> StateResult<Self> {
        let db = Arc::new(db);
        ensure_tables(&db)?;
        let next_seq = last_sequence(&db)?.map(|seq| seq + 1).unwrap_or(0);
        Ok(Self {
            db,
            next_seq: Arc::new(AtomicU64::new(next_seq)),
        })
    }

    /// Append a report. Returns its sequence number.
    pub fn append(&self, report: &FixReport) -> StateResult<u64> {
        let value = serde_json::to_vec(report).map_err(map_err!(Encode))?;
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(REPORTS).map_err(map_err!(Table))?;
            table
                .insert(seq, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(seq, endpoint = %report.endpoint_id, "fix report stored");
        Ok(seq)
    }

    /// All reports in append order.
    pub fn list(&self) -> StateResult<Vec<FixReport>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(REPORTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            let report: FixReport =
                serde_json::from_slice(value.value()).map_err(|e| StateError::Corrupt {
                    seq: key.value(),
                    reason: e.to_string(),
                })?;
            results.push(report);
        }
        Ok(results)
    }

    /// Reports for one endpoint, in append order.
    pub fn list_for_endpoint(&self, endpoint_id: &str) -> StateResult<Vec<FixReport>> {
        Ok(self
            .list()?
            .into_iter()
            .filter(|r| r.endpoint_id == endpoint_id)
            .collect())
    }

    /// Number of reports appended so far.
    pub fn len(&self) -> u64 {
        self.next_seq.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Create all tables if they don't exist yet.
fn ensure_tables(db: &Database) -> StateResult<()> {
    let txn = db.begin_write().map_err(map_err!(Transaction))?;
    // Opening a table in a write transaction creates it if absent.
    txn.open_table(REPORTS).map_err(map_err!(Table))?;
    txn.commit().map_err(map_err!(Transaction))?;
    Ok(())
}

fn last_sequence(db: &Database) -> StateResult<Option<u64>> {
    let txn = db.begin_read().map_err(map_err!(Transaction))?;
    let table = txn.open_table(REPORTS).map_err(map_err!(Table))?;
    let last = table.last().map_err(map_err!(Read))?;
    Ok(last.map(|(key, _)| key.value()))
}
