//! Event Journal: a buffered, periodically-flushed append-only record
//! of safety-relevant transitions, backed by SQLite.

use std::path::Path;
use std::sync::Mutex;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection};
use tracing::{error, info, warn};
use turret_common::consts::{JOURNAL_BUFFER_CAP, JOURNAL_FLUSH_INTERVAL};
use turret_common::error::TurretError;
use turret_common::model::{EventKind, EventRecord};

struct Inner {
    conn: Connection,
    buffer: Vec<EventRecord>,
    last_flush: Instant,
}

/// Process-wide handle over the `Events` table. All operations
/// serialize under one mutex guarding both the in-memory buffer and
/// the DB connection.
pub struct EventJournal {
    inner: Mutex<Inner>,
}

fn wall_clock_seconds() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS Events (
    TIME INTEGER NOT NULL,
    EVENT INTEGER NOT NULL,
    CLASS TEXT NOT NULL,
    DESCRIPTION TEXT NOT NULL
)";

impl EventJournal {
    /// Open (creating if absent) the SQLite file at `path` and ensure
    /// the `Events` table exists.
    pub fn open(path: &Path) -> Result<Self, TurretError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TurretError::Persistence(e.to_string()))?;
        }
        let conn = Connection::open(path).map_err(|e| TurretError::Persistence(e.to_string()))?;
        conn.execute(SCHEMA, [])
            .map_err(|e| TurretError::Persistence(e.to_string()))?;
        info!(path = %path.display(), "event journal opened");
        Ok(Self::from_connection(conn))
    }

    /// In-memory, for tests and ephemeral runs.
    pub fn open_in_memory() -> Result<Self, TurretError> {
        let conn =
            Connection::open_in_memory().map_err(|e| TurretError::Persistence(e.to_string()))?;
        conn.execute(SCHEMA, [])
            .map_err(|e| TurretError::Persistence(e.to_string()))?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            inner: Mutex::new(Inner {
                conn,
                buffer: Vec::with_capacity(JOURNAL_BUFFER_CAP),
                last_flush: Instant::now(),
            }),
        }
    }

    /// Append a record with `time = wall_clock_seconds()`.
    pub fn insert_now(
        &self,
        kind: EventKind,
        source: &str,
        description: &str,
    ) -> Result<(), TurretError> {
        self.insert(EventRecord {
            timestamp: wall_clock_seconds(),
            kind,
            source: source.to_string(),
            description: description.to_string(),
        })
    }

    /// Append a fully-specified record.
    pub fn insert(&self, record: EventRecord) -> Result<(), TurretError> {
        let mut inner = self.inner.lock().unwrap();
        inner.buffer.push(record);
        let should_flush = inner.buffer.len() >= JOURNAL_BUFFER_CAP
            || inner.last_flush.elapsed() >= JOURNAL_FLUSH_INTERVAL;
        if should_flush {
            flush_locked(&mut inner)?;
        }
        Ok(())
    }

    /// All records, ordered `TIME DESC`, buffer flushed first.
    pub fn read_all(&self) -> Result<Vec<EventRecord>, TurretError> {
        let mut inner = self.inner.lock().unwrap();
        flush_locked(&mut inner)?;
        query(
            &inner.conn,
            "SELECT TIME, EVENT, CLASS, DESCRIPTION FROM Events ORDER BY TIME DESC",
            [],
        )
    }

    /// Inclusive range `[start, end]`, ordered `TIME DESC`.
    pub fn read_range(&self, start: i64, end: i64) -> Result<Vec<EventRecord>, TurretError> {
        let mut inner = self.inner.lock().unwrap();
        flush_locked(&mut inner)?;
        query(
            &inner.conn,
            "SELECT TIME, EVENT, CLASS, DESCRIPTION FROM Events WHERE TIME >= ?1 AND TIME <= ?2 ORDER BY TIME DESC",
            params![start, end],
        )
    }

    /// `TIME > t`, ordered `TIME DESC`.
    pub fn read_after(&self, t: i64) -> Result<Vec<EventRecord>, TurretError> {
        let mut inner = self.inner.lock().unwrap();
        flush_locked(&mut inner)?;
        query(
            &inner.conn,
            "SELECT TIME, EVENT, CLASS, DESCRIPTION FROM Events WHERE TIME > ?1 ORDER BY TIME DESC",
            params![t],
        )
    }

    /// `TIME < t`, ordered `TIME DESC`.
    pub fn read_before(&self, t: i64) -> Result<Vec<EventRecord>, TurretError> {
        let mut inner = self.inner.lock().unwrap();
        flush_locked(&mut inner)?;
        query(
            &inner.conn,
            "SELECT TIME, EVENT, CLASS, DESCRIPTION FROM Events WHERE TIME < ?1 ORDER BY TIME DESC",
            params![t],
        )
    }

    /// Flush any buffered records, for an orderly shutdown.
    pub fn shutdown(&self) {
        let mut inner = self.inner.lock().unwrap();
        if let Err(e) = flush_locked(&mut inner) {
            warn!(error = %e, "journal flush failed during shutdown");
        }
    }
}

/// Run the buffered inserts inside a single transaction; on failure
/// the buffer is retained for a later retry.
fn flush_locked(inner: &mut Inner) -> Result<(), TurretError> {
    if inner.buffer.is_empty() {
        inner.last_flush = Instant::now();
        return Ok(());
    }
    let result = (|| -> rusqlite::Result<()> {
        let tx = inner.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO Events (TIME, EVENT, CLASS, DESCRIPTION) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for r in &inner.buffer {
                stmt.execute(params![r.timestamp, r.kind as i64, r.source, r.description])?;
            }
        }
        tx.commit()
    })();

    match result {
        Ok(()) => {
            inner.buffer.clear();
            inner.last_flush = Instant::now();
            Ok(())
        }
        Err(e) => {
            error!(error = %e, pending = inner.buffer.len(), "journal flush failed, buffer retained");
            Err(TurretError::Persistence(e.to_string()))
        }
    }
}

fn query<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> Result<Vec<EventRecord>, TurretError> {
    let mut stmt = conn
        .prepare(sql)
        .map_err(|e| TurretError::Persistence(e.to_string()))?;
    let rows = stmt
        .query_map(params, |row| {
            let kind_raw: i64 = row.get(1)?;
            Ok((
                row.get::<_, i64>(0)?,
                kind_raw,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(|e| TurretError::Persistence(e.to_string()))?;

    let mut out = Vec::new();
    for row in rows {
        let (timestamp, kind_raw, source, description) =
            row.map_err(|e| TurretError::Persistence(e.to_string()))?;
        let kind = EventKind::from_i64(kind_raw)
            .ok_or_else(|| TurretError::Persistence(format!("unknown event kind {kind_raw}")))?;
        out.push(EventRecord {
            timestamp,
            kind,
            source,
            description,
        });
    }
    Ok(out)
}

impl turret_control::JournalSink for EventJournal {
    fn record(&self, kind: EventKind, source: &str, description: &str) {
        if let Err(e) = self.insert_now(kind, source, description) {
            error!(error = %e, "failed to journal event");
        }
    }
}
