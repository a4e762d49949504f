//! SQLite-backed record of every sequence the driver advanced past.

use std::time::{SystemTime, UNIX_EPOCH};

use camino::{Utf8Path, Utf8PathBuf};
use osmsync_core::{CursorError, CursorStore, DiffReport, SequenceNumber};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

/// Errors raised by [`ApplyLog`].
#[derive(Debug, Error)]
pub enum ApplyLogError {
    /// The database could not be opened or its schema created.
    #[error("failed to initialise apply log at {path}")]
    Initialise {
        /// Database location.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: rusqlite::Error,
    },
    /// The parent directory could not be created.
    #[error("failed to create directory for apply log at {path}")]
    Directory {
        /// Database location.
        path: Utf8PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A row could not be written.
    #[error("failed to record sequence {sequence}")]
    Record {
        /// Sequence being recorded.
        sequence: SequenceNumber,
        /// Underlying error.
        #[source]
        source: rusqlite::Error,
    },
    /// The log could not be queried.
    #[error("failed to read apply log")]
    Read {
        /// Underlying error.
        #[source]
        source: rusqlite::Error,
    },
}

/// Whether a sequence was applied or skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceStatus {
    /// The diff was fetched and dispatched.
    Applied,
    /// Skipped: unpublished state or withdrawn diff.
    Skipped,
}

impl SequenceStatus {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Applied => "applied",
            Self::Skipped => "skipped",
        }
    }
}

/// One row of the apply log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyLogEntry {
    /// Sequence advanced past.
    pub sequence: SequenceNumber,
    /// Applied or skipped.
    pub status: SequenceStatus,
    /// Objects deleted, created and modified, in that order.
    pub applied: [u64; 3],
    /// Objects whose conversion failed.
    pub failed: u64,
    /// Objects whose conversion produced nothing.
    pub empty: u64,
}

/// Durable cursor with a per-sequence audit trail.
///
/// Replaying a sequence replaces its row, so the log stays consistent with
/// at-least-once application.
///
/// # Examples
/// ```no_run
/// use camino::Utf8Path;
/// use osmsync_core::CursorStore;
/// use osmsync_data::ApplyLog;
///
/// let log = ApplyLog::initialise(Utf8Path::new("state/apply-log.sqlite"))?;
/// println!("resume after {:?}", log.load()?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Debug)]
pub struct ApplyLog {
    connection: Connection,
    location: Utf8PathBuf,
}

impl ApplyLog {
    /// Open (or create) the log at `path`, creating parent directories.
    ///
    /// # Errors
    /// Returns [`ApplyLogError::Directory`] or [`ApplyLogError::Initialise`]
    /// when the database cannot be prepared.
    pub fn initialise(path: &Utf8Path) -> Result<Self, ApplyLogError> {
        osmsync_fs::ensure_parent_dir(path).map_err(|source| ApplyLogError::Directory {
            path: path.to_path_buf(),
            source,
        })?;
        let initialise = |source| ApplyLogError::Initialise {
            path: path.to_path_buf(),
            source,
        };
        let connection = Connection::open(path.as_std_path()).map_err(initialise)?;
        connection
            .execute(
                "CREATE TABLE IF NOT EXISTS applied_sequences (
                    sequence INTEGER PRIMARY KEY,
                    status TEXT NOT NULL,
                    deleted INTEGER NOT NULL,
                    created INTEGER NOT NULL,
                    modified INTEGER NOT NULL,
                    failed INTEGER NOT NULL,
                    empty INTEGER NOT NULL,
                    recorded_at INTEGER NOT NULL
                )",
                [],
            )
            .map_err(initialise)?;
        Ok(Self {
            connection,
            location: path.to_path_buf(),
        })
    }

    /// Record that `sequence` was advanced past.
    ///
    /// # Errors
    /// Returns [`ApplyLogError::Record`] when the row cannot be written.
    pub fn record(
        &self,
        sequence: SequenceNumber,
        report: Option<&DiffReport>,
    ) -> Result<(), ApplyLogError> {
        let record = |source| ApplyLogError::Record { sequence, source };
        let (status, counts) = match report {
            Some(report) => (
                SequenceStatus::Applied,
                [
                    report.deleted.total(),
                    report.created.total(),
                    report.modified.total(),
                    report.failed,
                    report.empty,
                ],
            ),
            None => (SequenceStatus::Skipped, [0; 5]),
        };
        let [deleted, created, modified, failed, empty] = counts.map(to_sql_integer);
        self.connection
            .execute(
                "INSERT OR REPLACE INTO applied_sequences (
                    sequence,
                    status,
                    deleted,
                    created,
                    modified,
                    failed,
                    empty,
                    recorded_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    to_sql_integer(sequence.get()),
                    status.as_str(),
                    deleted,
                    created,
                    modified,
                    failed,
                    empty,
                    unix_timestamp(),
                ],
            )
            .map_err(record)?;
        Ok(())
    }

    /// Highest recorded sequence.
    ///
    /// # Errors
    /// Returns [`ApplyLogError::Read`] when the query fails.
    pub fn last_sequence(&self) -> Result<Option<SequenceNumber>, ApplyLogError> {
        let highest: Option<i64> = self
            .connection
            .query_row("SELECT MAX(sequence) FROM applied_sequences", [], |row| {
                row.get(0)
            })
            .map_err(|source| ApplyLogError::Read { source })?;
        Ok(highest.map(from_sql_integer).map(SequenceNumber::new))
    }

    /// Row recorded for `sequence`, if any.
    ///
    /// # Errors
    /// Returns [`ApplyLogError::Read`] when the query fails.
    pub fn entry(&self, sequence: SequenceNumber) -> Result<Option<ApplyLogEntry>, ApplyLogError> {
        self.connection
            .query_row(
                "SELECT status, deleted, created, modified, failed, empty
                 FROM applied_sequences WHERE sequence = ?1",
                params![to_sql_integer(sequence.get())],
                |row| {
                    let status: String = row.get(0)?;
                    let count = |index: usize| row.get::<_, i64>(index).map(from_sql_integer);
                    Ok(ApplyLogEntry {
                        sequence,
                        status: if status == SequenceStatus::Applied.as_str() {
                            SequenceStatus::Applied
                        } else {
                            SequenceStatus::Skipped
                        },
                        applied: [count(1)?, count(2)?, count(3)?],
                        failed: count(4)?,
                        empty: count(5)?,
                    })
                },
            )
            .optional()
            .map_err(|source| ApplyLogError::Read { source })
    }

    /// Location of the underlying SQLite database.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.location
    }

    #[cfg(test)]
    pub(crate) const fn connection(&self) -> &Connection {
        &self.connection
    }
}

impl CursorStore for ApplyLog {
    fn load(&self) -> Result<Option<SequenceNumber>, CursorError> {
        self.last_sequence()
            .map_err(|err| CursorError::with_source(format!("reading {}", self.location), err))
    }

    fn store(
        &self,
        sequence: SequenceNumber,
        report: Option<&DiffReport>,
    ) -> Result<(), CursorError> {
        self.record(sequence, report)
            .map_err(|err| CursorError::with_source(format!("writing {}", self.location), err))
    }
}

/// SQLite integers are signed; counters beyond `i64::MAX` saturate.
fn to_sql_integer(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn from_sql_integer(value: i64) -> u64 {
    u64::try_from(value).unwrap_or_default()
}

fn unix_timestamp() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| to_sql_integer(elapsed.as_secs()))
}
