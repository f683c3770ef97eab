//! Durable brute-force quarantine.
//!
//! Every failed decode of a carrier is charged against that carrier's content
//! hash. The third failure bans the hash for good and scrambles the carrier
//! file on disk. State lives in SQLite so that separate processes sharing the
//! database see one counter per carrier.
//!
//! Transitions per hash:
//!
//! ```text
//! Clean --failure--> Warned(1) --failure--> Warned(2) --failure--> Banned
//!   ^                   |                      |
//!   +------success------+----------------------+
//! ```
//!
//! `Banned` is terminal.

pub mod corrupt;

pub use corrupt::corrupt_carrier;

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Failed decodes allowed before a carrier is banned
pub const MAX_ATTEMPTS: u32 = 3;

const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS file_registry (
    file_hash TEXT PRIMARY KEY,
    attempts INTEGER NOT NULL,
    banned INTEGER NOT NULL
)";

/// Identity of a carrier: hex SHA-256 of its full file bytes
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Stored row for one carrier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuarantineRecord {
    pub file_hash: String,
    pub attempts: u32,
    pub banned: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum QuarantineState {
    Clean,
    Warned { attempts: u32 },
    Banned,
}

impl QuarantineState {
    /// Attempts left before the ban
    pub fn remaining(&self) -> u32 {
        match self {
            Self::Clean => MAX_ATTEMPTS,
            Self::Warned { attempts } => MAX_ATTEMPTS.saturating_sub(*attempts),
            Self::Banned => 0,
        }
    }
}

impl std::fmt::Display for QuarantineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Clean => write!(f, "clean"),
            Self::Warned { attempts } => write!(
                f,
                "warned ({} failed, {} remaining)",
                attempts,
                MAX_ATTEMPTS.saturating_sub(*attempts)
            ),
            Self::Banned => write!(f, "banned"),
        }
    }
}

/// Result of charging one failed decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureOutcome {
    pub attempts: u32,
    pub banned: bool,
    /// This failure crossed the limit and fired the corruption
    pub newly_banned: bool,
}

impl FailureOutcome {
    pub fn remaining(&self) -> u32 {
        MAX_ATTEMPTS.saturating_sub(self.attempts)
    }
}

/// Handle to the quarantine database.
///
/// Cloning shares one connection. Opening the same file from another handle
/// or process is safe; `record_failure` serialises on a write transaction.
#[derive(Clone)]
pub struct QuarantineRegistry {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for QuarantineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuarantineRegistry")
            .field("path", &self.path)
            .finish()
    }
}

impl QuarantineRegistry {
    /// Open or create the registry database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Private, non-durable registry
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, file_hash: &str) -> Result<Option<QuarantineRecord>> {
        let conn = self.conn();
        let record = conn
            .query_row(
                "SELECT attempts, banned FROM file_registry WHERE file_hash = ?1",
                params![file_hash],
                |row| {
                    Ok(QuarantineRecord {
                        file_hash: file_hash.to_string(),
                        attempts: row.get(0)?,
                        banned: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    pub fn state(&self, file_hash: &str) -> Result<QuarantineState> {
        Ok(match self.record(file_hash)? {
            None => QuarantineState::Clean,
            Some(r) if r.banned => QuarantineState::Banned,
            Some(r) => QuarantineState::Warned {
                attempts: r.attempts,
            },
        })
    }

    pub fn is_banned(&self, file_hash: &str) -> Result<bool> {
        Ok(self.record(file_hash)?.is_some_and(|r| r.banned))
    }

    /// Forget a carrier's failures after a successful decode.
    ///
    /// Banned hashes are left alone.
    #[instrument(skip_all, fields(hash = %file_hash))]
    pub fn record_success(&self, file_hash: &str) -> Result<()> {
        let conn = self.conn();
        let cleared = conn.execute(
            "DELETE FROM file_registry WHERE file_hash = ?1 AND banned = 0",
            params![file_hash],
        )?;
        if cleared > 0 {
            info!("failure count reset");
        }
        Ok(())
    }

    /// Charge one failed decode against `file_hash`.
    ///
    /// Read, increment and write happen inside one immediate transaction, so
    /// concurrent failures on the same hash are strictly ordered and exactly
    /// one of them observes the limit. That one scrambles `carrier` and bans
    /// the scrambled file's hash alongside `file_hash` before the ban
    /// commits. A hash that is already banned is returned unchanged.
    #[instrument(skip_all, fields(hash = %file_hash))]
    pub fn record_failure(&self, file_hash: &str, carrier: &Path) -> Result<FailureOutcome> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Option<(u32, bool)> = tx
            .query_row(
                "SELECT attempts, banned FROM file_registry WHERE file_hash = ?1",
                params![file_hash],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        if let Some((attempts, true)) = current {
            tx.commit()?;
            return Ok(FailureOutcome {
                attempts,
                banned: true,
                newly_banned: false,
            });
        }

        let attempts = current.map_or(0, |(n, _)| n) + 1;
        let banned = attempts >= MAX_ATTEMPTS;

        tx.execute(
            "INSERT INTO file_registry (file_hash, attempts, banned) VALUES (?1, ?2, ?3)
             ON CONFLICT(file_hash) DO UPDATE SET attempts = excluded.attempts, banned = excluded.banned",
            params![file_hash, attempts, banned],
        )?;

        if banned {
            warn!(attempts, carrier = %carrier.display(), "attempt limit reached, banning carrier");
            // the ban stands even if the file could not be scrambled
            match corrupt_carrier(carrier) {
                Ok(scrambled_hash) => {
                    tx.execute(
                        "INSERT INTO file_registry (file_hash, attempts, banned) VALUES (?1, ?2, 1)
                         ON CONFLICT(file_hash) DO UPDATE SET attempts = excluded.attempts, banned = 1",
                        params![scrambled_hash, MAX_ATTEMPTS],
                    )?;
                }
                Err(e) => warn!(error = %e, "carrier corruption failed"),
            }
        } else {
            info!(attempts, remaining = MAX_ATTEMPTS - attempts, "failed decode recorded");
        }

        tx.commit()?;
        Ok(FailureOutcome {
            attempts,
            banned,
            newly_banned: banned,
        })
    }
}
