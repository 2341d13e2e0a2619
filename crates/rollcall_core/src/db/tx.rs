//! Unit-of-work helpers.
//!
//! # Responsibility
//! - Run a closure inside one SQLite transaction and commit it as a whole.
//! - Retry the whole closure when SQLite reports a transient lock conflict.
//!
//! # Invariants
//! - Write units use `BEGIN IMMEDIATE`, so the write lock is held from the
//!   first read. Check-and-write sequences inside one unit are serialized
//!   against every other writer on the database file, across processes.
//! - Any error rolls the transaction back; nothing is partially committed.
//! - A retried unit re-runs from scratch and never reuses earlier reads.

use log::warn;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Duration;

/// Bounded retry policy for lock conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one. `1` disables retry.
    pub max_attempts: u32,
    /// Base sleep between attempts; attempt `n` sleeps `backoff * n`.
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff: Duration::from_millis(20),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

/// Errors that can tell whether they come from a transient lock conflict.
pub trait Retryable {
    fn is_busy(&self) -> bool;
}

/// Runs `op` inside a `BEGIN IMMEDIATE` transaction and commits it.
///
/// `label` names the unit in `event=tx_retry` log lines.
///
/// # Errors
/// - Returns the closure error unchanged after rolling back.
/// - Returns the last busy error when `policy.max_attempts` is exhausted.
pub fn run_immediate<T, E, F>(
    conn: &Connection,
    policy: RetryPolicy,
    label: &str,
    mut op: F,
) -> Result<T, E>
where
    E: From<rusqlite::Error> + Retryable,
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match attempt_once(conn, TransactionBehavior::Immediate, &mut op) {
            Err(err) if err.is_busy() && attempt < max_attempts => {
                warn!(
                    "event=tx_retry module=db status=busy unit={} attempt={} max_attempts={}",
                    label, attempt, max_attempts
                );
                std::thread::sleep(policy.backoff * attempt);
                attempt += 1;
            }
            other => return other,
        }
    }
}

/// Runs `op` inside a deferred transaction so all of its reads observe one
/// consistent snapshot. Nothing is written.
pub fn run_read<T, E, F>(conn: &Connection, mut op: F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
{
    attempt_once(conn, TransactionBehavior::Deferred, &mut op)
}

fn attempt_once<T, E, F>(conn: &Connection, behavior: TransactionBehavior, op: &mut F) -> Result<T, E>
where
    E: From<rusqlite::Error>,
    F: FnMut(&Transaction<'_>) -> Result<T, E>,
{
    let tx = Transaction::new_unchecked(conn, behavior)?;
    let value = op(&tx)?;
    tx.commit()?;
    Ok(value)
}
