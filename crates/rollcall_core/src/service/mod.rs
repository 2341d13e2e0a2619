//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Own every transaction boundary; repositories never open one.
//!
//! # Invariants
//! - Services hold no state between calls. Each operation re-reads current
//!   rows inside its own unit of work.
//! - Every decision that guards an invariant (capacity, owner succession,
//!   cascade order) is made on rows read inside the committing transaction.

pub mod cascade_service;
pub mod error;
pub mod event_service;
pub mod membership_service;
pub mod organization_service;

use error::ServiceError;
use log::{error, info};
use std::time::Instant;

/// Emits the failure line for one operation, at `error` level only for
/// internal faults.
pub(crate) fn log_failure(operation: &str, module: &str, started_at: Instant, err: &ServiceError) {
    let code = err.code();
    if err.is_recoverable() {
        info!(
            "event={} module={} status=rejected duration_ms={} error_code={}",
            operation,
            module,
            started_at.elapsed().as_millis(),
            code
        );
    } else {
        error!(
            "event={} module={} status=error duration_ms={} error_code={} error={}",
            operation,
            module,
            started_at.elapsed().as_millis(),
            code,
            err
        );
    }
}
