//! Error mode translation
//!
//! Native calls run inside a [`ReportModeScope`] that switches the driver's
//! strictness to match the configured [`ErrorMode`] and puts the previous
//! setting back when the scope ends. After the scope has ended the connection
//! and statement error indicators are checked again, so a failure the driver
//! only recorded (without raising) is still caught.

use super::error::{DatabaseError, Result};
use super::native::{NativeConnection, NativeError, NativeResult, NativeStatement, ReportMode};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

/// How failures are surfaced to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Return the failure sentinel
    #[default]
    Silent,
    /// Emit a warning and return the failure sentinel
    Warning,
    /// Raise a [`DatabaseError`]
    Exception,
}

impl ErrorMode {
    /// Native strictness matching this mode
    pub fn report_mode(self) -> ReportMode {
        match self {
            ErrorMode::Silent => ReportMode::Off,
            ErrorMode::Warning => ReportMode::Error,
            ErrorMode::Exception => ReportMode::Strict,
        }
    }

    /// Surface a failure: `Err` in exception mode, `Ok(())` otherwise
    pub fn report(self, err: DatabaseError) -> Result<()> {
        match self {
            ErrorMode::Silent => {
                tracing::debug!(code = err.code(), message = err.message(), "operation failed");
                Ok(())
            }
            ErrorMode::Warning => {
                tracing::warn!(code = err.code(), message = err.message(), "operation failed");
                Ok(())
            }
            ErrorMode::Exception => Err(err),
        }
    }

    /// Turn a raw outcome into the caller-facing form, remembering the last
    /// failure (or clearing it on success).
    pub fn settle<T>(self, outcome: Result<T>, last_error: &mut Option<DatabaseError>) -> Result<Option<T>> {
        match outcome {
            Ok(value) => {
                *last_error = None;
                Ok(Some(value))
            }
            Err(err) => {
                *last_error = Some(err.clone());
                self.report(err)?;
                Ok(None)
            }
        }
    }

    /// [`settle`](Self::settle) for operations whose success is a boolean
    pub fn settle_bool(self, outcome: Result<()>, last_error: &mut Option<DatabaseError>) -> Result<bool> {
        self.settle(outcome, last_error).map(|done| done.is_some())
    }
}

impl std::fmt::Display for ErrorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ErrorMode::Silent => "silent",
            ErrorMode::Warning => "warning",
            ErrorMode::Exception => "exception",
        })
    }
}

/// Temporarily overrides a connection's native strictness.
///
/// The prior setting is restored on drop, on every exit path.
pub struct ReportModeScope<'a, C: NativeConnection> {
    native: &'a mut C,
    prior: ReportMode,
}

impl<'a, C: NativeConnection> ReportModeScope<'a, C> {
    pub fn enter(native: &'a mut C, mode: ReportMode) -> Self {
        let prior = native.report_mode();
        native.set_report_mode(mode);
        Self { native, prior }
    }

    pub fn prior(&self) -> ReportMode {
        self.prior
    }
}

impl<C: NativeConnection> Deref for ReportModeScope<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        self.native
    }
}

impl<C: NativeConnection> DerefMut for ReportModeScope<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        self.native
    }
}

impl<C: NativeConnection> Drop for ReportModeScope<'_, C> {
    fn drop(&mut self) {
        self.native.set_report_mode(self.prior);
    }
}

/// Run a connection-level native call under `mode`.
///
/// A call that returns normally still fails when the connection error
/// indicator is set afterwards.
pub fn with_connection<C, T, F>(mode: ErrorMode, native: &mut C, call: F) -> Result<T>
where
    C: NativeConnection,
    F: FnOnce(&mut C) -> NativeResult<T>,
{
    let outcome = {
        let mut scope = ReportModeScope::enter(native, mode.report_mode());
        call(&mut scope)
    };
    check(outcome, None, native.last_error())
}

/// Run a statement-level native call under `mode`.
///
/// Both the statement and the connection indicators are checked after the
/// native strictness has been restored.
pub fn with_statement<C, T, F>(
    mode: ErrorMode,
    native: &mut C,
    statement: &mut C::Statement,
    call: F,
) -> Result<T>
where
    C: NativeConnection,
    F: FnOnce(&mut C::Statement) -> NativeResult<T>,
{
    let outcome = {
        let _scope = ReportModeScope::enter(native, mode.report_mode());
        call(statement)
    };
    check(outcome, statement.last_error(), native.last_error())
}

fn check<T>(
    outcome: NativeResult<T>,
    statement_error: Option<NativeError>,
    connection_error: Option<NativeError>,
) -> Result<T> {
    match (outcome, statement_error.or(connection_error)) {
        (Err(raised), _) => Err(raised.into()),
        (Ok(_), Some(recorded)) => Err(recorded.into()),
        (Ok(value), None) => Ok(value),
    }
}

/// Convert a `false` native result into a failure
pub(crate) fn require(done: bool, what: &str) -> Result<()> {
    if done {
        Ok(())
    } else {
        Err(DatabaseError::logical(format!("{what} failed")))
    }
}
