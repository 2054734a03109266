//! Transaction depth control and a scoped guard
//!
//! [`TransactionDepth`] is the counter every connection owns; it moves only
//! after the native primitive reports success. [`TransactionGuard`] is the
//! RAII helper that rolls back on drop unless the transaction was finished.

use super::database::ConnectionApi;
use super::error::{DatabaseError, Result};
use super::error_mode::{require, with_connection, ErrorMode};
use super::native::NativeConnection;

/// Nesting depth of the connection's transaction; `0` means idle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransactionDepth(u32);

impl TransactionDepth {
    pub fn get(self) -> u32 {
        self.0
    }

    pub fn is_active(self) -> bool {
        self.0 > 0
    }

    /// Start a transaction. Only allowed while idle.
    pub fn begin<C: NativeConnection>(&mut self, mode: ErrorMode, native: &mut C) -> Result<()> {
        if self.is_active() {
            return Err(DatabaseError::transaction("There is already an active transaction"));
        }
        let done = with_connection(mode, native, |c| c.begin_transaction())?;
        require(done, "Begin transaction")?;
        self.0 = 1;
        tracing::debug!(depth = self.0, "transaction started");
        Ok(())
    }

    /// Commit the active transaction
    pub fn commit<C: NativeConnection>(&mut self, mode: ErrorMode, native: &mut C) -> Result<()> {
        self.finish(mode, native, "Commit", |c| c.commit())
    }

    /// Roll back the active transaction
    pub fn rollback<C: NativeConnection>(&mut self, mode: ErrorMode, native: &mut C) -> Result<()> {
        self.finish(mode, native, "Rollback", |c| c.rollback())
    }

    fn finish<C, F>(&mut self, mode: ErrorMode, native: &mut C, what: &str, call: F) -> Result<()>
    where
        C: NativeConnection,
        F: FnOnce(&mut C) -> super::native::NativeResult<bool>,
    {
        if !self.is_active() {
            return Err(DatabaseError::transaction(format!(
                "{what} without an active transaction"
            )));
        }
        let done = with_connection(mode, native, call)?;
        require(done, what)?;
        self.0 -= 1;
        tracing::debug!(depth = self.0, "{} finished", what.to_lowercase());
        Ok(())
    }
}

/// Transaction guard that rolls back on drop if not finished
///
/// # Example
///
/// ```ignore
/// use rust_statement_bridge::prelude::*;
///
/// fn transfer(conn: &SqliteBridge) -> Result<()> {
///     let Some(tx) = TransactionGuard::begin(conn)? else {
///         return Ok(());
///     };
///     conn.exec("UPDATE accounts SET balance = balance - 100 WHERE id = 1")?;
///     conn.exec("UPDATE accounts SET balance = balance + 100 WHERE id = 2")?;
///     tx.commit()?;
///     Ok(())
/// }
/// ```
pub struct TransactionGuard<'a, A: ConnectionApi> {
    conn: &'a A,
    finished: bool,
}

impl<'a, A: ConnectionApi> TransactionGuard<'a, A> {
    /// Begin a transaction; `Ok(None)` when the connection refused to begin
    pub fn begin(conn: &'a A) -> Result<Option<Self>> {
        if !conn.begin_transaction()? {
            return Ok(None);
        }
        Ok(Some(Self {
            conn,
            finished: false,
        }))
    }

    pub fn connection(&self) -> &'a A {
        self.conn
    }

    /// Commit the transaction
    pub fn commit(mut self) -> Result<bool> {
        self.finished = true;
        self.conn.commit()
    }

    /// Explicitly roll back the transaction
    pub fn rollback(mut self) -> Result<bool> {
        self.finished = true;
        self.conn.roll_back()
    }
}

impl<A: ConnectionApi> Drop for TransactionGuard<'_, A> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        tracing::warn!("transaction guard dropped without commit or rollback, rolling back");
        match self.conn.roll_back() {
            Ok(true) => {}
            Ok(false) => tracing::error!("automatic rollback failed"),
            Err(e) => tracing::error!(error = %e, "automatic rollback failed"),
        }
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::backends::SqliteConnection;
    use crate::core::native::ConnectParams;

    fn native() -> SqliteConnection {
        SqliteConnection::connect(&ConnectParams::default()).unwrap()
    }

    #[test]
    fn test_depth_transitions() {
        let mut native = native();
        let mut depth = TransactionDepth::default();
        assert!(!depth.is_active());

        depth.begin(ErrorMode::Silent, &mut native).unwrap();
        assert_eq!(depth.get(), 1);

        let err = depth.begin(ErrorMode::Silent, &mut native).unwrap_err();
        assert!(err.message().contains("already an active transaction"));
        assert_eq!(depth.get(), 1);

        depth.commit(ErrorMode::Silent, &mut native).unwrap();
        assert_eq!(depth.get(), 0);
    }

    #[test]
    fn test_finish_while_idle_fails_without_native_call() {
        let mut native = native();
        let mut depth = TransactionDepth::default();
        assert!(depth.commit(ErrorMode::Silent, &mut native).is_err());
        assert!(depth.rollback(ErrorMode::Silent, &mut native).is_err());
        assert_eq!(depth.get(), 0);
        assert_eq!(native.errno(), 0);
    }

    #[test]
    fn test_rollback_decrements() {
        let mut native = native();
        let mut depth = TransactionDepth::default();
        depth.begin(ErrorMode::Exception, &mut native).unwrap();
        depth.rollback(ErrorMode::Exception, &mut native).unwrap();
        assert!(!depth.is_active());
    }
}
