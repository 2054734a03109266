//! Connection
//!
//! Owns the native connection, its configuration and the transaction depth.
//! Statements created from a connection share this state through an
//! `Arc<Mutex<..>>`, so every native call on one connection is serialized.

use super::attributes::{Attribute, AttributeKind, ConnectionOptions};
use super::compiler::compile;
use super::database::{ConnectionApi, Dsn, ExecOutcome};
use super::error::{DatabaseError, ErrorInfo, Result};
use super::error_mode::{require, with_connection, ErrorMode};
use super::fetch::{FetchMode, ResultCursor};
use super::native::{NativeConnection, NativeCursor, QueryOutcome};
use super::statement::Statement;
use super::transaction::TransactionDepth;
use super::value::{DatabaseValue, ParamType};
use parking_lot::Mutex;
use std::sync::Arc;

/// Host prefix requesting a persistent native link
pub const PERSISTENT_HOST_PREFIX: &str = "p:";

/// State shared by a connection and its statements
pub(crate) struct ConnectionState<C: NativeConnection> {
    pub(crate) native: C,
    pub(crate) options: ConnectionOptions,
    pub(crate) depth: TransactionDepth,
    pub(crate) last_error: Option<DatabaseError>,
}

pub(crate) type SharedState<C> = Arc<Mutex<ConnectionState<C>>>;

/// A bridge connection over a native driver
pub struct Connection<C: NativeConnection> {
    shared: SharedState<C>,
}

impl<C: NativeConnection> Connection<C> {
    /// Connect using a connection string.
    ///
    /// Every failure here is returned as `Err`, whatever the error mode.
    pub fn open(
        dsn: &str,
        username: Option<&str>,
        password: Option<&str>,
        options: ConnectionOptions,
    ) -> Result<Self> {
        options.validate()?;
        let dsn = Dsn::parse(dsn)?;
        if !dsn.scheme.eq_ignore_ascii_case(C::DRIVER_NAME) {
            return Err(DatabaseError::invalid_connection_string(format!(
                "driver '{}' is not available, check available drivers",
                dsn.scheme
            )));
        }

        let mut params = dsn.connect_params(username, password);
        if options.persistent {
            params.host = Some(format!(
                "{PERSISTENT_HOST_PREFIX}{}",
                params.host.unwrap_or_default()
            ));
        }

        let native = C::connect(&params)?;
        tracing::info!(
            driver = C::DRIVER_NAME,
            host = params.host.as_deref().unwrap_or(""),
            dbname = params.dbname.as_deref().unwrap_or(""),
            "connected"
        );
        Self::from_native(native, options)
    }

    /// Wrap an already open native connection
    pub fn from_native(native: C, options: ConnectionOptions) -> Result<Self> {
        options.validate()?;
        let mut state = ConnectionState {
            native,
            options,
            depth: TransactionDepth::default(),
            last_error: None,
        };

        if !state.options.autocommit {
            let mode = state.options.error_mode;
            let done = with_connection(mode, &mut state.native, |c| c.autocommit(false))?;
            require(done, "Disabling autocommit")?;
        }

        if !state.options.init_command.is_empty() {
            let sql = state.options.init_command.clone();
            run_exec(&mut state, &sql)?;
            tracing::debug!(sql = %sql, "init command executed");
        }

        Ok(Self {
            shared: Arc::new(Mutex::new(state)),
        })
    }

    /// Current configuration
    pub fn options(&self) -> ConnectionOptions {
        self.shared.lock().options.clone()
    }

    pub fn error_mode(&self) -> ErrorMode {
        self.shared.lock().options.error_mode
    }

    /// Run a closure against the native connection
    pub fn with_native<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        f(&mut self.shared.lock().native)
    }

    /// Current transaction depth
    pub fn transaction_depth(&self) -> u32 {
        self.shared.lock().depth.get()
    }
}

fn run_exec<C: NativeConnection>(state: &mut ConnectionState<C>, sql: &str) -> Result<ExecOutcome> {
    let mode = state.options.error_mode;
    let buffered = state.options.buffered;
    let outcome = with_connection(mode, &mut state.native, |c| c.query(sql, buffered))?;
    match outcome {
        Some(QueryOutcome::Rows(mut cursor)) => {
            cursor.close();
            Ok(ExecOutcome::ResultSet)
        }
        Some(QueryOutcome::Affected(rows)) => Ok(ExecOutcome::Affected(rows)),
        None => Err(DatabaseError::logical("Query failed")),
    }
}

impl<C: NativeConnection> ConnectionApi for Connection<C> {
    type Statement = Statement<C>;

    fn prepare(&self, sql: &str) -> Result<Option<Statement<C>>> {
        let query = compile(sql);
        let mut state = self.shared.lock();
        let state = &mut *state;
        let mode = state.options.error_mode;
        let default_fetch = FetchMode::try_from(state.options.default_fetch)?;

        let outcome = with_connection(mode, &mut state.native, |c| c.prepare(query.native()))
            .and_then(|prepared| prepared.ok_or_else(|| DatabaseError::logical("Prepare failed")));
        let Some(native) = mode.settle(outcome, &mut state.last_error)? else {
            return Ok(None);
        };
        tracing::debug!(sql = %sql, slots = query.len(), "statement prepared");
        Ok(Some(Statement::prepared(
            Arc::clone(&self.shared),
            query,
            native,
            default_fetch,
        )))
    }

    fn query(&self, sql: &str, mode: Option<FetchMode>) -> Result<Option<Statement<C>>> {
        let query = compile(sql);
        let mut state = self.shared.lock();
        let state = &mut *state;
        let error_mode = state.options.error_mode;
        let buffered = state.options.buffered;
        let fetch_mode = match mode {
            Some(mode) => mode,
            None => FetchMode::try_from(state.options.default_fetch)?,
        };

        let outcome = with_connection(error_mode, &mut state.native, |c| c.query(sql, buffered))
            .and_then(|outcome| outcome.ok_or_else(|| DatabaseError::logical("Query failed")));
        let Some(outcome) = error_mode.settle(outcome, &mut state.last_error)? else {
            return Ok(None);
        };
        tracing::debug!(sql = %sql, buffered, "query executed");

        let (cursor, row_count) = match outcome {
            QueryOutcome::Rows(cursor) => {
                let rows = cursor.num_rows().unwrap_or(0);
                (Some(ResultCursor::new(cursor)), i64::try_from(rows).unwrap_or(i64::MAX))
            }
            QueryOutcome::Affected(rows) => (None, i64::try_from(rows).unwrap_or(i64::MAX)),
        };
        Ok(Some(Statement::direct(
            Arc::clone(&self.shared),
            query,
            cursor,
            row_count,
            fetch_mode,
        )))
    }

    fn exec(&self, sql: &str) -> Result<Option<ExecOutcome>> {
        let mut state = self.shared.lock();
        let mode = state.options.error_mode;
        let outcome = run_exec(&mut state, sql);
        tracing::debug!(sql = %sql, ok = outcome.is_ok(), "exec");
        mode.settle(outcome, &mut state.last_error)
    }

    fn begin_transaction(&self) -> Result<bool> {
        let mut state = self.shared.lock();
        let ConnectionState {
            native,
            options,
            depth,
            last_error,
        } = &mut *state;
        let mode = options.error_mode;
        mode.settle_bool(depth.begin(mode, native), last_error)
    }

    fn commit(&self) -> Result<bool> {
        let mut state = self.shared.lock();
        let ConnectionState {
            native,
            options,
            depth,
            last_error,
        } = &mut *state;
        let mode = options.error_mode;
        mode.settle_bool(depth.commit(mode, native), last_error)
    }

    fn roll_back(&self) -> Result<bool> {
        let mut state = self.shared.lock();
        let ConnectionState {
            native,
            options,
            depth,
            last_error,
        } = &mut *state;
        let mode = options.error_mode;
        mode.settle_bool(depth.rollback(mode, native), last_error)
    }

    fn in_transaction(&self) -> bool {
        self.shared.lock().depth.is_active()
    }

    fn set_attribute(&self, attribute: Attribute) -> Result<bool> {
        let mut state = self.shared.lock();
        let state = &mut *state;
        let mode = state.options.error_mode;

        let outcome = match attribute {
            Attribute::Autocommit(enabled) => {
                with_connection(mode, &mut state.native, |c| c.autocommit(enabled))
                    .and_then(|done| require(done, "Changing autocommit"))
                    .and_then(|()| state.options.set(attribute))
            }
            other => state.options.set(other),
        };
        let mode = state.options.error_mode;
        mode.settle_bool(outcome, &mut state.last_error)
    }

    fn attribute(&self, kind: AttributeKind) -> Attribute {
        self.shared.lock().options.get(kind)
    }

    fn quote(&self, value: &DatabaseValue, param_type: ParamType) -> String {
        match param_type {
            ParamType::Null => "NULL".to_string(),
            ParamType::Bool => String::from(if value.is_truthy() { "1" } else { "0" }),
            ParamType::Int => value.to_int_lossy().to_string(),
            ParamType::Str => {
                let escaped = self.shared.lock().native.escape_string(&value.to_text());
                format!("'{escaped}'")
            }
        }
    }

    fn last_insert_id(&self) -> i64 {
        self.shared.lock().native.insert_id()
    }

    fn error_code(&self) -> i32 {
        self.shared.lock().last_error.as_ref().map_or(0, DatabaseError::code)
    }

    fn error_info(&self) -> ErrorInfo {
        self.shared
            .lock()
            .last_error
            .as_ref()
            .map(ErrorInfo::from)
            .unwrap_or_default()
    }

    fn available_drivers() -> Vec<&'static str> {
        vec![C::DRIVER_NAME]
    }
}

impl<C: NativeConnection> std::fmt::Debug for Connection<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("Connection")
            .field("driver", &C::DRIVER_NAME)
            .field("options", &state.options)
            .field("depth", &state.depth)
            .finish()
    }
}
