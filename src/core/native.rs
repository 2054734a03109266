//! Native driver contract
//!
//! The narrow primitive set the bridge consumes from a lower-level client
//! library. A driver reports failures in one of two ways depending on its
//! current [`ReportMode`]: under [`ReportMode::Strict`] a failing call returns
//! `Err(NativeError)`; otherwise the call returns its failure value (`false`,
//! `None`) and records the error in the `errno`/`error` indicators of the
//! connection or statement.

use super::value::DatabaseValue;

/// Result of a native call
pub type NativeResult<T> = std::result::Result<T, NativeError>;

/// A fault raised by the native driver
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("native error {code}: {message}")]
pub struct NativeError {
    pub code: i32,
    pub message: String,
}

impl NativeError {
    pub fn new<S: Into<String>>(code: i32, message: S) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Native strictness setting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportMode {
    /// Record errors in the indicators only
    #[default]
    Off,
    /// Record errors and emit a driver-level diagnostic
    Error,
    /// Raise every error as `Err(NativeError)`
    Strict,
}

/// Connection parameters handed to [`NativeConnection::connect`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectParams {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub unix_socket: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Native column descriptor
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeField {
    /// Column name or alias as it appears in the result
    pub name: String,
    /// Original column name before aliasing
    pub orgname: String,
    /// Table name (or alias) the column belongs to
    pub table: String,
    /// Declared type as reported by the driver
    pub decl_type: String,
    /// Column width in characters. Drivers without declared widths report
    /// the widest value of the result instead, so it can vary with the data.
    pub length: u64,
    /// Number of decimals
    pub decimals: u32,
    /// Driver flag bits
    pub flags: u32,
}

/// Outcome of a direct (unprepared) query
#[derive(Debug)]
pub enum QueryOutcome<R> {
    /// The statement produced a result set
    Rows(R),
    /// The statement produced no result set
    Affected(u64),
}

/// A native result set
pub trait NativeCursor {
    /// Column descriptors of the result
    fn fields(&self) -> &[NativeField];

    /// Whether all rows are held client-side
    fn is_buffered(&self) -> bool;

    /// Total row count (buffered results only)
    fn num_rows(&self) -> Option<usize>;

    /// Position the cursor at an absolute row (buffered results only)
    fn data_seek(&mut self, offset: usize) -> bool;

    /// Next row as positional values, `None` at end of data
    fn fetch_row(&mut self) -> Option<Vec<DatabaseValue>>;

    /// All remaining rows in one call
    fn fetch_all(&mut self) -> Vec<Vec<DatabaseValue>> {
        std::iter::from_fn(|| self.fetch_row()).collect()
    }

    /// Release the result; must be safe to call more than once
    fn close(&mut self);
}

/// A native prepared statement
pub trait NativeStatement {
    type Cursor: NativeCursor;

    /// Number of `?` markers in the prepared text
    fn param_count(&self) -> usize;

    /// Bind all parameters at once; `types` holds one code per value
    fn bind_param(&mut self, types: &str, values: Vec<DatabaseValue>) -> NativeResult<bool>;

    /// Run the statement with the currently bound parameters
    fn execute(&mut self) -> NativeResult<bool>;

    /// Take the result set produced by the last execution, if any
    fn result(&mut self) -> Option<Self::Cursor>;

    /// Rows changed (or returned) by the last execution
    fn affected_rows(&self) -> i64;

    /// Whether further result sets are pending
    fn more_results(&self) -> bool;

    /// Advance to the next pending result set
    fn next_result(&mut self) -> NativeResult<bool>;

    fn errno(&self) -> i32;

    fn error(&self) -> String;

    /// Release the handle; must be safe to call more than once
    fn close(&mut self);

    /// Last error recorded on the statement, if the indicator is set
    fn last_error(&self) -> Option<NativeError> {
        match self.errno() {
            0 => None,
            code => Some(NativeError::new(code, self.error())),
        }
    }
}

/// A native connection
pub trait NativeConnection: Sized {
    type Cursor: NativeCursor;
    type Statement: NativeStatement<Cursor = Self::Cursor>;

    /// Scheme accepted in connection strings for this driver
    const DRIVER_NAME: &'static str;

    /// Open a connection; failures are always raised
    fn connect(params: &ConnectParams) -> NativeResult<Self>;

    fn report_mode(&self) -> ReportMode;

    fn set_report_mode(&mut self, mode: ReportMode);

    /// Prepare a statement containing `?` markers
    fn prepare(&mut self, sql: &str) -> NativeResult<Option<Self::Statement>>;

    /// Run a statement directly; `buffered` selects client-side buffering of rows
    fn query(
        &mut self,
        sql: &str,
        buffered: bool,
    ) -> NativeResult<Option<QueryOutcome<Self::Cursor>>>;

    fn begin_transaction(&mut self) -> NativeResult<bool>;

    fn commit(&mut self) -> NativeResult<bool>;

    fn rollback(&mut self) -> NativeResult<bool>;

    fn autocommit(&mut self, enabled: bool) -> NativeResult<bool>;

    /// Rows changed by the last direct query
    fn affected_rows(&self) -> i64;

    /// Identifier generated by the last insert
    fn insert_id(&self) -> i64;

    /// Escape a string for inclusion between single quotes
    fn escape_string(&self, raw: &str) -> String;

    fn errno(&self) -> i32;

    fn error(&self) -> String;

    /// Last error recorded on the connection, if the indicator is set
    fn last_error(&self) -> Option<NativeError> {
        match self.errno() {
            0 => None,
            code => Some(NativeError::new(code, self.error())),
        }
    }
}
