//! SQLite native driver
//!
//! Implements the native driver contract on top of `rusqlite`. Errors are
//! reported the way the contract expects: raised under
//! [`ReportMode::Strict`], otherwise recorded in the errno/error indicators of
//! the connection or statement.

use crate::core::connection::Connection;
use crate::core::native::{
    ConnectParams, NativeConnection, NativeCursor, NativeError, NativeField, NativeResult,
    NativeStatement, QueryOutcome, ReportMode,
};
use crate::core::value::{DatabaseValue, BIND_BLOB, BIND_DOUBLE, BIND_INT, BIND_STR};
use parking_lot::Mutex;
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params_from_iter, Connection as RawConnection};
use std::sync::Arc;

/// Generic error
pub const SQLITE_ERROR: i32 = 1;
/// Library used incorrectly
pub const SQLITE_MISUSE: i32 = 21;
/// Parameter index out of range
pub const SQLITE_RANGE: i32 = 25;

/// Database opened when the connection string names none
pub const DEFAULT_DATABASE: &str = ":memory:";

/// A bridge connection backed by SQLite
pub type SqliteBridge = Connection<SqliteConnection>;

/// errno/error pair
#[derive(Debug, Clone, Default)]
struct Indicators {
    errno: i32,
    error: String,
}

impl Indicators {
    fn clear(&mut self) {
        self.errno = 0;
        self.error.clear();
    }

    /// Record a failure, then raise it or hand back the failure value
    fn record<T>(&mut self, mode: ReportMode, err: NativeError, failed: T) -> NativeResult<T> {
        self.errno = err.code;
        self.error = err.message.clone();
        match mode {
            ReportMode::Strict => Err(err),
            ReportMode::Error => {
                tracing::warn!(code = err.code, message = %err.message, "sqlite error");
                Ok(failed)
            }
            ReportMode::Off => Ok(failed),
        }
    }
}

fn native_error(err: &rusqlite::Error) -> NativeError {
    match err {
        rusqlite::Error::SqliteFailure(failure, message) => NativeError::new(
            failure.extended_code,
            message.clone().unwrap_or_else(|| failure.to_string()),
        ),
        other => NativeError::new(SQLITE_ERROR, other.to_string()),
    }
}

fn value_from_sqlite(value: ValueRef<'_>) -> DatabaseValue {
    match value {
        ValueRef::Null => DatabaseValue::Null,
        ValueRef::Integer(v) => DatabaseValue::Int(v),
        ValueRef::Real(v) => DatabaseValue::Double(v),
        ValueRef::Text(v) => DatabaseValue::String(String::from_utf8_lossy(v).into_owned()),
        ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
    }
}

/// Convert a bound value according to its native type code
fn value_to_sqlite(value: &DatabaseValue, code: char) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    match code {
        BIND_INT => Value::Integer(value.to_int_lossy()),
        BIND_DOUBLE => Value::Real(value.as_double().unwrap_or_default()),
        BIND_BLOB => Value::Blob(value.as_bytes().map_or_else(|| value.to_text().into_bytes(), <[u8]>::to_vec)),
        _ => match value {
            DatabaseValue::Bytes(bytes) => Value::Blob(bytes.clone()),
            other => Value::Text(other.to_text()),
        },
    }
}

/// What running one statement produced
enum Execution {
    Rows(SqliteResult),
    Affected(u64),
}

/// Run `sql` with already converted parameters
fn run(
    conn: &RawConnection,
    sql: &str,
    params: Vec<Value>,
    buffered: bool,
    cached: bool,
) -> rusqlite::Result<Execution> {
    let mut cached_stmt;
    let mut plain_stmt;
    let stmt: &mut rusqlite::Statement<'_> = if cached {
        cached_stmt = conn.prepare_cached(sql)?;
        &mut *cached_stmt
    } else {
        plain_stmt = conn.prepare(sql)?;
        &mut plain_stmt
    };

    if stmt.column_count() == 0 {
        let affected = stmt.execute(params_from_iter(params.iter()))?;
        return Ok(Execution::Affected(affected as u64));
    }

    let mut fields: Vec<NativeField> = stmt
        .columns()
        .iter()
        .map(|column| NativeField {
            name: column.name().to_string(),
            orgname: column.name().to_string(),
            decl_type: column.decl_type().unwrap_or_default().to_string(),
            ..Default::default()
        })
        .collect();
    let width = fields.len();

    let mut rows = Vec::new();
    let mut cursor = stmt.query(params_from_iter(params.iter()))?;
    while let Some(row) = cursor.next()? {
        let values = (0..width)
            .map(|i| row.get_ref(i).map(value_from_sqlite))
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.push(values);
    }

    // SQLite declares no column widths; report the widest value in the result
    for (i, field) in fields.iter_mut().enumerate() {
        field.length = rows
            .iter()
            .filter_map(|row| row.get(i))
            .map(|value| value.to_text().chars().count() as u64)
            .max()
            .unwrap_or(0);
    }

    Ok(Execution::Rows(SqliteResult::new(fields, rows, buffered)))
}

struct SqliteShared {
    conn: RawConnection,
    report_mode: ReportMode,
    indicators: Indicators,
    affected_rows: i64,
    autocommit: bool,
}

impl SqliteShared {
    /// Open the implicit transaction that stands in for autocommit being off
    fn begin_implicit(&self) -> rusqlite::Result<()> {
        if !self.autocommit && self.conn.is_autocommit() {
            self.conn.execute_batch("BEGIN")?;
        }
        Ok(())
    }

    fn control(&mut self, sql: &str) -> NativeResult<bool> {
        self.indicators.clear();
        match self.conn.execute_batch(sql) {
            Ok(()) => Ok(true),
            Err(e) => {
                let mode = self.report_mode;
                self.indicators.record(mode, native_error(&e), false)
            }
        }
    }
}

/// Native SQLite connection
pub struct SqliteConnection {
    shared: Arc<Mutex<SqliteShared>>,
}

impl SqliteConnection {
    /// Whether the underlying SQLite handle currently has no open transaction
    pub fn is_autocommit(&self) -> bool {
        self.shared.lock().conn.is_autocommit()
    }
}

impl NativeConnection for SqliteConnection {
    type Cursor = SqliteResult;
    type Statement = SqliteStatement;

    const DRIVER_NAME: &'static str = "sqlite";

    fn connect(params: &ConnectParams) -> NativeResult<Self> {
        let path = params
            .dbname
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_DATABASE);
        let conn = RawConnection::open(path).map_err(|e| native_error(&e))?;
        Ok(Self {
            shared: Arc::new(Mutex::new(SqliteShared {
                conn,
                report_mode: ReportMode::Off,
                indicators: Indicators::default(),
                affected_rows: 0,
                autocommit: true,
            })),
        })
    }

    fn report_mode(&self) -> ReportMode {
        self.shared.lock().report_mode
    }

    fn set_report_mode(&mut self, mode: ReportMode) {
        self.shared.lock().report_mode = mode;
    }

    fn prepare(&mut self, sql: &str) -> NativeResult<Option<SqliteStatement>> {
        let mut shared = self.shared.lock();
        shared.indicators.clear();

        let described = shared
            .conn
            .prepare(sql)
            .map(|stmt| (stmt.parameter_count(), stmt.column_count()));
        match described {
            Ok((param_count, column_count)) => Ok(Some(SqliteStatement {
                shared: Arc::clone(&self.shared),
                sql: sql.to_string(),
                param_count,
                column_count,
                bound: None,
                result: None,
                affected_rows: 0,
                indicators: Indicators::default(),
                closed: false,
            })),
            Err(e) => {
                let mode = shared.report_mode;
                shared.indicators.record(mode, native_error(&e), None)
            }
        }
    }

    fn query(&mut self, sql: &str, buffered: bool) -> NativeResult<Option<QueryOutcome<SqliteResult>>> {
        let mut shared = self.shared.lock();
        shared.indicators.clear();

        let executed = shared
            .begin_implicit()
            .and_then(|()| run(&shared.conn, sql, Vec::new(), buffered, false));
        match executed {
            Ok(Execution::Rows(result)) => {
                shared.affected_rows = result.rows.len() as i64;
                Ok(Some(QueryOutcome::Rows(result)))
            }
            Ok(Execution::Affected(rows)) => {
                shared.affected_rows = rows as i64;
                Ok(Some(QueryOutcome::Affected(rows)))
            }
            Err(e) => {
                let mode = shared.report_mode;
                shared.indicators.record(mode, native_error(&e), None)
            }
        }
    }

    fn begin_transaction(&mut self) -> NativeResult<bool> {
        let mut shared = self.shared.lock();
        // an implicit transaction is committed first
        let sql = if shared.conn.is_autocommit() {
            "BEGIN"
        } else {
            "COMMIT; BEGIN"
        };
        shared.control(sql)
    }

    fn commit(&mut self) -> NativeResult<bool> {
        self.shared.lock().control("COMMIT")
    }

    fn rollback(&mut self) -> NativeResult<bool> {
        self.shared.lock().control("ROLLBACK")
    }

    fn autocommit(&mut self, enabled: bool) -> NativeResult<bool> {
        let mut shared = self.shared.lock();
        shared.indicators.clear();
        shared.autocommit = enabled;
        if enabled && !shared.conn.is_autocommit() {
            return shared.control("COMMIT");
        }
        Ok(true)
    }

    fn affected_rows(&self) -> i64 {
        self.shared.lock().affected_rows
    }

    fn insert_id(&self) -> i64 {
        self.shared.lock().conn.last_insert_rowid()
    }

    fn escape_string(&self, raw: &str) -> String {
        raw.replace('\'', "''")
    }

    fn errno(&self) -> i32 {
        self.shared.lock().indicators.errno
    }

    fn error(&self) -> String {
        self.shared.lock().indicators.error.clone()
    }
}

/// Native SQLite prepared statement
pub struct SqliteStatement {
    shared: Arc<Mutex<SqliteShared>>,
    sql: String,
    param_count: usize,
    column_count: usize,
    bound: Option<(String, Vec<DatabaseValue>)>,
    result: Option<SqliteResult>,
    affected_rows: i64,
    indicators: Indicators,
    closed: bool,
}

impl SqliteStatement {
    /// Columns the statement produces, known at prepare time
    pub fn column_count(&self) -> usize {
        self.column_count
    }
}

impl NativeStatement for SqliteStatement {
    type Cursor = SqliteResult;

    fn param_count(&self) -> usize {
        self.param_count
    }

    fn bind_param(&mut self, types: &str, values: Vec<DatabaseValue>) -> NativeResult<bool> {
        let mode = {
            let mut shared = self.shared.lock();
            shared.indicators.clear();
            shared.report_mode
        };
        self.indicators.clear();

        if types.chars().count() != values.len() {
            let err = NativeError::new(
                SQLITE_RANGE,
                "Number of elements in type definition string doesn't match number of bind variables",
            );
            return self.indicators.record(mode, err, false);
        }
        if values.len() != self.param_count {
            let err = NativeError::new(
                SQLITE_RANGE,
                "Number of variables doesn't match number of parameters in prepared statement",
            );
            return self.indicators.record(mode, err, false);
        }
        if let Some(code) = types
            .chars()
            .find(|c| ![BIND_INT, BIND_DOUBLE, BIND_STR, BIND_BLOB].contains(c))
        {
            let err = NativeError::new(SQLITE_MISUSE, format!("Undefined fieldtype {code}"));
            return self.indicators.record(mode, err, false);
        }

        self.bound = Some((types.to_string(), values));
        Ok(true)
    }

    fn execute(&mut self) -> NativeResult<bool> {
        let shared = Arc::clone(&self.shared);
        let mut shared = shared.lock();
        let mode = shared.report_mode;
        shared.indicators.clear();
        self.indicators.clear();
        self.result = None;

        if self.closed {
            let err = NativeError::new(SQLITE_MISUSE, "Statement is closed");
            return self.indicators.record(mode, err, false);
        }

        let params: Vec<Value> = match &self.bound {
            Some((types, values)) => values
                .iter()
                .zip(types.chars())
                .map(|(value, code)| value_to_sqlite(value, code))
                .collect(),
            None => Vec::new(),
        };
        if params.len() != self.param_count {
            let err = NativeError::new(
                SQLITE_RANGE,
                format!(
                    "No data supplied for parameters in prepared statement ({} of {})",
                    params.len(),
                    self.param_count
                ),
            );
            return self.indicators.record(mode, err, false);
        }

        let executed = shared
            .begin_implicit()
            .and_then(|()| run(&shared.conn, &self.sql, params, true, true));
        match executed {
            Ok(Execution::Rows(result)) => {
                self.affected_rows = result.rows.len() as i64;
                self.result = Some(result);
                Ok(true)
            }
            Ok(Execution::Affected(rows)) => {
                self.affected_rows = rows as i64;
                Ok(true)
            }
            Err(e) => self.indicators.record(mode, native_error(&e), false),
        }
    }

    fn result(&mut self) -> Option<SqliteResult> {
        self.result.take()
    }

    fn affected_rows(&self) -> i64 {
        self.affected_rows
    }

    fn more_results(&self) -> bool {
        false
    }

    fn next_result(&mut self) -> NativeResult<bool> {
        let mode = {
            let mut shared = self.shared.lock();
            shared.indicators.clear();
            shared.report_mode
        };
        let err = NativeError::new(SQLITE_MISUSE, "There are no more result sets");
        self.indicators.record(mode, err, false)
    }

    fn errno(&self) -> i32 {
        self.indicators.errno
    }

    fn error(&self) -> String {
        self.indicators.error.clone()
    }

    fn close(&mut self) {
        self.closed = true;
        self.bound = None;
        self.result = None;
    }
}

/// Rows produced by one SQLite statement
#[derive(Debug, Clone)]
pub struct SqliteResult {
    fields: Vec<NativeField>,
    rows: Vec<Vec<DatabaseValue>>,
    position: usize,
    buffered: bool,
    closed: bool,
}

impl SqliteResult {
    fn new(fields: Vec<NativeField>, rows: Vec<Vec<DatabaseValue>>, buffered: bool) -> Self {
        Self {
            fields,
            rows,
            position: 0,
            buffered,
            closed: false,
        }
    }
}

impl NativeCursor for SqliteResult {
    fn fields(&self) -> &[NativeField] {
        &self.fields
    }

    fn is_buffered(&self) -> bool {
        self.buffered
    }

    fn num_rows(&self) -> Option<usize> {
        self.buffered.then_some(self.rows.len())
    }

    fn data_seek(&mut self, offset: usize) -> bool {
        if !self.buffered || self.closed || offset >= self.rows.len() {
            return false;
        }
        self.position = offset;
        true
    }

    fn fetch_row(&mut self) -> Option<Vec<DatabaseValue>> {
        if self.closed {
            return None;
        }
        let row = self.rows.get(self.position).cloned()?;
        self.position += 1;
        Some(row)
    }

    fn fetch_all(&mut self) -> Vec<Vec<DatabaseValue>> {
        if self.closed {
            return Vec::new();
        }
        let rest = self.rows.split_off(self.position.min(self.rows.len()));
        self.position = self.rows.len();
        rest
    }

    fn close(&mut self) {
        self.closed = true;
        self.rows.clear();
        self.position = 0;
    }
}
