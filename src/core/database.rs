//! Statement and connection contracts, connection strings
//!
//! This module defines the two interface contracts of the bridge together with
//! the connection-string builder and parser.

use super::attributes::{Attribute, AttributeKind};
use super::binder::{ParamKey, Params, VarRef};
use super::error::{DatabaseError, ErrorInfo, Result};
use super::fetch::{ClassFactory, FetchMode, Fetched, Hydrate};
use super::native::ConnectParams;
use super::row::ColumnMeta;
use super::value::{DatabaseValue, ParamType};

/// Contract of a prepared statement
///
/// Operations that can fail return `Ok(false)` / `Ok(None)` in the silent and
/// warning error modes and `Err(DatabaseError)` in exception mode.
pub trait StatementApi {
    /// Execute with the registered bindings, plus optional ad-hoc parameters
    fn execute(&mut self, params: Option<&Params>) -> Result<bool>;

    /// Next row in the given (or default) style.
    ///
    /// `cursor_offset` positions a buffered cursor at an absolute row first.
    /// `Ok(None)` at end of data.
    fn fetch(&mut self, mode: Option<FetchMode>, cursor_offset: Option<usize>) -> Result<Option<Fetched>>;

    /// Every remaining row in the given (or default) style
    fn fetch_all(&mut self, mode: Option<FetchMode>) -> Result<Option<Vec<Fetched>>>;

    /// One value of the next row, at a 0-based column index
    fn fetch_column(&mut self, index: usize) -> Result<Option<DatabaseValue>>;

    /// Next row as a new object; the generic record type when `factory` is `None`
    fn fetch_object(
        &mut self,
        factory: Option<ClassFactory>,
        ctor_args: Vec<DatabaseValue>,
    ) -> Result<Option<Box<dyn Hydrate>>>;

    /// Bind a variable, read when the statement executes
    fn bind_param<K: Into<ParamKey>>(
        &mut self,
        key: K,
        var: &VarRef,
        param_type: ParamType,
        max_len: Option<usize>,
    ) -> Result<bool>;

    /// Bind a value, captured now
    fn bind_value<K: Into<ParamKey>, V: Into<DatabaseValue>>(
        &mut self,
        key: K,
        value: V,
        param_type: ParamType,
    ) -> Result<bool>;

    /// Bind an output column (1-based position or name) to a variable
    fn bind_column<K: Into<ParamKey>>(
        &mut self,
        key: K,
        var: &VarRef,
        param_type: ParamType,
        max_len: Option<usize>,
    ) -> Result<bool>;

    /// Rows changed or returned by the last execution
    fn row_count(&self) -> i64;

    /// Columns of the active result, `0` without one
    fn column_count(&self) -> usize;

    fn column_meta(&self, index: usize) -> Option<ColumnMeta>;

    /// Default style for later fetch calls
    fn set_fetch_mode(&mut self, mode: FetchMode) -> Result<bool>;

    /// Advance to the next result set, if the driver has one pending
    fn next_rowset(&mut self) -> Result<bool>;

    /// Release the active result; safe to call more than once
    fn close_cursor(&mut self) -> bool;

    fn error_code(&self) -> i32;

    fn error_info(&self) -> ErrorInfo;
}

/// Result of [`ConnectionApi::exec`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    /// Rows changed by a statement without a result set
    Affected(u64),
    /// The statement produced a result set (discarded)
    ResultSet,
}

/// Contract of a connection
pub trait ConnectionApi {
    type Statement: StatementApi;

    fn prepare(&self, sql: &str) -> Result<Option<Self::Statement>>;

    /// Prepare and execute a statement without parameters in one step
    fn query(&self, sql: &str, mode: Option<FetchMode>) -> Result<Option<Self::Statement>>;

    /// Run a statement directly
    fn exec(&self, sql: &str) -> Result<Option<ExecOutcome>>;

    fn begin_transaction(&self) -> Result<bool>;

    fn commit(&self) -> Result<bool>;

    fn roll_back(&self) -> Result<bool>;

    fn in_transaction(&self) -> bool;

    fn set_attribute(&self, attribute: Attribute) -> Result<bool>;

    fn attribute(&self, kind: AttributeKind) -> Attribute;

    /// Render a value as an SQL literal
    fn quote(&self, value: &DatabaseValue, param_type: ParamType) -> String;

    fn last_insert_id(&self) -> i64;

    fn error_code(&self) -> i32;

    fn error_info(&self) -> ErrorInfo;

    /// Drivers this connection type can open
    fn available_drivers() -> Vec<&'static str>
    where
        Self: Sized;
}

/// Parsed connection string: `scheme:host=H;port=P;dbname=D;unix_socket=S`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dsn {
    pub scheme: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub dbname: Option<String>,
    pub unix_socket: Option<String>,
}

impl Dsn {
    /// Parse a connection string.
    ///
    /// Keys are case-insensitive; unknown keys and parts without `=` are ignored.
    pub fn parse(dsn: &str) -> Result<Self> {
        let (scheme, rest) = dsn
            .split_once(':')
            .ok_or_else(|| DatabaseError::invalid_connection_string("missing driver scheme"))?;
        let scheme = scheme.trim();
        if scheme.is_empty() || !scheme.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_') {
            return Err(DatabaseError::invalid_connection_string(format!(
                "malformed driver scheme '{scheme}'"
            )));
        }

        let mut parsed = Dsn {
            scheme: scheme.to_ascii_lowercase(),
            ..Default::default()
        };
        for part in rest.split(';') {
            let Some((key, value)) = part.trim().split_once('=') else {
                continue;
            };
            let value = value.trim().to_string();
            match key.trim().to_ascii_lowercase().as_str() {
                "host" => parsed.host = Some(value),
                "port" => {
                    let port = value.parse::<u16>().map_err(|_| {
                        DatabaseError::invalid_connection_string(format!("invalid port '{value}'"))
                    })?;
                    parsed.port = Some(port);
                }
                "dbname" => parsed.dbname = Some(value),
                "unix_socket" => parsed.unix_socket = Some(value),
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// Native connect parameters, with credentials supplied separately
    pub fn connect_params(&self, username: Option<&str>, password: Option<&str>) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port,
            dbname: self.dbname.clone(),
            unix_socket: self.unix_socket.clone(),
            username: username.map(str::to_string),
            password: password.map(str::to_string),
        }
    }
}

/// Connection string builder
#[derive(Debug, Clone)]
pub struct ConnectionBuilder {
    scheme: String,
    host: Option<String>,
    port: Option<u16>,
    dbname: Option<String>,
    unix_socket: Option<String>,
}

impl ConnectionBuilder {
    /// Create a builder for the given driver scheme
    pub fn new<S: Into<String>>(scheme: S) -> Self {
        Self {
            scheme: scheme.into(),
            host: None,
            port: None,
            dbname: None,
            unix_socket: None,
        }
    }

    /// Set the database host
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Set the database port
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Set the database name
    pub fn dbname<S: Into<String>>(mut self, dbname: S) -> Self {
        self.dbname = Some(dbname.into());
        self
    }

    /// Set the unix socket path
    pub fn unix_socket<S: Into<String>>(mut self, socket: S) -> Self {
        self.unix_socket = Some(socket.into());
        self
    }

    /// Build the connection string
    pub fn build_connection_string(&self) -> String {
        let mut parts = Vec::new();
        if let Some(host) = &self.host {
            parts.push(format!("host={host}"));
        }
        if let Some(port) = self.port {
            parts.push(format!("port={port}"));
        }
        if let Some(dbname) = &self.dbname {
            parts.push(format!("dbname={dbname}"));
        }
        if let Some(socket) = &self.unix_socket {
            parts.push(format!("unix_socket={socket}"));
        }
        format!("{}:{}", self.scheme, parts.join(";"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_builder() {
        let dsn = ConnectionBuilder::new("mysql")
            .host("localhost")
            .port(3306)
            .dbname("mydb")
            .unix_socket("/tmp/mysql.sock")
            .build_connection_string();
        assert_eq!(
            dsn,
            "mysql:host=localhost;port=3306;dbname=mydb;unix_socket=/tmp/mysql.sock"
        );

        let dsn = ConnectionBuilder::new("sqlite").dbname(":memory:").build_connection_string();
        assert_eq!(dsn, "sqlite:dbname=:memory:");
    }

    #[test]
    fn test_parse_round_trip_with_builder() {
        let dsn = ConnectionBuilder::new("mysql")
            .host("db.local")
            .port(3307)
            .dbname("app")
            .build_connection_string();
        let parsed = Dsn::parse(&dsn).unwrap();
        assert_eq!(parsed.scheme, "mysql");
        assert_eq!(parsed.host.as_deref(), Some("db.local"));
        assert_eq!(parsed.port, Some(3307));
        assert_eq!(parsed.dbname.as_deref(), Some("app"));
        assert_eq!(parsed.unix_socket, None);
    }

    #[test]
    fn test_parse_is_lenient_about_keys() {
        let parsed = Dsn::parse("SQLite: DBName = /tmp/x.db ; charset=utf8;junk").unwrap();
        assert_eq!(parsed.scheme, "sqlite");
        assert_eq!(parsed.dbname.as_deref(), Some("/tmp/x.db"));
        assert_eq!(parsed.host, None);
    }

    #[test]
    fn test_parse_failures() {
        assert!(Dsn::parse("no scheme here").is_err());
        assert!(Dsn::parse(":host=x").is_err());
        assert!(Dsn::parse("mysql:port=abc").is_err());
        assert!(Dsn::parse("mysql:port=70000").is_err());
    }

    #[test]
    fn test_connect_params() {
        let parsed = Dsn::parse("mysql:host=h;port=1;dbname=d;unix_socket=s").unwrap();
        let params = parsed.connect_params(Some("root"), None);
        assert_eq!(params.host.as_deref(), Some("h"));
        assert_eq!(params.port, Some(1));
        assert_eq!(params.unix_socket.as_deref(), Some("s"));
        assert_eq!(params.username.as_deref(), Some("root"));
        assert_eq!(params.password, None);
    }
}
