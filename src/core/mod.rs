//! Core bridge types and traits
//!
//! This module provides the statement pipeline (placeholder compiler,
//! parameter binder, result materializer), the transaction controller, the
//! error-mode translator and the connection/statement types built on them.

pub mod attributes;
pub mod binder;
pub mod compiler;
pub mod connection;
pub mod database;
pub mod error;
pub mod error_mode;
pub mod fetch;
pub mod native;
pub mod row;
pub mod statement;
pub mod transaction;
pub mod value;

// Re-export commonly used types
pub use attributes::{Attribute, AttributeKind, ConnectionOptions};
pub use binder::{ParamKey, Params, VarRef, Variables};
pub use compiler::{compile, CompiledQuery, Placeholder};
pub use connection::Connection;
pub use database::{ConnectionApi, ConnectionBuilder, Dsn, ExecOutcome, StatementApi};
pub use error::{DatabaseError, ErrorInfo, Result};
pub use error_mode::ErrorMode;
pub use fetch::{ClassFactory, FetchClass, FetchMode, FetchStyle, Fetched, Hydrate, Record};
pub use native::{NativeConnection, NativeCursor, NativeError, NativeStatement, ReportMode};
pub use row::{ColumnMeta, DatabaseRow, Row};
pub use statement::Statement;
pub use transaction::TransactionGuard;
pub use value::{DatabaseValue, ParamType};
