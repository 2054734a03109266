//! # Rust Statement Bridge
//!
//! A prepared-statement compatibility layer. It exposes a rich statement and
//! connection API (named and positional placeholders, a dozen fetch styles,
//! transactions, unified error modes) while delegating all I/O to a narrow
//! native driver that only understands `?` markers, positional binds and
//! positional rows.
//!
//! ## Features
//!
//! - **Placeholder compiler**: `:name` and `?` placeholders rewritten to the
//!   native marker, skipping quoted literals
//! - **Parameter binding**: by value or by reference, pre-registered or ad hoc,
//!   resolved to one contiguous slot list
//! - **Fetch styles**: both, assoc, num, column, func, class, obj, into, bound
//! - **Transactions**: depth-counted begin/commit/rollback with an RAII guard
//! - **Error modes**: silent, warning (via `tracing`) or exception, with the
//!   native strictness switched and restored around every call
//! - **Thread Safety**: shared connection state behind `parking_lot` mutexes
//!
//! ## Supported Drivers
//!
//! | Driver | Status | Features |
//! |--------|--------|----------|
//! | SQLite | Implemented | Bundled, buffered and streaming results |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rust_statement_bridge::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let conn = SqliteBridge::open(
//!         "sqlite:dbname=:memory:",
//!         None,
//!         None,
//!         ConnectionOptions::default().with_error_mode(ErrorMode::Exception),
//!     )?;
//!     conn.exec("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//!
//!     if let Some(mut insert) = conn.prepare("INSERT INTO users (name) VALUES (:name)")? {
//!         insert.bind_value("name", "Alice", ParamType::Str)?;
//!         insert.execute(None)?;
//!     }
//!
//!     if let Some(mut select) = conn.query("SELECT id, name FROM users", Some(FetchMode::Assoc))? {
//!         while let Some(row) = select.fetch(None, None)? {
//!             println!("{:?}", row.into_assoc());
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Project Structure
//!
//! ```text
//! rust_statement_bridge/
//! ├── src/
//! │   ├── core/              # Statement pipeline and contracts
//! │   │   ├── compiler.rs    # Placeholder compiler
//! │   │   ├── binder.rs      # Parameter binding
//! │   │   ├── fetch.rs       # Fetch styles and result cursor
//! │   │   ├── transaction.rs # Transaction depth and guard
//! │   │   ├── error_mode.rs  # Error mode translation
//! │   │   ├── statement.rs   # Prepared statement
//! │   │   ├── connection.rs  # Connection
//! │   │   ├── native.rs      # Native driver contract
//! │   │   └── ...
//! │   ├── backends/          # Native driver implementations
//! │   │   └── sqlite.rs
//! │   └── lib.rs
//! ├── tests/                 # Integration and property tests
//! ├── benches/               # Criterion benchmarks
//! └── Cargo.toml
//! ```

/// Core bridge types and traits
pub mod core;

/// Native driver implementations
pub mod backends;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::core::{
        ClassFactory, ColumnMeta, Connection, ConnectionApi, ConnectionBuilder,
        ConnectionOptions, DatabaseError, DatabaseValue, ErrorMode, ExecOutcome, FetchClass,
        FetchMode, FetchStyle, Fetched, Hydrate, ParamKey, ParamType, Params, Record, Result,
        Row, Statement, StatementApi, TransactionGuard, VarRef, Variables,
    };

    #[cfg(feature = "sqlite")]
    pub use crate::backends::SqliteBridge;
}

// Re-export at root level for convenience
pub use self::core::{
    Connection, ConnectionApi, ConnectionOptions, DatabaseError, DatabaseValue, ErrorMode,
    FetchMode, Result, Statement, StatementApi,
};

#[cfg(feature = "sqlite")]
pub use backends::SqliteBridge;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prelude_imports() {
        use prelude::*;

        let options = ConnectionOptions::default();
        assert_eq!(options.error_mode, ErrorMode::Silent);
        assert_eq!(FetchMode::default().style(), FetchStyle::Both);
    }

    #[test]
    fn test_value_conversions() {
        use prelude::*;

        let val: DatabaseValue = 42.into();
        assert_eq!(val.as_int(), Some(42));

        let val: DatabaseValue = "test".into();
        assert_eq!(val.as_str(), Some("test"));

        let val: DatabaseValue = true.into();
        assert_eq!(val.as_bool(), Some(true));
    }
}
