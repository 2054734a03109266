//! Prepared statement
//!
//! Ties the compiled query, the binding table and the active result cursor
//! into one lifecycle. Statements come either from `prepare` (a native
//! statement handle exists, `execute` can run it) or from a direct `query`
//! (only a result is held).

use super::binder::{Binding, BindingTable, ParamKey, Params, VarRef};
use super::compiler::CompiledQuery;
use super::connection::SharedState;
use super::database::StatementApi;
use super::error::{DatabaseError, ErrorInfo, Result};
use super::error_mode::{require, with_statement, ErrorMode};
use super::fetch::{ClassFactory, ColumnBinding, ColumnBindings, FetchMode, Fetched, Hydrate, ResultCursor};
use super::native::{NativeConnection, NativeStatement};
use super::row::ColumnMeta;
use super::value::{DatabaseValue, ParamType};
use std::sync::Arc;

/// A statement bound to a connection
pub struct Statement<C: NativeConnection> {
    shared: SharedState<C>,
    query: CompiledQuery,
    native: Option<C::Statement>,
    bindings: BindingTable,
    outputs: ColumnBindings,
    cursor: Option<ResultCursor<C::Cursor>>,
    fetch_mode: FetchMode,
    row_count: i64,
    last_error: Option<DatabaseError>,
}

fn no_cursor() -> DatabaseError {
    DatabaseError::logical("There is no active result set to fetch from")
}

impl<C: NativeConnection> Statement<C> {
    pub(crate) fn prepared(
        shared: SharedState<C>,
        query: CompiledQuery,
        native: C::Statement,
        fetch_mode: FetchMode,
    ) -> Self {
        Self {
            shared,
            query,
            native: Some(native),
            bindings: BindingTable::new(),
            outputs: ColumnBindings::default(),
            cursor: None,
            fetch_mode,
            row_count: 0,
            last_error: None,
        }
    }

    pub(crate) fn direct(
        shared: SharedState<C>,
        query: CompiledQuery,
        cursor: Option<ResultCursor<C::Cursor>>,
        row_count: i64,
        fetch_mode: FetchMode,
    ) -> Self {
        Self {
            shared,
            query,
            native: None,
            bindings: BindingTable::new(),
            outputs: ColumnBindings::default(),
            cursor,
            fetch_mode,
            row_count,
            last_error: None,
        }
    }

    /// Query text as written by the caller
    pub fn query_string(&self) -> &str {
        self.query.source()
    }

    pub fn compiled(&self) -> &CompiledQuery {
        &self.query
    }

    /// Current default fetch mode
    pub fn fetch_mode(&self) -> &FetchMode {
        &self.fetch_mode
    }

    /// Error mode and buffering of the owning connection
    fn settings(&self) -> (ErrorMode, bool) {
        let state = self.shared.lock();
        (state.options.error_mode, state.options.buffered)
    }

    fn error_mode(&self) -> ErrorMode {
        self.settings().0
    }

    fn run(&mut self, params: Option<&Params>) -> Result<()> {
        let bound = self.bindings.resolve(&self.query, params)?;
        let Some(statement) = self.native.as_mut() else {
            return Err(DatabaseError::logical(
                "Statement was not prepared and cannot be executed",
            ));
        };
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }

        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock();
        let mode = state.options.error_mode;
        let slots = bound.values.len();

        if !bound.is_empty() {
            let types = bound.types;
            let values = bound.values;
            let done = with_statement(mode, &mut state.native, statement, |s| {
                s.bind_param(&types, values)
            })?;
            require(done, "Binding parameters")?;
        }

        let done = with_statement(mode, &mut state.native, statement, |s| s.execute())?;
        require(done, "Execute")?;

        self.row_count = statement.affected_rows();
        self.cursor = statement.result().map(ResultCursor::new);
        tracing::debug!(
            sql = self.query.source(),
            slots,
            rows = self.row_count,
            "statement executed"
        );
        Ok(())
    }

    fn advance(&mut self) -> Result<bool> {
        let Some(statement) = self.native.as_mut() else {
            return Ok(false);
        };
        if !statement.more_results() {
            return Ok(false);
        }
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }

        let shared = Arc::clone(&self.shared);
        let mut state = shared.lock();
        let mode = state.options.error_mode;
        let done = with_statement(mode, &mut state.native, statement, |s| s.next_result())?;
        require(done, "Advancing to the next result set")?;
        self.cursor = statement.result().map(ResultCursor::new);
        Ok(true)
    }

    fn register_column(&mut self, key: ParamKey, binding: ColumnBinding) -> Result<()> {
        let valid = match &key {
            ParamKey::Position(position) => {
                *position >= 1
                    && self
                        .cursor
                        .as_ref()
                        .map_or(true, |cursor| *position <= cursor.column_count())
            }
            ParamKey::Name(name) => !name.is_empty(),
        };
        if !valid {
            return Err(DatabaseError::logical(format!(
                "Column {key} cannot be bound"
            )));
        }
        self.outputs.register(key, binding);
        Ok(())
    }
}

impl<C: NativeConnection> StatementApi for Statement<C> {
    fn execute(&mut self, params: Option<&Params>) -> Result<bool> {
        let mode = self.error_mode();
        let outcome = self.run(params);
        mode.settle_bool(outcome, &mut self.last_error)
    }

    fn fetch(&mut self, mode: Option<FetchMode>, cursor_offset: Option<usize>) -> Result<Option<Fetched>> {
        let (error_mode, buffered) = self.settings();
        let mode = mode.unwrap_or_else(|| self.fetch_mode.clone());
        let outcome = match self.cursor.as_mut() {
            Some(cursor) => {
                if let (Some(offset), true) = (cursor_offset, buffered) {
                    cursor.seek(offset);
                }
                Ok(cursor.fetch(&mode, &self.outputs))
            }
            None => Err(no_cursor()),
        };
        Ok(error_mode.settle(outcome, &mut self.last_error)?.flatten())
    }

    fn fetch_all(&mut self, mode: Option<FetchMode>) -> Result<Option<Vec<Fetched>>> {
        let error_mode = self.error_mode();
        let mode = mode.unwrap_or_else(|| self.fetch_mode.clone());
        let outcome = match self.cursor.as_mut() {
            Some(cursor) => Ok(cursor.fetch_all(&mode, &self.outputs)),
            None => Err(no_cursor()),
        };
        error_mode.settle(outcome, &mut self.last_error)
    }

    fn fetch_column(&mut self, index: usize) -> Result<Option<DatabaseValue>> {
        let fetched = self.fetch(Some(FetchMode::Column(index)), None)?;
        Ok(fetched.and_then(Fetched::into_value))
    }

    fn fetch_object(
        &mut self,
        factory: Option<ClassFactory>,
        ctor_args: Vec<DatabaseValue>,
    ) -> Result<Option<Box<dyn Hydrate>>> {
        let mode = FetchMode::Class {
            factory: factory.unwrap_or_default(),
            ctor_args,
        };
        match self.fetch(Some(mode), None)? {
            Some(Fetched::Object(object)) => Ok(Some(object)),
            _ => Ok(None),
        }
    }

    fn bind_param<K: Into<ParamKey>>(
        &mut self,
        key: K,
        var: &VarRef,
        param_type: ParamType,
        max_len: Option<usize>,
    ) -> Result<bool> {
        let mode = self.error_mode();
        let outcome = self
            .bindings
            .register(&self.query, key.into(), Binding::by_ref(var, param_type, max_len));
        mode.settle_bool(outcome, &mut self.last_error)
    }

    fn bind_value<K: Into<ParamKey>, V: Into<DatabaseValue>>(
        &mut self,
        key: K,
        value: V,
        param_type: ParamType,
    ) -> Result<bool> {
        let mode = self.error_mode();
        let outcome = self
            .bindings
            .register(&self.query, key.into(), Binding::by_value(value.into(), param_type));
        mode.settle_bool(outcome, &mut self.last_error)
    }

    fn bind_column<K: Into<ParamKey>>(
        &mut self,
        key: K,
        var: &VarRef,
        param_type: ParamType,
        max_len: Option<usize>,
    ) -> Result<bool> {
        let mode = self.error_mode();
        let binding = ColumnBinding {
            var: var.clone(),
            param_type,
            max_len,
        };
        let outcome = self.register_column(key.into(), binding);
        mode.settle_bool(outcome, &mut self.last_error)
    }

    fn row_count(&self) -> i64 {
        self.row_count
    }

    fn column_count(&self) -> usize {
        self.cursor.as_ref().map_or(0, ResultCursor::column_count)
    }

    fn column_meta(&self, index: usize) -> Option<ColumnMeta> {
        self.cursor.as_ref()?.column_meta(index)
    }

    fn set_fetch_mode(&mut self, mode: FetchMode) -> Result<bool> {
        self.fetch_mode = mode;
        Ok(true)
    }

    fn next_rowset(&mut self) -> Result<bool> {
        let mode = self.error_mode();
        let outcome = self.advance();
        Ok(mode.settle(outcome, &mut self.last_error)?.unwrap_or(false))
    }

    fn close_cursor(&mut self) -> bool {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
        true
    }

    fn error_code(&self) -> i32 {
        self.last_error.as_ref().map_or(0, DatabaseError::code)
    }

    fn error_info(&self) -> ErrorInfo {
        self.last_error
            .as_ref()
            .map(ErrorInfo::from)
            .unwrap_or_default()
    }
}

impl<C: NativeConnection> Drop for Statement<C> {
    fn drop(&mut self) {
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
        if let Some(mut native) = self.native.take() {
            native.close();
        }
    }
}

impl<C: NativeConnection> std::fmt::Debug for Statement<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("query", &self.query.source())
            .field("prepared", &self.native.is_some())
            .field("bindings", &self.bindings.len())
            .field("fetch_mode", &self.fetch_mode)
            .field("row_count", &self.row_count)
            .finish()
    }
}
