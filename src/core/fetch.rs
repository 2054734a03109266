//! Fetch styles and row materialization
//!
//! Every fetch style is emulated on top of one native cursor that only knows
//! how to hand out positional rows. [`FetchMode`] is the per-call (or
//! per-statement default) style with the payload that style needs.

use super::binder::{ParamKey, VarRef};
use super::error::{DatabaseError, Result};
use super::native::NativeCursor;
use super::row::{ColumnMeta, DatabaseRow, Row};
use super::value::{DatabaseValue, ParamType};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;

/// Payload-free name of a fetch style, usable in configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStyle {
    #[default]
    Both,
    Assoc,
    Num,
    Column,
    Func,
    Class,
    Obj,
    Into,
    Bound,
}

impl FetchStyle {
    /// Whether the style returns a plain row container
    pub fn is_plain_row(self) -> bool {
        matches!(self, FetchStyle::Both | FetchStyle::Assoc | FetchStyle::Num)
    }

    pub fn to_str(self) -> &'static str {
        match self {
            FetchStyle::Both => "both",
            FetchStyle::Assoc => "assoc",
            FetchStyle::Num => "num",
            FetchStyle::Column => "column",
            FetchStyle::Func => "func",
            FetchStyle::Class => "class",
            FetchStyle::Obj => "obj",
            FetchStyle::Into => "into",
            FetchStyle::Bound => "bound",
        }
    }
}

impl std::fmt::Display for FetchStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_str())
    }
}

/// Object-safe access to `Any`, implemented for every hydratable type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any>;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any> {
        self
    }
}

/// A type whose fields can be populated from a fetched row
pub trait Hydrate: AsAny + Send {
    /// Whether the type exposes a field with this name
    fn has_field(&self, name: &str) -> bool;

    /// Assign a field; returns `false` when the field does not exist
    fn set_field(&mut self, name: &str, value: DatabaseValue) -> bool;
}

/// A type the `class` style can construct
pub trait FetchClass: Hydrate + Sized {
    /// Construct an instance, receiving the caller-supplied constructor arguments
    fn construct(ctor_args: &[DatabaseValue]) -> Self;
}

/// The generic object type: accepts every column as a field, in column order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, DatabaseValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&DatabaseValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> &[(String, DatabaseValue)] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl Hydrate for Record {
    fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| field == name)
    }

    fn set_field(&mut self, name: &str, value: DatabaseValue) -> bool {
        match self.fields.iter_mut().find(|(field, _)| field == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
        true
    }
}

impl FetchClass for Record {
    fn construct(_ctor_args: &[DatabaseValue]) -> Self {
        Record::default()
    }
}

/// Type-erased constructor used by [`FetchMode::Class`]
#[derive(Clone)]
pub struct ClassFactory {
    name: &'static str,
    construct: Arc<dyn Fn(&[DatabaseValue]) -> Box<dyn Hydrate> + Send + Sync>,
}

impl ClassFactory {
    /// Factory for a concrete type
    pub fn of<T: FetchClass>() -> Self {
        Self {
            name: std::any::type_name::<T>(),
            construct: Arc::new(|args| Box::new(T::construct(args))),
        }
    }

    /// Name of the constructed type
    pub fn name(&self) -> &'static str {
        self.name
    }

    fn build(&self, ctor_args: &[DatabaseValue]) -> Box<dyn Hydrate> {
        (self.construct)(ctor_args)
    }
}

impl Default for ClassFactory {
    fn default() -> Self {
        Self::of::<Record>()
    }
}

impl std::fmt::Debug for ClassFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ClassFactory").field(&self.name).finish()
    }
}

/// Function applied to each row by the `func` style
pub type RowFn = Arc<dyn Fn(&Row) -> DatabaseValue + Send + Sync>;

/// Caller-owned object updated by the `into` style
pub type IntoTarget = Arc<Mutex<dyn Hydrate>>;

/// A fetch style together with its payload
#[derive(Clone, Default)]
pub enum FetchMode {
    /// Combined container, addressable by index and name
    #[default]
    Both,
    /// Name-keyed container
    Assoc,
    /// Index-keyed container
    Num,
    /// One value at a 0-based column index
    Column(usize),
    /// The result of a function applied to the combined row
    Func(RowFn),
    /// A new instance of a type, built with constructor arguments
    Class {
        factory: ClassFactory,
        ctor_args: Vec<DatabaseValue>,
    },
    /// A new generic [`Record`]
    Obj,
    /// Copy matching columns onto an existing object
    Into(IntoTarget),
    /// Copy columns into the variables registered with `bind_column`
    Bound,
}

impl FetchMode {
    /// `class` style for a concrete type
    pub fn class<T: FetchClass>(ctor_args: Vec<DatabaseValue>) -> Self {
        FetchMode::Class {
            factory: ClassFactory::of::<T>(),
            ctor_args,
        }
    }

    /// `func` style from a closure
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Row) -> DatabaseValue + Send + Sync + 'static,
    {
        FetchMode::Func(Arc::new(f))
    }

    /// `into` style targeting a shared object
    pub fn into_target<T: Hydrate>(target: &Arc<Mutex<T>>) -> Self {
        let target: IntoTarget = Arc::clone(target) as Arc<Mutex<dyn Hydrate>>;
        FetchMode::Into(target)
    }

    pub fn style(&self) -> FetchStyle {
        match self {
            FetchMode::Both => FetchStyle::Both,
            FetchMode::Assoc => FetchStyle::Assoc,
            FetchMode::Num => FetchStyle::Num,
            FetchMode::Column(_) => FetchStyle::Column,
            FetchMode::Func(_) => FetchStyle::Func,
            FetchMode::Class { .. } => FetchStyle::Class,
            FetchMode::Obj => FetchStyle::Obj,
            FetchMode::Into(_) => FetchStyle::Into,
            FetchMode::Bound => FetchStyle::Bound,
        }
    }
}

impl TryFrom<FetchStyle> for FetchMode {
    type Error = DatabaseError;

    /// Styles whose payload has a natural default convert; `func` and `into`
    /// need a caller-supplied payload and are rejected.
    fn try_from(style: FetchStyle) -> Result<Self> {
        match style {
            FetchStyle::Both => Ok(FetchMode::Both),
            FetchStyle::Assoc => Ok(FetchMode::Assoc),
            FetchStyle::Num => Ok(FetchMode::Num),
            FetchStyle::Column => Ok(FetchMode::Column(0)),
            FetchStyle::Class => Ok(FetchMode::Class {
                factory: ClassFactory::default(),
                ctor_args: Vec::new(),
            }),
            FetchStyle::Obj => Ok(FetchMode::Obj),
            FetchStyle::Bound => Ok(FetchMode::Bound),
            FetchStyle::Func | FetchStyle::Into => Err(DatabaseError::invalid_config(format!(
                "fetch style '{style}' needs a payload and cannot be a configured default"
            ))),
        }
    }
}

impl std::fmt::Debug for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchMode::Column(index) => f.debug_tuple("Column").field(index).finish(),
            FetchMode::Class { factory, ctor_args } => f
                .debug_struct("Class")
                .field("factory", factory)
                .field("ctor_args", ctor_args)
                .finish(),
            other => f.write_str(other.style().to_str()),
        }
    }
}

/// One materialized fetch result
pub enum Fetched {
    /// `both`
    Row(Row),
    /// `assoc`
    Assoc(DatabaseRow),
    /// `num`
    Num(Vec<DatabaseValue>),
    /// `column` and `func`
    Value(DatabaseValue),
    /// `class` and `obj`
    Object(Box<dyn Hydrate>),
    /// `into` and `bound`: the row was applied to caller-owned state
    Applied,
}

impl Fetched {
    pub fn into_row(self) -> Option<Row> {
        match self {
            Fetched::Row(row) => Some(row),
            _ => None,
        }
    }

    pub fn into_assoc(self) -> Option<DatabaseRow> {
        match self {
            Fetched::Assoc(row) => Some(row),
            Fetched::Row(row) => Some(row.into_assoc()),
            _ => None,
        }
    }

    pub fn into_values(self) -> Option<Vec<DatabaseValue>> {
        match self {
            Fetched::Num(values) => Some(values),
            Fetched::Row(row) => Some(row.into_values()),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<DatabaseValue> {
        match self {
            Fetched::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Downcast an object result to its concrete type
    pub fn into_object<T: Hydrate>(self) -> Option<T> {
        match self {
            Fetched::Object(object) => object.into_any().downcast::<T>().ok().map(|b| *b),
            _ => None,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Fetched::Applied)
    }
}

impl std::fmt::Debug for Fetched {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Fetched::Row(row) => f.debug_tuple("Row").field(row).finish(),
            Fetched::Assoc(row) => f.debug_tuple("Assoc").field(row).finish(),
            Fetched::Num(values) => f.debug_tuple("Num").field(values).finish(),
            Fetched::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Fetched::Object(_) => f.write_str("Object(..)"),
            Fetched::Applied => f.write_str("Applied"),
        }
    }
}

/// An output column registered with `bind_column`
#[derive(Debug, Clone)]
pub struct ColumnBinding {
    pub var: VarRef,
    pub param_type: ParamType,
    pub max_len: Option<usize>,
}

/// Output columns, keyed by 1-based column position or column name
#[derive(Debug, Clone, Default)]
pub struct ColumnBindings {
    entries: Vec<(ParamKey, ColumnBinding)>,
}

impl ColumnBindings {
    pub fn register(&mut self, key: ParamKey, binding: ColumnBinding) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = binding,
            None => self.entries.push((key, binding)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the bound columns of `row` into their variables
    fn apply(&self, row: &Row) {
        for (key, binding) in &self.entries {
            let value = match key {
                ParamKey::Position(position) => position
                    .checked_sub(1)
                    .and_then(|index| row.get(index))
                    .cloned(),
                ParamKey::Name(name) => row.get_by_name(name).cloned(),
            }
            .unwrap_or_default();
            let value = match binding.max_len {
                Some(max_len) => value.truncated(max_len),
                None => value,
            };
            binding.var.set(value.coerce(binding.param_type));
        }
    }
}

/// The active result of a statement
pub struct ResultCursor<R: NativeCursor> {
    native: R,
    columns: Arc<[String]>,
    closed: bool,
}

impl<R: NativeCursor> ResultCursor<R> {
    pub fn new(native: R) -> Self {
        let columns: Arc<[String]> = native
            .fields()
            .iter()
            .map(|field| field.name.clone())
            .collect();
        Self {
            native,
            columns,
            closed: false,
        }
    }

    /// Whether every row is held client-side
    pub fn is_buffered(&self) -> bool {
        self.native.is_buffered()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_meta(&self, index: usize) -> Option<ColumnMeta> {
        self.native.fields().get(index).map(ColumnMeta::from)
    }

    /// Total row count, when the cursor is buffered
    pub fn num_rows(&self) -> Option<usize> {
        self.native.num_rows()
    }

    /// Position at an absolute row; streaming cursors cannot seek
    pub fn seek(&mut self, offset: usize) -> bool {
        self.is_buffered() && self.native.data_seek(offset)
    }

    fn next_row(&mut self) -> Option<Row> {
        if self.closed {
            return None;
        }
        self.native
            .fetch_row()
            .map(|values| Row::new(Arc::clone(&self.columns), values))
    }

    /// Materialize the next row in the given style; `None` at end of data
    pub fn fetch(&mut self, mode: &FetchMode, outputs: &ColumnBindings) -> Option<Fetched> {
        let row = self.next_row()?;
        let fetched = match mode {
            FetchMode::Both => Fetched::Row(row),
            FetchMode::Assoc => Fetched::Assoc(row.into_assoc()),
            FetchMode::Num => Fetched::Num(row.into_values()),
            FetchMode::Column(index) => {
                Fetched::Value(row.get(*index).cloned().unwrap_or_default())
            }
            FetchMode::Func(f) => Fetched::Value(f(&row)),
            FetchMode::Class { factory, ctor_args } => {
                let mut object = factory.build(ctor_args);
                for (name, value) in row.iter() {
                    object.set_field(name, value.clone());
                }
                Fetched::Object(object)
            }
            FetchMode::Obj => {
                let mut record = Record::new();
                for (name, value) in row.iter() {
                    record.set_field(name, value.clone());
                }
                Fetched::Object(Box::new(record))
            }
            FetchMode::Into(target) => {
                let mut target = target.lock();
                for (name, value) in row.into_assoc() {
                    if target.has_field(&name) {
                        target.set_field(&name, value);
                    }
                }
                Fetched::Applied
            }
            FetchMode::Bound => {
                outputs.apply(&row);
                Fetched::Applied
            }
        };
        Some(fetched)
    }

    /// Materialize every remaining row.
    ///
    /// Buffered cursors in a plain row style are drained with one bulk call;
    /// everything else loops single-row fetches.
    pub fn fetch_all(&mut self, mode: &FetchMode, outputs: &ColumnBindings) -> Vec<Fetched> {
        if self.closed {
            return Vec::new();
        }
        if self.is_buffered() && mode.style().is_plain_row() {
            return self
                .native
                .fetch_all()
                .into_iter()
                .map(|values| {
                    let row = Row::new(Arc::clone(&self.columns), values);
                    match mode {
                        FetchMode::Assoc => Fetched::Assoc(row.into_assoc()),
                        FetchMode::Num => Fetched::Num(row.into_values()),
                        _ => Fetched::Row(row),
                    }
                })
                .collect();
        }
        std::iter::from_fn(|| self.fetch(mode, outputs)).collect()
    }

    /// Release the native result; safe to call more than once
    pub fn close(&mut self) {
        if !self.closed {
            self.native.close();
            self.closed = true;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl<R: NativeCursor> Drop for ResultCursor<R> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::binder::Variables;
    use crate::core::native::NativeField;

    /// In-memory cursor over fixed rows
    struct VecCursor {
        fields: Vec<NativeField>,
        rows: Vec<Vec<DatabaseValue>>,
        position: usize,
        buffered: bool,
        bulk_calls: usize,
    }

    impl VecCursor {
        fn new(buffered: bool) -> Self {
            let field = |name: &str| NativeField {
                name: name.to_string(),
                orgname: name.to_string(),
                ..Default::default()
            };
            Self {
                fields: vec![field("id"), field("name")],
                rows: vec![
                    vec![DatabaseValue::Int(1), DatabaseValue::from("Alice")],
                    vec![DatabaseValue::Int(2), DatabaseValue::from("Bob")],
                ],
                position: 0,
                buffered,
                bulk_calls: 0,
            }
        }
    }

    impl NativeCursor for VecCursor {
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
            if offset < self.rows.len() {
                self.position = offset;
                true
            } else {
                false
            }
        }

        fn fetch_row(&mut self) -> Option<Vec<DatabaseValue>> {
            let row = self.rows.get(self.position).cloned()?;
            self.position += 1;
            Some(row)
        }

        fn fetch_all(&mut self) -> Vec<Vec<DatabaseValue>> {
            self.bulk_calls += 1;
            let rest = self.rows[self.position..].to_vec();
            self.position = self.rows.len();
            rest
        }

        fn close(&mut self) {}
    }

    #[derive(Debug, Default)]
    struct User {
        id: i64,
        name: String,
        greeting: String,
    }

    impl Hydrate for User {
        fn has_field(&self, name: &str) -> bool {
            matches!(name, "id" | "name")
        }

        fn set_field(&mut self, name: &str, value: DatabaseValue) -> bool {
            match name {
                "id" => self.id = value.to_int_lossy(),
                "name" => self.name = value.to_text(),
                _ => return false,
            }
            true
        }
    }

    impl FetchClass for User {
        fn construct(ctor_args: &[DatabaseValue]) -> Self {
            User {
                greeting: ctor_args.first().map(|v| v.to_text()).unwrap_or_default(),
                ..Default::default()
            }
        }
    }

    fn cursor() -> ResultCursor<VecCursor> {
        ResultCursor::new(VecCursor::new(true))
    }

    #[test]
    fn test_plain_styles() {
        let outputs = ColumnBindings::default();
        let mut cursor = cursor();

        let row = cursor.fetch(&FetchMode::Both, &outputs).unwrap().into_row().unwrap();
        assert_eq!(row.get(0), Some(&DatabaseValue::Int(1)));
        assert_eq!(row.get_by_name("name"), Some(&DatabaseValue::from("Alice")));

        let assoc = cursor.fetch(&FetchMode::Assoc, &outputs).unwrap().into_assoc().unwrap();
        assert_eq!(assoc.get("name"), Some(&DatabaseValue::from("Bob")));

        assert!(cursor.fetch(&FetchMode::Num, &outputs).is_none());
    }

    #[test]
    fn test_column_style() {
        let outputs = ColumnBindings::default();
        let mut cursor = cursor();
        let value = cursor.fetch(&FetchMode::Column(1), &outputs).unwrap();
        assert_eq!(value.into_value(), Some(DatabaseValue::from("Alice")));
        let value = cursor.fetch(&FetchMode::Column(9), &outputs).unwrap();
        assert_eq!(value.into_value(), Some(DatabaseValue::Null));
        assert!(cursor.fetch(&FetchMode::Column(0), &outputs).is_none());
    }

    #[test]
    fn test_func_style() {
        let mode = FetchMode::func(|row| {
            DatabaseValue::from(format!("{}:{}", row.values()[0], row.values()[1]))
        });
        let value = cursor().fetch(&mode, &ColumnBindings::default()).unwrap();
        assert_eq!(value.into_value(), Some(DatabaseValue::from("1:Alice")));
    }

    #[test]
    fn test_class_and_obj_styles() {
        let outputs = ColumnBindings::default();
        let mut cursor = cursor();

        let mode = FetchMode::class::<User>(vec!["hello".into()]);
        let user: User = cursor.fetch(&mode, &outputs).unwrap().into_object().unwrap();
        assert_eq!(user.id, 1);
        assert_eq!(user.name, "Alice");
        assert_eq!(user.greeting, "hello");

        let record: Record = cursor.fetch(&FetchMode::Obj, &outputs).unwrap().into_object().unwrap();
        assert_eq!(record.get("name"), Some(&DatabaseValue::from("Bob")));
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_into_style_copies_matching_fields_only() {
        let mut existing = Record::new();
        existing.set_field("name", DatabaseValue::Null);
        let target = Arc::new(Mutex::new(existing));

        let fetched = cursor()
            .fetch(&FetchMode::into_target(&target), &ColumnBindings::default())
            .unwrap();
        assert!(fetched.is_applied());

        let record = target.lock();
        assert_eq!(record.get("name"), Some(&DatabaseValue::from("Alice")));
        assert_eq!(record.get("id"), None);
    }

    #[test]
    fn test_bound_style() {
        let vars = Variables::new();
        let id = vars.declare(DatabaseValue::Null);
        let name = vars.declare(DatabaseValue::Null);

        let mut outputs = ColumnBindings::default();
        outputs.register(
            ParamKey::Position(1),
            ColumnBinding {
                var: id.clone(),
                param_type: ParamType::Str,
                max_len: None,
            },
        );
        outputs.register(
            ParamKey::Name("name".to_string()),
            ColumnBinding {
                var: name.clone(),
                param_type: ParamType::Str,
                max_len: Some(3),
            },
        );

        let mut cursor = cursor();
        assert!(cursor.fetch(&FetchMode::Bound, &outputs).unwrap().is_applied());
        assert_eq!(id.get(), DatabaseValue::from("1"));
        assert_eq!(name.get(), DatabaseValue::from("Ali"));

        assert!(cursor.fetch(&FetchMode::Bound, &outputs).unwrap().is_applied());
        assert_eq!(name.get(), DatabaseValue::from("Bob"));
    }

    #[test]
    fn test_fetch_all_bulk_matches_single_fetches() {
        let outputs = ColumnBindings::default();

        let mut bulk = cursor();
        let all = bulk.fetch_all(&FetchMode::Num, &outputs);
        assert_eq!(bulk.native.bulk_calls, 1);

        let mut single = cursor();
        let looped: Vec<_> = std::iter::from_fn(|| single.fetch(&FetchMode::Num, &outputs))
            .map(|f| f.into_values().unwrap())
            .collect();

        let all: Vec<_> = all.into_iter().map(|f| f.into_values().unwrap()).collect();
        assert_eq!(all, looped);
    }

    #[test]
    fn test_fetch_all_streaming_loops() {
        let mut cursor = ResultCursor::new(VecCursor::new(false));
        let rows = cursor.fetch_all(&FetchMode::Both, &ColumnBindings::default());
        assert_eq!(rows.len(), 2);
        assert_eq!(cursor.native.bulk_calls, 0);
        assert!(!cursor.seek(0));
    }

    #[test]
    fn test_seek_and_close() {
        let outputs = ColumnBindings::default();
        let mut cursor = cursor();
        assert!(cursor.seek(1));
        let value = cursor.fetch(&FetchMode::Column(0), &outputs).unwrap();
        assert_eq!(value.into_value(), Some(DatabaseValue::Int(2)));

        cursor.close();
        cursor.close();
        assert!(cursor.is_closed());
        assert!(cursor.fetch(&FetchMode::Both, &outputs).is_none());
    }

    #[test]
    fn test_style_conversion() {
        assert!(matches!(FetchMode::try_from(FetchStyle::Column), Ok(FetchMode::Column(0))));
        assert!(FetchMode::try_from(FetchStyle::Func).is_err());
        assert!(FetchMode::try_from(FetchStyle::Into).is_err());
        assert_eq!(FetchMode::default().style(), FetchStyle::Both);
        assert!(FetchStyle::Assoc.is_plain_row());
        assert!(!FetchStyle::Bound.is_plain_row());
    }
}
