//! Parameter binding
//!
//! Bindings are registered against the placeholders of a [`CompiledQuery`] and
//! resolved, on execute, into one contiguous list of native bind slots plus
//! the matching string of native type codes.

use super::compiler::{CompiledQuery, NAME_MARKER};
use super::error::{DatabaseError, Result};
use super::value::{DatabaseValue, ParamType, BIND_STR};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key of a parameter or output column: a 1-based position or a name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Position(usize),
    Name(String),
}

impl ParamKey {
    /// Named keys gain the `:` marker if the caller left it out
    pub fn normalized(self) -> Self {
        match self {
            ParamKey::Name(name) if !name.starts_with(NAME_MARKER) => {
                ParamKey::Name(format!("{NAME_MARKER}{name}"))
            }
            other => other,
        }
    }
}

impl std::fmt::Display for ParamKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamKey::Position(position) => write!(f, "#{position}"),
            ParamKey::Name(name) => f.write_str(name),
        }
    }
}

impl From<usize> for ParamKey {
    fn from(position: usize) -> Self {
        ParamKey::Position(position)
    }
}

impl From<&str> for ParamKey {
    fn from(name: &str) -> Self {
        ParamKey::Name(name.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(name: String) -> Self {
        ParamKey::Name(name)
    }
}

/// A caller-owned table of variables.
///
/// By-reference parameters read their variable when the statement executes;
/// bound output columns write theirs after each `bound` fetch.
#[derive(Debug, Clone, Default)]
pub struct Variables {
    slots: Arc<Mutex<Vec<DatabaseValue>>>,
}

/// Handle to one variable of a [`Variables`] table
#[derive(Debug, Clone)]
pub struct VarRef {
    slots: Arc<Mutex<Vec<DatabaseValue>>>,
    index: usize,
}

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a new variable holding `initial`
    pub fn declare<V: Into<DatabaseValue>>(&self, initial: V) -> VarRef {
        let mut slots = self.slots.lock();
        slots.push(initial.into());
        VarRef {
            slots: Arc::clone(&self.slots),
            index: slots.len() - 1,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

impl VarRef {
    /// Current value of the variable
    pub fn get(&self) -> DatabaseValue {
        self.slots
            .lock()
            .get(self.index)
            .cloned()
            .unwrap_or_default()
    }

    pub fn set<V: Into<DatabaseValue>>(&self, value: V) {
        if let Some(slot) = self.slots.lock().get_mut(self.index) {
            *slot = value.into();
        }
    }

    /// Index of the variable inside its table
    pub fn index(&self) -> usize {
        self.index
    }
}

/// Where a binding takes its value from
#[derive(Debug, Clone)]
pub enum BindSource {
    /// Captured when registered
    Value(DatabaseValue),
    /// Read when the statement executes
    Var(VarRef),
}

impl BindSource {
    fn resolve(&self) -> DatabaseValue {
        match self {
            BindSource::Value(value) => value.clone(),
            BindSource::Var(var) => var.get(),
        }
    }
}

/// One registered binding
#[derive(Debug, Clone)]
pub struct Binding {
    pub source: BindSource,
    pub param_type: ParamType,
    pub max_len: Option<usize>,
}

impl Binding {
    pub fn by_value(value: DatabaseValue, param_type: ParamType) -> Self {
        Self {
            source: BindSource::Value(value),
            param_type,
            max_len: None,
        }
    }

    pub fn by_ref(var: &VarRef, param_type: ParamType, max_len: Option<usize>) -> Self {
        Self {
            source: BindSource::Var(var.clone()),
            param_type,
            max_len,
        }
    }

    /// Current value after length truncation
    pub fn value(&self) -> DatabaseValue {
        let value = self.source.resolve();
        match self.max_len {
            Some(max_len) => value.truncated(max_len),
            None => value,
        }
    }
}

/// Ad-hoc parameters passed to a single execute call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(ParamKey, DatabaseValue)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Positional values, in order
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<DatabaseValue>,
    {
        Self {
            entries: values
                .into_iter()
                .enumerate()
                .map(|(i, value)| (ParamKey::Position(i + 1), value.into()))
                .collect(),
        }
    }

    /// Named values, with or without the `:` marker
    pub fn named<I, K, V>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<DatabaseValue>,
    {
        Self {
            entries: values
                .into_iter()
                .map(|(name, value)| (ParamKey::Name(name.into()), value.into()))
                .collect(),
        }
    }

    /// Append one value
    pub fn with<K: Into<ParamKey>, V: Into<DatabaseValue>>(mut self, key: K, value: V) -> Self {
        self.entries.push((key.into(), value.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Into<DatabaseValue>> From<Vec<V>> for Params {
    fn from(values: Vec<V>) -> Self {
        Params::positional(values)
    }
}

/// Ordered native bind slots
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundParams {
    /// One native type code per value
    pub types: String,
    pub values: Vec<DatabaseValue>,
}

impl BoundParams {
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Bindings registered on a statement, in registration order
#[derive(Debug, Clone, Default)]
pub struct BindingTable {
    entries: Vec<(ParamKey, Binding)>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a binding after checking that its key addresses the query.
    /// Registering a key again replaces the earlier binding.
    pub fn register(&mut self, query: &CompiledQuery, key: ParamKey, binding: Binding) -> Result<()> {
        let key = key.normalized();
        let addressable = match &key {
            ParamKey::Position(position) => {
                *position >= 1 && query.is_positional_slot(position - 1)
            }
            ParamKey::Name(name) => query.slots_of(name).next().is_some(),
        };
        if !addressable {
            return Err(DatabaseError::logical(format!(
                "Parameter {key} does not match any placeholder"
            )));
        }

        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = binding,
            None => self.entries.push((key, binding)),
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Resolve registered bindings and ad-hoc parameters into native slots.
    ///
    /// Nothing is mutated on failure.
    pub fn resolve(&self, query: &CompiledQuery, ad_hoc: Option<&Params>) -> Result<BoundParams> {
        let mut slots: BTreeMap<usize, (char, DatabaseValue)> = BTreeMap::new();

        for (key, binding) in &self.entries {
            let targets = target_slots(query, key)?;
            let value = binding.value();
            let code = binding.param_type.bind_code();
            for slot in targets {
                slots.insert(slot, (code, value.clone()));
            }
        }

        if let Some(params) = ad_hoc {
            for (key, value) in &params.entries {
                let targets = match key {
                    ParamKey::Position(_) => query
                        .placeholders()
                        .iter()
                        .find(|p| p.is_positional() && !slots.contains_key(&p.index()))
                        .map(|p| vec![p.index()])
                        .ok_or_else(|| {
                            DatabaseError::logical(format!(
                                "No free positional placeholder left for parameter {key}"
                            ))
                        })?,
                    ParamKey::Name(_) => target_slots(query, &key.clone().normalized())?,
                };
                for slot in targets {
                    slots.insert(slot, (BIND_STR, value.clone()));
                }
            }
        }

        let expected = query.len();
        if slots.len() != expected || slots.keys().enumerate().any(|(i, slot)| i != *slot) {
            let missing = (0..expected)
                .find(|slot| !slots.contains_key(slot))
                .unwrap_or(expected);
            return Err(DatabaseError::logical(format!(
                "Placeholder #{} has no bound value ({} of {} bound)",
                missing + 1,
                slots.len(),
                expected
            )));
        }

        let (types, values) = slots.into_values().unzip();
        Ok(BoundParams { types, values })
    }
}

fn target_slots(query: &CompiledQuery, key: &ParamKey) -> Result<Vec<usize>> {
    let slots: Vec<usize> = match key {
        ParamKey::Position(position) if *position >= 1 && *position <= query.len() => {
            vec![position - 1]
        }
        ParamKey::Position(_) => Vec::new(),
        ParamKey::Name(name) => query.slots_of(name).collect(),
    };
    if slots.is_empty() {
        return Err(DatabaseError::logical(format!(
            "Parameter {key} does not match any placeholder"
        )));
    }
    Ok(slots)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::compiler::compile;

    #[test]
    fn test_mixed_positional_and_named() {
        let query = compile("SELECT * FROM t WHERE x = ? AND y = :name");
        let mut table = BindingTable::new();
        table
            .register(&query, ParamKey::Position(1), Binding::by_value(5.into(), ParamType::Int))
            .unwrap();
        table
            .register(&query, "name".into(), Binding::by_value("foo".into(), ParamType::Str))
            .unwrap();

        let bound = table.resolve(&query, None).unwrap();
        assert_eq!(bound.values, vec![DatabaseValue::Int(5), DatabaseValue::from("foo")]);
        assert_eq!(bound.types, "is");
    }

    #[test]
    fn test_types_follow_slot_order() {
        let query = compile("INSERT INTO t VALUES (:a, :b)");
        let mut table = BindingTable::new();
        table
            .register(&query, ":b".into(), Binding::by_value(2.into(), ParamType::Int))
            .unwrap();
        table
            .register(&query, ":a".into(), Binding::by_value("x".into(), ParamType::Str))
            .unwrap();

        let bound = table.resolve(&query, None).unwrap();
        assert_eq!(bound.types, "si");
        assert_eq!(bound.values, vec![DatabaseValue::from("x"), DatabaseValue::Int(2)]);
    }

    #[test]
    fn test_register_rejects_unknown_keys() {
        let query = compile("SELECT * FROM t WHERE x = ? AND y = :name");
        let mut table = BindingTable::new();
        let binding = Binding::by_value(1.into(), ParamType::Int);

        assert!(table.register(&query, ":missing".into(), binding.clone()).is_err());
        // position 2 is a named placeholder
        assert!(table.register(&query, ParamKey::Position(2), binding.clone()).is_err());
        assert!(table.register(&query, ParamKey::Position(0), binding.clone()).is_err());
        assert!(table.register(&query, ParamKey::Position(3), binding).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn test_reregistering_replaces() {
        let query = compile("SELECT ?");
        let mut table = BindingTable::new();
        table
            .register(&query, ParamKey::Position(1), Binding::by_value(1.into(), ParamType::Int))
            .unwrap();
        table
            .register(&query, ParamKey::Position(1), Binding::by_value(2.into(), ParamType::Int))
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.resolve(&query, None).unwrap().values, vec![DatabaseValue::Int(2)]);
    }

    #[test]
    fn test_by_reference_reads_at_resolve_time() {
        let query = compile("SELECT :v");
        let vars = Variables::new();
        let v = vars.declare("before");

        let mut table = BindingTable::new();
        table
            .register(&query, "v".into(), Binding::by_ref(&v, ParamType::Str, Some(3)))
            .unwrap();
        v.set("after");

        let bound = table.resolve(&query, None).unwrap();
        assert_eq!(bound.values, vec![DatabaseValue::from("aft")]);
    }

    #[test]
    fn test_ad_hoc_positional_fills_leftmost_free_slot() {
        let query = compile("SELECT ?, :n, ?");
        let mut table = BindingTable::new();
        table
            .register(&query, ParamKey::Position(1), Binding::by_value(10.into(), ParamType::Int))
            .unwrap();

        let params = Params::new().with(":n", "named").with(1usize, "third");
        let bound = table.resolve(&query, Some(&params)).unwrap();
        assert_eq!(
            bound.values,
            vec![
                DatabaseValue::Int(10),
                DatabaseValue::from("named"),
                DatabaseValue::from("third"),
            ]
        );
        assert_eq!(bound.types, "iss");
    }

    #[test]
    fn test_ad_hoc_only() {
        let query = compile("UPDATE t SET name = :name WHERE id = :id");
        let params = Params::named([("id", DatabaseValue::Int(1)), ("name", "x".into())]);
        let bound = BindingTable::new().resolve(&query, Some(&params)).unwrap();
        assert_eq!(bound.values, vec![DatabaseValue::from("x"), DatabaseValue::Int(1)]);
    }

    #[test]
    fn test_unmatched_ad_hoc_fails() {
        let query = compile("SELECT :a");
        let params = Params::named([("missing", 1)]);
        assert!(BindingTable::new().resolve(&query, Some(&params)).is_err());

        let params = Params::positional([1, 2]);
        let query = compile("SELECT ?");
        assert!(BindingTable::new().resolve(&query, Some(&params)).is_err());
    }

    #[test]
    fn test_gap_fails() {
        let query = compile("SELECT ?, ?");
        let mut table = BindingTable::new();
        table
            .register(&query, ParamKey::Position(2), Binding::by_value(1.into(), ParamType::Int))
            .unwrap();
        let err = table.resolve(&query, None).unwrap_err();
        assert!(err.message().contains("#1"));
    }

    #[test]
    fn test_repeated_name_fills_every_slot() {
        let query = compile("SELECT :v, :v");
        let params = Params::named([(":v", 7)]);
        let bound = BindingTable::new().resolve(&query, Some(&params)).unwrap();
        assert_eq!(bound.values, vec![DatabaseValue::Int(7), DatabaseValue::Int(7)]);
    }

    #[test]
    fn test_no_placeholders_resolves_empty() {
        let query = compile("SELECT 1");
        let bound = BindingTable::new().resolve(&query, None).unwrap();
        assert!(bound.is_empty());
        assert!(bound.types.is_empty());
    }

    #[test]
    fn test_variables() {
        let vars = Variables::new();
        let a = vars.declare(1);
        let b = vars.declare(DatabaseValue::Null);
        assert_eq!(vars.len(), 2);
        assert_eq!(b.index(), 1);
        b.set("x");
        assert_eq!(a.get(), DatabaseValue::Int(1));
        assert_eq!(b.get(), DatabaseValue::from("x"));
    }
}
