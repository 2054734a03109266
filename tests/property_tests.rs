//! Property-based tests for the placeholder compiler, parameter binding and
//! value coercions using proptest

use proptest::prelude::*;
use rust_statement_bridge::core::binder::BindingTable;
use rust_statement_bridge::core::compile;
use rust_statement_bridge::prelude::*;

/// Query text that cannot contain a placeholder or open a literal
fn plain_text() -> impl Strategy<Value = String> {
    "[A-Za-z0-9_ ,=()*<>.]{0,24}"
}

/// Either a positional marker or a named placeholder
fn placeholder() -> impl Strategy<Value = String> {
    prop_oneof![Just("?".to_string()), "[a-z_][a-z0-9_]{0,8}".prop_map(|n| format!(":{n}"))]
}

/// Text and placeholders interleaved; each text piece ends in a separator
/// so a named placeholder never runs into the following text
fn query_parts() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec((plain_text(), placeholder()), 0..8)
}

fn assemble(parts: &[(String, String)], tail: &str) -> String {
    let mut sql = String::new();
    for (text, token) in parts {
        sql.push_str(text);
        sql.push(' ');
        sql.push_str(token);
        sql.push(' ');
    }
    sql.push_str(tail);
    sql
}

// ============================================================================
// Compiler
// ============================================================================

proptest! {
    /// A query without placeholders is returned unchanged
    #[test]
    fn test_no_placeholders_is_identity(sql in plain_text()) {
        let query = compile(&sql);
        prop_assert!(query.is_empty());
        prop_assert_eq!(query.native(), sql.as_str());
        prop_assert_eq!(query.source(), sql.as_str());
    }

    /// Every placeholder becomes exactly one native marker, in order
    #[test]
    fn test_placeholders_rewritten_in_order(parts in query_parts(), tail in plain_text()) {
        let sql = assemble(&parts, &tail);
        let query = compile(&sql);

        prop_assert_eq!(query.len(), parts.len());
        prop_assert_eq!(query.native().matches('?').count(), parts.len());
        for (index, ((_, token), placeholder)) in parts.iter().zip(query.placeholders()).enumerate() {
            prop_assert_eq!(placeholder.token(), token.as_str());
            prop_assert_eq!(placeholder.index(), index);
            prop_assert_eq!(placeholder.is_positional(), token == "?");
        }

        let expected: Vec<(String, String)> = parts
            .iter()
            .map(|(text, _)| (text.clone(), "?".to_string()))
            .collect();
        prop_assert_eq!(query.native(), assemble(&expected, &tail));
    }

    /// Literal text is copied verbatim and never scanned for placeholders
    #[test]
    fn test_literals_preserved(content in "[^'\\\\]{0,32}", name in "[a-z][a-z0-9_]{0,8}") {
        let sql = format!("SELECT '{content}' FROM t WHERE x = :{name}");
        let query = compile(&sql);

        prop_assert_eq!(query.len(), 1);
        prop_assert_eq!(query.placeholders()[0].name(), Some(name.as_str()));
        let expected_native = format!("SELECT '{}' FROM t WHERE x = ?", content);
        prop_assert_eq!(query.native(), expected_native.as_str());
    }

    /// A repeated name addresses each of its slots
    #[test]
    fn test_repeated_name_slots(count in 1usize..6, name in "[a-z][a-z0-9_]{0,8}") {
        let sql = vec![format!(":{name}"); count].join(" + ");
        let query = compile(&sql);
        let token = format!(":{name}");
        prop_assert_eq!(query.slots_of(&token).count(), count);
    }
}

// ============================================================================
// Binding
// ============================================================================

proptest! {
    /// Ad-hoc positional values fill the slots left to right as strings
    #[test]
    fn test_ad_hoc_positional_resolution(values in prop::collection::vec(any::<i64>(), 1..8)) {
        let sql = vec!["?"; values.len()].join(", ");
        let query = compile(&format!("SELECT {sql}"));
        let params = Params::positional(values.clone());

        let bound = BindingTable::new().resolve(&query, Some(&params)).unwrap();
        prop_assert_eq!(bound.types, "s".repeat(values.len()));
        let expected: Vec<DatabaseValue> = values.into_iter().map(DatabaseValue::from).collect();
        prop_assert_eq!(bound.values, expected);
    }

    /// Resolution fails whenever fewer values than slots are supplied
    #[test]
    fn test_short_parameter_list_rejected(slots in 2usize..8, supplied in 0usize..8) {
        prop_assume!(supplied < slots);
        let sql = vec!["?"; slots].join(", ");
        let query = compile(&format!("SELECT {sql}"));
        let params = Params::positional(vec![0; supplied]);
        prop_assert!(BindingTable::new().resolve(&query, Some(&params)).is_err());
    }
}

// ============================================================================
// Value coercions
// ============================================================================

proptest! {
    /// Integer strings parse back to the same integer
    #[test]
    fn test_int_string_lossy(value in (i64::MIN + 1)..=i64::MAX) {
        prop_assert_eq!(DatabaseValue::from(value.to_string()).to_int_lossy(), value);
        prop_assert_eq!(DatabaseValue::from(format!("{value}.75abc")).to_int_lossy(), value);
    }

    /// Integers are truthy exactly when non-zero, strings of them likewise
    #[test]
    fn test_int_truthiness(value in any::<i64>()) {
        prop_assert_eq!(DatabaseValue::Int(value).is_truthy(), value != 0);
        prop_assert_eq!(DatabaseValue::from(value.to_string()).is_truthy(), value != 0);
    }

    /// Truncation never exceeds the limit and keeps a prefix of the text
    #[test]
    fn test_truncation_bounds(text in "\\PC{0,40}", max_len in 0usize..50) {
        let truncated = DatabaseValue::from(text.clone()).truncated(max_len).to_text();
        prop_assert!(truncated.chars().count() <= max_len);
        prop_assert!(text.starts_with(&truncated));
    }

    /// Coercion to a declared type always yields that type
    #[test]
    fn test_coerce_types(value in any::<i64>(), text in "[a-z0-9]{0,10}") {
        for source in [DatabaseValue::Int(value), DatabaseValue::from(text.as_str())] {
            prop_assert_eq!(source.coerce(ParamType::Int).type_name(), "int");
            prop_assert_eq!(source.coerce(ParamType::Bool).type_name(), "bool");
            prop_assert_eq!(source.coerce(ParamType::Str).type_name(), "string");
            prop_assert!(source.coerce(ParamType::Null).is_null());
        }
    }

    /// Quoting a string as an integer takes its leading digits
    #[test]
    fn test_quote_like_int_prefix(value in 0i64..1_000_000, fraction in "[0-9]{1,4}") {
        let text = format!("{value}.{fraction}");
        prop_assert_eq!(DatabaseValue::from(text).to_int_lossy(), value);
    }
}
