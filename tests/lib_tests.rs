//! Pure-helper tests: key ordering, JSON field round-trip, change detection,
//! and the SQL fragment builders. No storage involved.

use serde_json::{Value, json};
use sqlmirror::query::{self, ColumnSpec, Limit, OrderDir, WhereSpec};
use sqlmirror::types::{
    Key, Row, decode_field, encode_field, intersect_keys, row_changed, trunc7,
};
use sqlmirror::{ColumnPolicy, StorageType, StoreError, TableSchema};

fn row(pairs: &[(&str, Value)]) -> Row {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
}

// --- Key ---

#[test]
fn test_key_from_value() {
    assert_eq!(Key::from_value(&json!(5)), Some(Key::Int(5)));
    assert_eq!(Key::from_value(&json!("a")), Some(Key::Text("a".into())));
    assert_eq!(Key::from_value(&json!(true)), Some(Key::Int(1)));
    assert_eq!(Key::from_value(&json!(2.5)), Some(Key::Real(2.5)));
    assert_eq!(Key::from_value(&Value::Null), None);
    assert_eq!(Key::from_value(&json!({"a": 1})), None);
    assert_eq!(Key::from_value(&json!([1])), None);
}

#[test]
fn test_key_ordering_within_type() {
    let mut keys = vec![Key::Text("b".into()), Key::Text("a".into()), Key::Text("c".into())];
    keys.sort();
    assert_eq!(
        keys,
        vec![Key::Text("a".into()), Key::Text("b".into()), Key::Text("c".into())]
    );

    let mut ints = vec![Key::Int(3), Key::Int(-1), Key::Int(2)];
    ints.sort();
    assert_eq!(ints, vec![Key::Int(-1), Key::Int(2), Key::Int(3)]);
}

#[test]
fn test_key_ordering_across_types() {
    let mut keys = vec![Key::Text("a".into()), Key::Int(9), Key::Real(1.5)];
    keys.sort();
    assert_eq!(keys, vec![Key::Int(9), Key::Real(1.5), Key::Text("a".into())]);
}

// --- JSON field encode/decode ---

#[test]
fn test_decode_field_object_and_array() {
    assert_eq!(
        decode_field(json!("{\"a\": 1}")),
        json!({"a": 1})
    );
    assert_eq!(decode_field(json!("[1, 2, 3]")), json!([1, 2, 3]));
    assert_eq!(decode_field(json!("  {\"a\": 1} ")), json!({"a": 1}));
}

#[test]
fn test_decode_field_malformed_stays_opaque() {
    assert_eq!(decode_field(json!("{not json}")), json!("{not json}"));
    assert_eq!(decode_field(json!("[1, 2")), json!("[1, 2"));
}

#[test]
fn test_decode_field_plain_values_pass_through() {
    assert_eq!(decode_field(json!("hello")), json!("hello"));
    assert_eq!(decode_field(json!(42)), json!(42));
    assert_eq!(decode_field(Value::Null), Value::Null);
}

#[test]
fn test_encode_field_round_trip() {
    let cases = [json!({"a": [1, 2], "b": {"c": "d"}}), json!([1, "x", null])];
    for v in &cases {
        assert_eq!(decode_field(encode_field(v)), *v);
    }
    // scalars are untouched
    assert_eq!(encode_field(&json!(7)), json!(7));
    assert_eq!(encode_field(&json!("s")), json!("s"));
}

// --- change detection ---

#[test]
fn test_row_changed_detects_differing_field() {
    let old = row(&[("k", json!("a")), ("v", json!(1))]);
    let new = row(&[("k", json!("a")), ("v", json!(2))]);
    assert!(row_changed(&old, &new));
}

#[test]
fn test_row_changed_identical_rows() {
    let old = row(&[("k", json!("a")), ("v", json!(1))]);
    assert!(!row_changed(&old, &old.clone()));
}

#[test]
fn test_row_changed_is_asymmetric() {
    // fields only the old row has are ignored
    let old = row(&[("k", json!("a")), ("v", json!(1)), ("extra", json!(9))]);
    let new = row(&[("k", json!("a")), ("v", json!(1))]);
    assert!(!row_changed(&old, &new));

    // fields only the new row has are ignored too
    let old = row(&[("k", json!("a"))]);
    let new = row(&[("k", json!("a")), ("fresh", json!(1))]);
    assert!(!row_changed(&old, &new));
}

#[test]
fn test_row_changed_compares_encoded_forms() {
    // decoded object vs its own JSON text is not a change
    let old = row(&[("meta", json!({"a": 1}))]);
    let new = row(&[("meta", json!("{\"a\":1}"))]);
    assert!(!row_changed(&old, &new));
}

#[test]
fn test_intersect_keys() {
    let a = row(&[("x", json!(1)), ("y", json!(2))]);
    let b = row(&[("y", json!(9)), ("z", json!(3))]);
    assert_eq!(intersect_keys(&a, &b), row(&[("y", json!(2))]));
}

#[test]
fn test_trunc7() {
    assert_eq!(trunc7(3.14159265), 3.14159);
    assert_eq!(trunc7(2.5), 2.5);
    assert_eq!(trunc7(-1.23456789), -1.2345);
}

// --- logging ---

#[test]
fn test_setup_logging_is_repeatable() {
    sqlmirror::setup_logging(false);
    // second call hits the already-initialized logger and stays a no-op
    sqlmirror::setup_logging(true);
    log::info!("logger smoke record");
}

// --- column fragment builder ---

fn index_map() -> std::collections::HashMap<String, usize> {
    TableSchema::new("accounts")
        .column("name", StorageType::Text, ColumnPolicy::Required)
        .column("auth", StorageType::Text, ColumnPolicy::Required)
        .unique("auth", ["auth"])
        .column_index_map()
}

#[test]
fn test_columns_all_reports_full_index_map() {
    let map = index_map();
    let frag = query::column_fragment(&map, &ColumnSpec::All).unwrap();
    assert_eq!(frag.select, "*");
    assert_eq!(frag.indices, map);
    assert_eq!(frag.indices["id"], 0);
    assert_eq!(frag.indices["name"], 1);
    assert_eq!(frag.indices["auth"], 2);
}

#[test]
fn test_columns_names_are_quoted() {
    let frag = query::column_fragment(
        &index_map(),
        &ColumnSpec::Names(vec!["name".into(), "auth".into()]),
    )
    .unwrap();
    assert_eq!(frag.select, "`name`,`auth`");
    assert_eq!(frag.indices["name"], 0);
    assert_eq!(frag.indices["auth"], 1);
}

#[test]
fn test_columns_function_expression_stays_raw() {
    let frag = query::column_fragment(
        &index_map(),
        &ColumnSpec::Aliased(vec![("cnt".into(), "COUNT(id)".into())]),
    )
    .unwrap();
    assert_eq!(frag.select, "COUNT(id) `cnt`");
    assert_eq!(frag.indices["cnt"], 0);
}

#[test]
fn test_columns_raw_strips_quotes_and_aliases_by_last_token() {
    let frag = query::column_fragment(
        &index_map(),
        &ColumnSpec::Raw("`name`, time_stamp ts".into()),
    )
    .unwrap();
    assert_eq!(frag.select, "`name`,`time_stamp` `ts`");
    assert_eq!(frag.indices["name"], 0);
    assert_eq!(frag.indices["ts"], 1);
    assert!(!frag.indices.contains_key("time_stamp"));
}

#[test]
fn test_columns_duplicate_alias_keeps_first_position() {
    let frag =
        query::column_fragment(&index_map(), &ColumnSpec::Raw("name, auth, name".into())).unwrap();
    assert_eq!(frag.indices["name"], 0);
    assert_eq!(frag.indices["auth"], 1);
    assert_eq!(frag.indices.len(), 2);
}

#[test]
fn test_columns_malformed_identifier_is_checked_error() {
    let err = query::column_fragment(&index_map(), &ColumnSpec::Raw("1bad".into())).unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));
}

// --- where / order / limit ---

#[test]
fn test_where_equality_and_in_group() {
    let spec = WhereSpec::new()
        .eq("k", "a")
        .any_of("t", vec![json!(1), json!(2)]);
    let (sql, params) = query::where_clause(&spec).unwrap();
    assert_eq!(sql, " WHERE `k` = ? AND `t` IN (?,?)");
    assert_eq!(params, vec![json!("a"), json!(1), json!(2)]);
}

#[test]
fn test_where_empty_yields_nothing() {
    let (sql, params) = query::where_clause(&WhereSpec::new()).unwrap();
    assert_eq!(sql, "");
    assert!(params.is_empty());
}

#[test]
fn test_order_clause() {
    let orders = vec![("name".to_string(), OrderDir::Asc), ("id".to_string(), OrderDir::Desc)];
    assert_eq!(
        query::order_clause(&orders).unwrap(),
        " ORDER BY `name` ASC, `id` DESC"
    );
    assert_eq!(query::order_clause(&Vec::new()).unwrap(), "");
}

#[test]
fn test_limit_clause() {
    assert_eq!(query::limit_clause(None), "");
    assert_eq!(query::limit_clause(Some(Limit::Count(5))), " LIMIT 5");
    assert_eq!(query::limit_clause(Some(Limit::Pair(10, 20))), " LIMIT 10, 20");
}

#[test]
fn test_select_composition() {
    let stmt = query::select(
        "accounts",
        &index_map(),
        &ColumnSpec::Names(vec!["name".into()]),
        &WhereSpec::new().eq("auth", "tok"),
        &vec![("id".to_string(), OrderDir::Desc)],
        Some(Limit::Count(1)),
    )
    .unwrap();
    assert_eq!(
        stmt.sql,
        "SELECT `name` FROM `accounts` WHERE `auth` = ? ORDER BY `id` DESC LIMIT 1"
    );
    assert_eq!(stmt.params, vec![json!("tok")]);
    assert_eq!(stmt.indices["name"], 0);
}
