//! Schema validation, bootstrap DDL rendering, and the TOML declaration
//! loader.

use serde_json::json;
use sqlmirror::utils::Settings;
use sqlmirror::{ColumnPolicy, KeyKind, Schema, StorageType, StoreError, TableSchema};

fn accounts() -> TableSchema {
    TableSchema::new("accounts")
        .column("basic", StorageType::Integer, ColumnPolicy::Default(json!(0)))
        .column("name", StorageType::Text, ColumnPolicy::Required)
        .column("auth", StorageType::Text, ColumnPolicy::Required)
        .column(
            "time_stamp",
            StorageType::Text,
            ColumnPolicy::Default(json!("CURRENT_TIMESTAMP")),
        )
        .unique("auth", ["auth"])
}

#[test]
fn test_create_table_sql() {
    let schema = Schema::new(vec![accounts()]).unwrap();
    let sql = schema.table("accounts").unwrap().create_table_sql();
    assert_eq!(
        sql,
        "CREATE TABLE IF NOT EXISTS `accounts` (`id` INTEGER PRIMARY KEY,\
         `basic` INTEGER DEFAULT 0,\
         `name` TEXT NOT NULL,\
         `auth` TEXT NOT NULL,\
         `time_stamp` TEXT DEFAULT CURRENT_TIMESTAMP,\
         CONSTRAINT `auth` UNIQUE (`auth`));"
    );
}

#[test]
fn test_string_default_is_quoted() {
    let schema = Schema::new(vec![
        TableSchema::new("t")
            .column("s", StorageType::Text, ColumnPolicy::Default(json!("n/a")))
            .unique("u", ["s"]),
    ])
    .unwrap();
    let sql = schema.table("t").unwrap().create_table_sql();
    assert!(sql.contains("`s` TEXT DEFAULT 'n/a'"));
}

#[test]
fn test_column_index_map_positions() {
    let map = accounts().column_index_map();
    assert_eq!(map["id"], 0);
    assert_eq!(map["basic"], 1);
    assert_eq!(map["name"], 2);
    assert_eq!(map["auth"], 3);
    assert_eq!(map["time_stamp"], 4);
}

#[test]
fn test_natural_key_derived_from_first_constraint() {
    let schema = Schema::new(vec![accounts()]).unwrap();
    let spec = schema.key_spec("accounts").unwrap();
    assert_eq!(spec.columns, vec!["auth".to_string()]);
    assert_eq!(spec.kind, KeyKind::Scalar);
}

#[test]
fn test_explicit_key_override_wins() {
    let schema = Schema::new(vec![
        accounts().key(["name"], KeyKind::List),
    ])
    .unwrap();
    let spec = schema.key_spec("accounts").unwrap();
    assert_eq!(spec.columns, vec!["name".to_string()]);
    assert_eq!(spec.kind, KeyKind::List);
}

#[test]
fn test_table_without_key_source_is_rejected() {
    let err = Schema::new(vec![
        TableSchema::new("t").column("a", StorageType::Text, ColumnPolicy::Loose),
    ])
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidSchema(_)));
}

#[test]
fn test_reserved_id_column_is_rejected() {
    let err = Schema::new(vec![
        TableSchema::new("t")
            .column("id", StorageType::Integer, ColumnPolicy::Loose)
            .unique("u", ["id"]),
    ])
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidSchema(_)));
}

#[test]
fn test_duplicate_column_is_rejected() {
    let err = Schema::new(vec![
        TableSchema::new("t")
            .column("a", StorageType::Text, ColumnPolicy::Loose)
            .column("a", StorageType::Text, ColumnPolicy::Loose)
            .unique("u", ["a"]),
    ])
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidSchema(_)));
}

#[test]
fn test_constraint_over_unknown_column_is_rejected() {
    let err = Schema::new(vec![
        TableSchema::new("t")
            .column("a", StorageType::Text, ColumnPolicy::Loose)
            .unique("u", ["missing"]),
    ])
    .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn { .. }));
}

#[test]
fn test_bad_identifier_is_rejected() {
    let err = Schema::new(vec![
        TableSchema::new("bad-name")
            .column("a", StorageType::Text, ColumnPolicy::Loose)
            .unique("u", ["a"]),
    ])
    .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));
}

// --- TOML declarations ---

const DECL: &str = r#"
path = "main.db"

[[tables]]
name = "accounts"

[[tables.columns]]
name = "name"
type = "TEXT"
required = true

[[tables.columns]]
name = "auth"
type = "TEXT"
required = true

[[tables.columns]]
name = "basic"
type = "INTEGER"
default = 0

[[tables.unique]]
name = "auth"
columns = ["auth"]

[[tables]]
name = "events"

[[tables.columns]]
name = "stream"
type = "TEXT"
required = true

[tables.key]
columns = ["stream"]
list = true
"#;

#[test]
fn test_settings_into_schema() {
    let settings = Settings::from_str(DECL).unwrap();
    assert_eq!(settings.path.to_str(), Some("main.db"));
    let schema = settings.into_schema().unwrap();

    let accounts = schema.table("accounts").unwrap();
    assert_eq!(accounts.columns.len(), 3);
    assert!(accounts.create_table_sql().contains("`basic` INTEGER DEFAULT 0"));
    assert_eq!(
        schema.key_spec("accounts").unwrap().columns,
        vec!["auth".to_string()]
    );

    let events = schema.key_spec("events").unwrap();
    assert_eq!(events.kind, KeyKind::List);
    assert_eq!(events.columns, vec!["stream".to_string()]);
}

#[test]
fn test_settings_column_order_is_declaration_order() {
    let schema = Settings::from_str(DECL).unwrap().into_schema().unwrap();
    let map = schema.table("accounts").unwrap().column_index_map();
    assert_eq!(map["id"], 0);
    assert_eq!(map["name"], 1);
    assert_eq!(map["auth"], 2);
    assert_eq!(map["basic"], 3);
}
