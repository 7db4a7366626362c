//! sqlmirror: schema-driven single-file table store with a mirrored index.
//!
//! Tables are declared up front ([`TableSchema`] → [`Schema`]) and created on
//! first use. [`Store`] provides SQL-fragment-based CRUD over one SQLite
//! file, opening a fresh connection per call. [`MirrorStore`] adds an
//! in-memory ordered key → row mirror per table, loaded wholesale at startup
//! and kept consistent through [`MirrorStore::upsert`]: unchanged candidates
//! never touch the file, changed ones update only the affected row, and the
//! mirror always reflects the latest caller-observed object.
//!
//! ```no_run
//! use sqlmirror::{
//!     ColumnPolicy, MirrorStore, Row, Schema, StorageType, TableSchema,
//! };
//! use serde_json::json;
//!
//! fn main() -> sqlmirror::Result<()> {
//!     let schema = Schema::new(vec![
//!         TableSchema::new("accounts")
//!             .column("name", StorageType::Text, ColumnPolicy::Required)
//!             .column("auth", StorageType::Text, ColumnPolicy::Required)
//!             .column("basic", StorageType::Integer, ColumnPolicy::Default(json!(0)))
//!             .unique("auth", ["auth"]),
//!     ])?;
//!     let db = MirrorStore::open("main.db", schema)?;
//!
//!     let mut row = Row::new();
//!     row.insert("name".into(), json!("alice"));
//!     row.insert("auth".into(), json!("tok-1"));
//!     let outcome = db.upsert("accounts", row)?;
//!     assert_eq!(outcome.inserted, 1);
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod lock;
pub mod query;
pub mod schema;
pub mod store;
pub mod types;
pub mod utils;

pub use error::{Result, StoreError};
pub use query::{ColumnSpec, Limit, OrderDir, OrderSpec, Statement, WhereSpec, WhereValue};
pub use schema::{
    ColumnPolicy, KeyKind, KeySpec, PRIMARY_KEY, Schema, StorageType, TableSchema,
    UniqueConstraint,
};
pub use store::{Candidate, MirrorStore, Store};
pub use types::{Key, Row, SetOutcome, Slot, UpdateOutcome};
pub use utils::setup_logging;
