#![allow(dead_code)]

use casper_db::{
    create_pool, AccessMode, DataStores, DbRuntimeSettings, Entity, Record, Row, Value,
};
use tempfile::TempDir;

pub const SCHEMA: &str = "
    CREATE TABLE customers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT UNIQUE,
        row_version INTEGER NOT NULL DEFAULT 1
    );
";

#[derive(Debug, Clone, PartialEq)]
pub struct Customer {
    pub id: Option<i64>,
    pub name: String,
    pub email: Option<String>,
    pub row_version: i64,
}

impl Customer {
    pub fn new(name: &str, email: Option<&str>) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            email: email.map(str::to_string),
            row_version: 1,
        }
    }
}

impl Record for Customer {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            email: row.get("email")?,
            row_version: row.get("row_version")?,
        })
    }
}

impl Entity for Customer {
    const TABLE: &'static str = "customers";
    const KEY: &'static str = "id";
    const VERSION: Option<&'static str> = Some("row_version");

    fn key(&self) -> Option<Value> {
        self.id.map(Value::Integer)
    }

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", Value::Text(self.name.clone())),
            ("email", self.email.clone().map_or(Value::Null, Value::Text)),
        ]
    }

    fn version(&self) -> i64 {
        self.row_version
    }
}

/// Test stores over one temporary database file. Keep the `TempDir` alive.
pub fn stores() -> (DataStores, TempDir) {
    stores_with(DbRuntimeSettings::default())
}

pub fn stores_with(settings: DbRuntimeSettings) -> (DataStores, TempDir) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let path = dir.path().join("casper.db");
    let path = path.to_str().expect("temp path should be utf-8");

    let write = create_pool(path, AccessMode::ReadWrite, settings).expect("write pool");
    write
        .get()
        .expect("write connection")
        .execute_batch(SCHEMA)
        .expect("schema should apply");
    let read = create_pool(path, AccessMode::ReadOnly, settings).expect("read pool");

    (DataStores::new(read, write), dir)
}

/// Inserts a customer with a fixed id directly through the write pool.
pub fn seed(stores: &DataStores, id: i64, name: &str) {
    stores
        .write_pool()
        .get()
        .expect("write connection")
        .execute(
            "INSERT INTO customers (id, name) VALUES (?1, ?2)",
            rusqlite::params![id, name],
        )
        .expect("seed insert");
}
