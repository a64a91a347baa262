#![allow(dead_code)]

use casper_app::customers::{self, SCHEMA};
use casper_app::{DataStores, Dispatcher, DispatcherBuilder};
use casper_db::{create_pool, AccessMode, DbRuntimeSettings};
use tempfile::TempDir;

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

/// Read and write pools over two different files, both with the schema.
///
/// Nothing replicates between them, so the read store never sees a write.
pub fn split_stores() -> (DataStores, TempDir) {
    let dir = tempfile::tempdir().expect("should create temp dir");
    let settings = DbRuntimeSettings::default();
    let primary = dir.path().join("primary.db");
    let replica = dir.path().join("replica.db");
    let primary = primary.to_str().expect("temp path should be utf-8");
    let replica = replica.to_str().expect("temp path should be utf-8");

    let write = create_pool(primary, AccessMode::ReadWrite, settings).expect("write pool");
    write
        .get()
        .expect("write connection")
        .execute_batch(SCHEMA)
        .expect("schema should apply");
    create_pool(replica, AccessMode::ReadWrite, settings)
        .expect("replica bootstrap pool")
        .get()
        .expect("replica connection")
        .execute_batch(SCHEMA)
        .expect("schema should apply");
    let read = create_pool(replica, AccessMode::ReadOnly, settings).expect("read pool");

    (DataStores::new(read, write), dir)
}

pub fn stores() -> (DataStores, TempDir) {
    stores_with(DbRuntimeSettings::default())
}

pub fn customer_dispatcher(stores: DataStores) -> Dispatcher {
    customers::register(DispatcherBuilder::new())
        .expect("customer handlers register once")
        .build(stores)
}

pub fn row_count(stores: &DataStores) -> i64 {
    stores
        .read_pool()
        .get()
        .expect("read connection")
        .query_row("SELECT COUNT(*) FROM customers", [], |row| row.get(0))
        .expect("count query")
}
