//! Data-access layer for Casper.
//!
//! Splits store access into two contexts backed by separate SQLite
//! connection pools (via `r2d2`):
//!
//! - [`ReadContext`] executes parameterized queries and materializes rows
//!   into any [`Record`] type. Its connections are `query_only`.
//! - [`WriteContext`] stages [`Entity`] inserts, updates and removals (or raw
//!   statements) as a unit of work and persists them with one atomic
//!   [`commit`](WriteContext::commit).
//!
//! Both contexts hold one pooled connection for their lifetime and release
//! it on drop. Blocking SQLite calls run on `tokio`'s blocking pool and
//! observe a [`CancelSignal`].
//!
//! # Design decisions
//!
//! - **Writes use `BEGIN IMMEDIATE`**: the write lock is taken up front, so
//!   a commit either applies the whole unit of work or none of it.
//! - **Reads are autocommit on WAL**: each statement sees the latest
//!   committed snapshot of its store. When the read pool points at a
//!   different store than the write pool there is no read-after-write
//!   guarantee; use [`WriteContext::query`] for that.
//! - **Errors are translated, never hidden**: every store failure becomes a
//!   [`DataError`] kind.

mod cancel;
mod error;
mod pool;
mod read;
mod record;
mod session;
mod stores;
mod write;

pub use cancel::{CancelGuard, CancelSignal};
pub use error::{DataError, QueryError};
pub use pool::{create_pool, AccessMode, DbPool, DbRuntimeSettings, PoolError};
pub use read::ReadContext;
pub use record::{Entity, Record};
pub use stores::DataStores;
pub use write::{Mutation, StagedId, WriteContext};

pub use rusqlite::types::Value;
pub use rusqlite::Row;
