//! Row mapping traits for the read and write paths.

use rusqlite::types::Value;
use rusqlite::Row;

/// A row shape a query can materialize into.
///
/// Implementations read columns by name (or index) and return the row error
/// unchanged; the contexts translate it into
/// [`QueryError::Mapping`](crate::QueryError::Mapping).
///
/// ```rust,ignore
/// struct Total { count: i64 }
///
/// impl Record for Total {
///     fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
///         Ok(Self { count: row.get("count")? })
///     }
/// }
/// ```
pub trait Record: Sized + Send + 'static {
    /// Builds one record from the current row.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

macro_rules! scalar_record {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Record for $ty {
                fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
                    row.get(0)
                }
            }
        )*
    };
}

// Single-column results such as `SELECT COUNT(*) ...`.
scalar_record!(i64, f64, String, bool);

/// A persisted row shape the write context can stage.
pub trait Entity: Send + 'static {
    /// Table the entity lives in.
    const TABLE: &'static str;

    /// Primary key column.
    const KEY: &'static str;

    /// Optimistic-concurrency version column, if the table has one.
    const VERSION: Option<&'static str> = None;

    /// Key value, or `None` when the store generates it on insert.
    fn key(&self) -> Option<Value>;

    /// Non-key, non-version columns and their values.
    fn values(&self) -> Vec<(&'static str, Value)>;

    /// Version the caller last observed. Ignored when `VERSION` is `None`.
    fn version(&self) -> i64 {
        0
    }
}
