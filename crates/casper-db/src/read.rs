//! The read-only data-access context.

use rusqlite::types::Value;

use crate::cancel::CancelSignal;
use crate::error::DataError;
use crate::pool::DbPool;
use crate::record::Record;
use crate::session::{fetch, Session};

/// Executes parameterized queries against the read store.
///
/// Holds one connection from the read pool until dropped. The pool marks
/// its connections `query_only`, so nothing issued through this context can
/// modify the store. A context serves one logical operation; open another
/// one for concurrent work.
pub struct ReadContext {
    session: Session,
}

impl ReadContext {
    /// Checks a connection out of the read pool.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Connectivity` if no connection becomes available
    /// within the pool's acquire timeout.
    pub async fn open(pool: &DbPool) -> Result<Self, DataError> {
        Ok(Self {
            session: Session::acquire(pool, "read").await?,
        })
    }

    /// Runs `sql` with `params` bound and maps every row into `T`.
    ///
    /// Positional placeholders (`?`, `?N`) bind in list order. Ordinal named
    /// placeholders (`@0`, `:1`, `$2`) bind `params[N]` regardless of where
    /// they appear in the statement.
    ///
    /// # Errors
    ///
    /// - `QueryError::ParameterMismatch` when `params.len()` differs from the
    ///   statement's placeholder count or an ordinal is out of range; nothing
    ///   is executed.
    /// - `QueryError::Malformed` when the store rejects the statement.
    /// - `QueryError::Mapping` when a row cannot populate `T`.
    /// - `DataError::Connectivity` on store unavailability.
    /// - `DataError::Cancelled` when `cancel` fires first.
    pub async fn query<T: Record>(
        &self,
        sql: &str,
        params: Vec<Value>,
        cancel: &CancelSignal,
    ) -> Result<Vec<T>, DataError> {
        let statement = sql.to_owned();
        let res = self
            .session
            .run(cancel, move |conn| fetch::<T>(conn, &statement, &params))
            .await;

        match &res {
            Ok(rows) => tracing::debug!(sql, rows = rows.len(), "read query completed"),
            Err(e) => tracing::debug!(sql, error = %e, "read query failed"),
        }
        res
    }

    /// Like [`query`](Self::query) but returns only the first record.
    ///
    /// # Errors
    ///
    /// Same as [`query`](Self::query).
    pub async fn query_one<T: Record>(
        &self,
        sql: &str,
        params: Vec<Value>,
        cancel: &CancelSignal,
    ) -> Result<Option<T>, DataError> {
        Ok(self.query(sql, params, cancel).await?.into_iter().next())
    }
}
