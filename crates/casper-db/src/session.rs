//! One pooled connection held for the lifetime of a context.

use std::sync::{Arc, Mutex};

use r2d2::PooledConnection;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::types::Value;
use rusqlite::{Connection, InterruptHandle, Statement};
use tokio::task::JoinError;

use crate::cancel::CancelSignal;
use crate::error::{DataError, QueryError};
use crate::pool::DbPool;
use crate::record::Record;

type PooledConn = PooledConnection<SqliteConnectionManager>;

/// A checked-out connection plus the handle used to interrupt it.
///
/// The connection goes back to the pool once the session and every blocking
/// task still using it have been dropped, on every exit path.
pub(crate) struct Session {
    conn: Arc<Mutex<PooledConn>>,
    interrupt: InterruptHandle,
    context: &'static str,
}

impl Session {
    /// Checks a connection out of `pool` without blocking the runtime.
    pub(crate) async fn acquire(pool: &DbPool, context: &'static str) -> Result<Self, DataError> {
        let pool = pool.clone();
        let checkout = tokio::task::spawn_blocking(move || pool.get().map_err(DataError::from));
        let conn = joined(checkout.await)?;
        let interrupt = conn.get_interrupt_handle();
        tracing::debug!(context, "acquired pooled connection");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            interrupt,
            context,
        })
    }

    /// Runs `work` against the connection on the blocking pool.
    ///
    /// Cancellation interrupts the running statement and then waits for the
    /// task, so the reported outcome is always what the store actually did.
    pub(crate) async fn run<R, F>(&self, cancel: &CancelSignal, work: F) -> Result<R, DataError>
    where
        R: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<R, DataError> + Send + 'static,
    {
        if cancel.is_cancelled() {
            return Err(DataError::Cancelled);
        }

        let conn = Arc::clone(&self.conn);
        let mut task = tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| DataError::Connectivity("connection lock poisoned".to_string()))?;
            work(&mut **guard)
        });

        tokio::select! {
            res = &mut task => joined(res),
            () = cancel.cancelled() => {
                tracing::debug!(context = self.context, "interrupting in-flight statement");
                self.interrupt.interrupt();
                joined(task.await)
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        tracing::debug!(context = self.context, "released pooled connection");
    }
}

/// Unwraps a blocking task's result.
///
/// A panic inside the task is a bug in the caller's closure (a row mapper,
/// say), so it is resumed here rather than reported as a store error.
fn joined<R>(res: Result<Result<R, DataError>, JoinError>) -> Result<R, DataError> {
    match res {
        Ok(out) => out,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(DataError::Cancelled),
    }
}

/// Executes `sql` and maps every row into `T`.
///
/// The first failing row discards the whole result.
pub(crate) fn fetch<T: Record>(
    conn: &Connection,
    sql: &str,
    params: &[Value],
) -> Result<Vec<T>, DataError> {
    let mut stmt = conn.prepare(sql)?;
    bind(&mut stmt, params)?;

    let mut rows = stmt.raw_query();
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(T::from_row(row)?);
    }
    Ok(records)
}

/// Binds `params` to every placeholder of `stmt`.
///
/// Ordinal named placeholders (`@0`, `:1`, `$2`) take `params[N]` wherever
/// they appear. Everything else (`?`, `?N`, non-numeric names) binds by
/// placeholder index. The count is checked before anything is bound.
pub(crate) fn bind(stmt: &mut Statement<'_>, params: &[Value]) -> Result<(), DataError> {
    let expected = stmt.parameter_count();
    let mismatch = || QueryError::ParameterMismatch {
        expected,
        actual: params.len(),
    };
    if expected != params.len() {
        return Err(mismatch().into());
    }

    for index in 1..=expected {
        let slot = stmt
            .parameter_name(index)
            .and_then(ordinal)
            .unwrap_or(index - 1);
        let value = params.get(slot).ok_or_else(mismatch)?;
        stmt.raw_bind_parameter(index, value)?;
    }
    Ok(())
}

fn ordinal(name: &str) -> Option<usize> {
    name.strip_prefix(['@', ':', '$'])?.parse().ok()
}
