//! The write context and its unit of work.
//!
//! Mutations are staged in memory and only reach the store through
//! [`WriteContext::commit`], which applies the whole batch inside a single
//! `BEGIN IMMEDIATE` transaction. A failed or cancelled commit rolls back
//! and leaves the batch staged so the caller can inspect it, retry or
//! [`discard`](WriteContext::discard) it.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, TransactionBehavior};

use crate::cancel::CancelSignal;
use crate::error::{DataError, QueryError};
use crate::pool::DbPool;
use crate::record::{Entity, Record};
use crate::session::{bind, fetch, Session};

/// A single staged change.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Insert a new row.
    Insert {
        /// Target table.
        table: &'static str,
        /// Columns to set, including the key when the caller supplied one.
        columns: Vec<(&'static str, Value)>,
    },
    /// Update an existing row by key.
    Update {
        /// Target table.
        table: &'static str,
        /// Key column.
        key_column: &'static str,
        /// Key value.
        key: Value,
        /// Columns to set.
        columns: Vec<(&'static str, Value)>,
        /// Version column and the version the caller expects to replace.
        version: Option<(&'static str, i64)>,
    },
    /// Delete an existing row by key.
    Delete {
        /// Target table.
        table: &'static str,
        /// Key column.
        key_column: &'static str,
        /// Key value.
        key: Value,
        /// Version column and the version the caller expects to delete.
        version: Option<(&'static str, i64)>,
    },
    /// Run an arbitrary parameterized statement.
    Execute {
        /// Statement text.
        sql: String,
        /// Parameters bound in order.
        params: Vec<Value>,
    },
}

/// Handle to a staged mutation, used to read back store-generated keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagedId(usize);

struct Applied {
    rows: usize,
    rowid: Option<i64>,
}

struct CommitOutcome {
    affected: usize,
    inserted: Vec<Option<i64>>,
}

impl Mutation {
    fn insert<E: Entity>(entity: &E) -> Self {
        let mut columns = Vec::new();
        if let Some(key) = entity.key() {
            columns.push((E::KEY, key));
        }
        columns.extend(entity.values());
        if let Some(version_column) = E::VERSION {
            columns.push((version_column, Value::Integer(1)));
        }
        Mutation::Insert {
            table: E::TABLE,
            columns,
        }
    }

    fn apply(&self, conn: &Connection) -> Result<Applied, DataError> {
        match self {
            Mutation::Insert { table, columns } => {
                let sql = if columns.is_empty() {
                    format!("INSERT INTO {} DEFAULT VALUES", quote(table))
                } else {
                    let names: Vec<String> = columns.iter().map(|(c, _)| quote(c)).collect();
                    let slots: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
                    format!(
                        "INSERT INTO {} ({}) VALUES ({})",
                        quote(table),
                        names.join(", "),
                        slots.join(", ")
                    )
                };
                let rows = conn.execute(&sql, params_from_iter(columns.iter().map(|(_, v)| v)))?;
                Ok(Applied {
                    rows,
                    rowid: Some(conn.last_insert_rowid()),
                })
            }
            Mutation::Update {
                table,
                key_column,
                key,
                columns,
                version,
            } => {
                let expected = version.as_ref().map(|(c, v)| (*c, Value::Integer(*v)));
                let mut assignments: Vec<String> = columns
                    .iter()
                    .enumerate()
                    .map(|(i, (c, _))| format!("{} = ?{}", quote(c), i + 1))
                    .collect();
                let mut params: Vec<&Value> = columns.iter().map(|(_, v)| v).collect();
                if let Some((version_column, _)) = version {
                    let col = quote(version_column);
                    assignments.push(format!("{col} = {col} + 1"));
                }
                if assignments.is_empty() {
                    let col = quote(key_column);
                    assignments.push(format!("{col} = {col}"));
                }

                params.push(key);
                let mut sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?{}",
                    quote(table),
                    assignments.join(", "),
                    quote(key_column),
                    params.len()
                );
                if let Some((version_column, expected)) = &expected {
                    params.push(expected);
                    sql.push_str(&format!(" AND {} = ?{}", quote(version_column), params.len()));
                }

                let rows = conn.execute(&sql, params_from_iter(params))?;
                if rows == 0 {
                    return Err(conflict(*table, key));
                }
                Ok(Applied { rows, rowid: None })
            }
            Mutation::Delete {
                table,
                key_column,
                key,
                version,
            } => {
                let mut sql = format!(
                    "DELETE FROM {} WHERE {} = ?1",
                    quote(table),
                    quote(key_column)
                );
                let mut params = vec![key.clone()];
                if let Some((version_column, expected)) = version {
                    sql.push_str(&format!(" AND {} = ?2", quote(version_column)));
                    params.push(Value::Integer(*expected));
                }

                let rows = conn.execute(&sql, params_from_iter(params.iter()))?;
                if rows == 0 {
                    return Err(conflict(*table, key));
                }
                Ok(Applied { rows, rowid: None })
            }
            Mutation::Execute { sql, params } => {
                let mut stmt = conn.prepare(sql)?;
                bind(&mut stmt, params)?;
                let rows = stmt.raw_execute()?;
                Ok(Applied { rows, rowid: None })
            }
        }
    }
}

/// Stages mutations and persists them atomically.
///
/// Holds one connection from the write pool until dropped. This is the only
/// component that mutates persisted state.
pub struct WriteContext {
    session: Session,
    staged: Vec<Mutation>,
    inserted: Vec<Option<i64>>,
}

impl WriteContext {
    /// Checks a connection out of the write pool.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Connectivity` if no connection becomes available
    /// within the pool's acquire timeout.
    pub async fn open(pool: &DbPool) -> Result<Self, DataError> {
        Ok(Self {
            session: Session::acquire(pool, "write").await?,
            staged: Vec::new(),
            inserted: Vec::new(),
        })
    }

    /// Stages an insert of `entity`.
    ///
    /// A `None` key is left for the store to generate; read it back with
    /// [`inserted_key`](Self::inserted_key) after committing. Versioned
    /// entities start at version 1.
    pub fn add<E: Entity>(&mut self, entity: &E) -> StagedId {
        self.stage(Mutation::insert(entity))
    }

    /// Stages an update of `entity` by key.
    ///
    /// For versioned entities the update only matches the row at
    /// `entity.version()` and bumps the stored version by one.
    ///
    /// # Errors
    ///
    /// Returns `QueryError::MissingKey` if the entity has no key.
    pub fn update<E: Entity>(&mut self, entity: &E) -> Result<StagedId, DataError> {
        let key = entity
            .key()
            .ok_or(QueryError::MissingKey { table: E::TABLE })?;
        Ok(self.stage(Mutation::Update {
            table: E::TABLE,
            key_column: E::KEY,
            key,
            columns: entity.values(),
            version: E::VERSION.map(|column| (column, entity.version())),
        }))
    }

    /// Stages removal of `entity` by key (and version, when versioned).
    ///
    /// # Errors
    ///
    /// Returns `QueryError::MissingKey` if the entity has no key.
    pub fn remove<E: Entity>(&mut self, entity: &E) -> Result<StagedId, DataError> {
        let key = entity
            .key()
            .ok_or(QueryError::MissingKey { table: E::TABLE })?;
        Ok(self.stage(Mutation::Delete {
            table: E::TABLE,
            key_column: E::KEY,
            key,
            version: E::VERSION.map(|column| (column, entity.version())),
        }))
    }

    /// Stages a raw parameterized statement.
    pub fn execute(&mut self, sql: impl Into<String>, params: Vec<Value>) -> StagedId {
        self.stage(Mutation::Execute {
            sql: sql.into(),
            params,
        })
    }

    fn stage(&mut self, mutation: Mutation) -> StagedId {
        tracing::trace!(?mutation, "staged mutation");
        self.staged.push(mutation);
        StagedId(self.staged.len() - 1)
    }

    /// The current unit of work, in staging order.
    pub fn pending(&self) -> &[Mutation] {
        &self.staged
    }

    /// Whether any mutation is waiting for a commit.
    pub fn has_pending(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Drops the current unit of work and returns how many mutations it held.
    pub fn discard(&mut self) -> usize {
        let dropped = self.staged.len();
        self.staged.clear();
        if dropped > 0 {
            tracing::debug!(dropped, "discarded unit of work");
        }
        dropped
    }

    /// Row id generated for an insert of the last successful commit.
    ///
    /// Returns `None` for non-insert mutations or unknown handles.
    pub fn inserted_key(&self, id: StagedId) -> Option<i64> {
        self.inserted.get(id.0).copied().flatten()
    }

    /// Persists every staged mutation atomically.
    ///
    /// Returns the number of rows affected. An empty unit of work returns 0
    /// without touching the store. On success the unit of work is cleared.
    ///
    /// # Errors
    ///
    /// - `DataError::ConstraintViolation` when the store rejects a row.
    /// - `DataError::ConcurrencyConflict` when an update or delete matched no
    ///   row at the expected key and version.
    /// - `DataError::Connectivity` on store unavailability.
    /// - `DataError::Cancelled` when `cancel` fires before the transaction
    ///   commits; nothing is persisted.
    ///
    /// On any error the transaction is rolled back and the unit of work is
    /// left staged.
    pub async fn commit(&mut self, cancel: &CancelSignal) -> Result<usize, DataError> {
        if self.staged.is_empty() {
            tracing::debug!("commit of empty unit of work");
            return Ok(0);
        }

        let batch = self.staged.clone();
        let staged = batch.len();
        let signal = cancel.clone();
        let res = self
            .session
            .run(cancel, move |conn| apply_batch(conn, &batch, &signal))
            .await;

        match res {
            Ok(outcome) => {
                self.staged.clear();
                self.inserted = outcome.inserted;
                tracing::debug!(staged, affected = outcome.affected, "unit of work committed");
                Ok(outcome.affected)
            }
            Err(e) => {
                tracing::warn!(staged, error = %e, "commit failed, unit of work kept");
                Err(e)
            }
        }
    }

    /// Queries through the write connection.
    ///
    /// Sees everything committed through this context, which the read store
    /// may not yet reflect. Staged, uncommitted mutations are not visible.
    ///
    /// # Errors
    ///
    /// Same as [`ReadContext::query`](crate::ReadContext::query).
    pub async fn query<T: Record>(
        &self,
        sql: &str,
        params: Vec<Value>,
        cancel: &CancelSignal,
    ) -> Result<Vec<T>, DataError> {
        let statement = sql.to_owned();
        self.session
            .run(cancel, move |conn| fetch::<T>(conn, &statement, &params))
            .await
    }
}

fn apply_batch(
    conn: &mut Connection,
    batch: &[Mutation],
    cancel: &CancelSignal,
) -> Result<CommitOutcome, DataError> {
    // Dropping `tx` on any early return rolls the whole batch back.
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    let mut affected = 0;
    let mut inserted = Vec::with_capacity(batch.len());

    for mutation in batch {
        if cancel.is_cancelled() {
            return Err(DataError::Cancelled);
        }
        let applied = mutation.apply(&tx)?;
        affected += applied.rows;
        inserted.push(applied.rowid);
    }

    if cancel.is_cancelled() {
        return Err(DataError::Cancelled);
    }
    tx.commit()?;

    Ok(CommitOutcome { affected, inserted })
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn conflict(table: &'static str, key: &Value) -> DataError {
    let key = match key {
        Value::Null => "NULL".to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => format!("<{} byte blob>", b.len()),
    };
    DataError::ConcurrencyConflict { table, key }
}
