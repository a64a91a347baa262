//! The pair of pools contexts are opened from.

use crate::error::DataError;
use crate::pool::DbPool;
use crate::read::ReadContext;
use crate::write::WriteContext;

/// Read and write pools, resolved once at process start.
///
/// The two pools may point at the same database file or at different ones
/// (for example a primary and a replica). Cloning is cheap.
#[derive(Clone)]
pub struct DataStores {
    read: DbPool,
    write: DbPool,
}

impl DataStores {
    /// Pairs an already-built read pool with a write pool.
    pub fn new(read: DbPool, write: DbPool) -> Self {
        Self { read, write }
    }

    /// Opens a read context on the read pool.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Connectivity` if no connection is available.
    pub async fn open_read(&self) -> Result<ReadContext, DataError> {
        ReadContext::open(&self.read).await
    }

    /// Opens a write context on the write pool.
    ///
    /// # Errors
    ///
    /// Returns `DataError::Connectivity` if no connection is available.
    pub async fn open_write(&self) -> Result<WriteContext, DataError> {
        WriteContext::open(&self.write).await
    }

    /// The read pool.
    pub fn read_pool(&self) -> &DbPool {
        &self.read
    }

    /// The write pool.
    pub fn write_pool(&self) -> &DbPool {
        &self.write
    }
}
