//! Customer requests and their handlers.
//!
//! Gets and lists go through the read context; creates, renames and deletes
//! stage a single mutation and commit it before responding. A rename loads
//! the row it changes through the write connection, since the read store
//! may lag behind it. Renames and deletes carry the version the caller last
//! saw and fail with `DataError::ConcurrencyConflict` when the row has moved
//! on.

mod handlers;
mod model;

pub use handlers::{
    CreateCustomer, CreateCustomerHandler, DeleteCustomer, DeleteCustomerHandler, GetCustomer,
    GetCustomerHandler, ListCustomers, ListCustomersHandler, RenameCustomer,
    RenameCustomerHandler,
};
pub use model::{Customer, CustomerDto};

use crate::dispatch::{DispatchError, DispatcherBuilder};

/// DDL for the `customers` table. Idempotent.
pub const SCHEMA: &str = include_str!("schema.sql");

/// Registers every customer handler.
///
/// # Errors
///
/// Returns `DispatchError::DuplicateHandler` if any customer request type
/// already has a handler in `builder`.
pub fn register(builder: DispatcherBuilder) -> Result<DispatcherBuilder, DispatchError> {
    builder
        .register(GetCustomerHandler)?
        .register(ListCustomersHandler)?
        .register(CreateCustomerHandler)?
        .register(RenameCustomerHandler)?
        .register(DeleteCustomerHandler)
}
