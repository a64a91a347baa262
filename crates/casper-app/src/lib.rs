//! Request handling for Casper.
//!
//! Callers build a typed [`Request`] and hand it to a [`Dispatcher`], which
//! routes it to the one [`Handler`] registered for that request type. The
//! handler runs inside a [`HandlerScope`] holding a fresh read context,
//! write context and [`Mapper`], all released when the handler returns.
//!
//! ```rust,ignore
//! let dispatcher = customers::register(DispatcherBuilder::new())?.build(stores);
//! let created = dispatcher
//!     .send(CreateCustomer { name: "Ann".into(), email: None }, &CancelSignal::new())
//!     .await?;
//! ```

pub mod customers;
mod dispatch;
mod handler;
mod scope;

pub use dispatch::{DispatchError, Dispatcher, DispatcherBuilder};
pub use handler::{Handler, HandlerError, Request};
pub use scope::{HandlerScope, Mapper};

pub use casper_db::{CancelSignal, DataError, DataStores, QueryError};
