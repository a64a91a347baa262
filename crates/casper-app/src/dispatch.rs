//! Routes requests to their one registered handler.
//!
//! The registry is a map from the request's `TypeId` to a type-erased
//! handler. It is filled once through [`DispatcherBuilder`] at startup and
//! never changes afterwards; [`Dispatcher`] is cheap to share behind an
//! `Arc`.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;

use async_trait::async_trait;
use casper_db::{CancelSignal, DataStores};
use thiserror::Error;
use tracing::Instrument;

use crate::handler::{Handler, HandlerError, Request};
use crate::scope::HandlerScope;

/// Routing and contract failures. These are programming or configuration
/// defects, never user errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    /// No handler is registered for the request type.
    #[error("no handler registered for {request}")]
    NoHandler {
        /// Request type name.
        request: &'static str,
    },

    /// A second handler was registered for the same request type.
    #[error("a handler for {request} is already registered")]
    DuplicateHandler {
        /// Request type name.
        request: &'static str,
    },

    /// The handler returned `Ok` with mutations still staged.
    #[error("handler for {request} returned with {pending} uncommitted mutations")]
    UncommittedWork {
        /// Request type name.
        request: &'static str,
        /// Mutations left in the unit of work.
        pending: usize,
    },

    /// The erased handler received or produced a value of the wrong type.
    #[error("handler for {request} saw an unexpected request or response type")]
    TypeMismatch {
        /// Request type name.
        request: &'static str,
    },
}

type AnyBox = Box<dyn Any + Send>;

#[async_trait]
trait ErasedHandler: Send + Sync {
    async fn handle_any(
        &self,
        request: AnyBox,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<AnyBox, HandlerError>;
}

struct Erased<H>(H);

#[async_trait]
impl<H: Handler> ErasedHandler for Erased<H> {
    async fn handle_any(
        &self,
        request: AnyBox,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<AnyBox, HandlerError> {
        let request = request
            .downcast::<H::Request>()
            .map_err(|_| DispatchError::TypeMismatch {
                request: type_name::<H::Request>(),
            })?;
        let response = self.0.handle(*request, scope, cancel).await?;
        Ok(Box::new(response))
    }
}

/// Collects handlers before the dispatcher is built.
#[derive(Default)]
pub struct DispatcherBuilder {
    handlers: HashMap<TypeId, Box<dyn ErasedHandler>>,
}

impl DispatcherBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for its request type.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::DuplicateHandler` if that request type
    /// already has a handler.
    pub fn register<H: Handler>(mut self, handler: H) -> Result<Self, DispatchError> {
        let request = type_name::<H::Request>();
        let key = TypeId::of::<H::Request>();
        if self.handlers.contains_key(&key) {
            return Err(DispatchError::DuplicateHandler { request });
        }
        self.handlers.insert(key, Box::new(Erased(handler)));
        tracing::debug!(request, "registered handler");
        Ok(self)
    }

    /// Freezes the registry.
    pub fn build(self, stores: DataStores) -> Dispatcher {
        tracing::info!(handlers = self.handlers.len(), "dispatcher ready");
        Dispatcher {
            handlers: self.handlers,
            stores,
        }
    }
}

/// Immutable request router.
pub struct Dispatcher {
    handlers: HashMap<TypeId, Box<dyn ErasedHandler>>,
    stores: DataStores,
}

impl Dispatcher {
    /// Whether a handler is registered for `R`.
    pub fn handles<R: Request>(&self) -> bool {
        self.handlers.contains_key(&TypeId::of::<R>())
    }

    /// Routes `request` to its handler inside a fresh [`HandlerScope`].
    ///
    /// The handler is resolved before any connection is checked out, so an
    /// unroutable request never touches either store.
    ///
    /// # Errors
    ///
    /// - `DispatchError::NoHandler` if `R` has no handler.
    /// - `DispatchError::UncommittedWork` if the handler returned `Ok`
    ///   without committing what it staged; the staged work is discarded.
    /// - Whatever the handler returns (`Data`, `Validation`).
    pub async fn send<R: Request>(
        &self,
        request: R,
        cancel: &CancelSignal,
    ) -> Result<R::Response, HandlerError> {
        let name = type_name::<R>();
        let handler = self
            .handlers
            .get(&TypeId::of::<R>())
            .ok_or(DispatchError::NoHandler { request: name })?;

        let span = tracing::debug_span!("dispatch", request = name);
        async move {
            let mut scope = HandlerScope::open(&self.stores).await?;
            let res = handler.handle_any(Box::new(request), &mut scope, cancel).await;

            let response = match res {
                Ok(response) => response,
                Err(e) => {
                    tracing::debug!(error = %e, "handler failed");
                    return Err(e);
                }
            };

            if scope.write.has_pending() {
                let pending = scope.write.discard();
                tracing::error!(pending, "handler returned without committing");
                return Err(DispatchError::UncommittedWork {
                    request: name,
                    pending,
                }
                .into());
            }

            response
                .downcast::<R::Response>()
                .map(|response| *response)
                .map_err(|_| DispatchError::TypeMismatch { request: name }.into())
        }
        .instrument(span)
        .await
    }
}
