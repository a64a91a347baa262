//! The request/response handler contract.

use async_trait::async_trait;
use casper_db::{CancelSignal, DataError};
use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::scope::HandlerScope;

/// A typed request. The associated `Response` fixes the pairing.
pub trait Request: Send + 'static {
    /// What a successful handler returns for this request.
    type Response: Send + 'static;
}

/// Errors a dispatched request can end in.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// A read or write context failed. Propagated unchanged.
    #[error(transparent)]
    Data(#[from] DataError),

    /// The request was rejected before either context was used.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The dispatcher could not route the request, or the handler broke the
    /// commit-before-return rule.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

impl HandlerError {
    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        HandlerError::Validation(message.into())
    }

    /// Whether this is a cancellation rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, HandlerError::Data(DataError::Cancelled))
    }
}

/// Handles exactly one request type.
///
/// Handlers are stateless. Everything a call needs (mapper, write context,
/// read context) arrives in the [`HandlerScope`], which the dispatcher
/// opens before the call and releases right after it.
///
/// A handler that stages writes must commit them before returning `Ok`.
/// Every context call takes `cancel`, so a cancelled request stops at the
/// next read or write and never commits.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// The request type this handler is registered for.
    type Request: Request;

    /// Handles one request.
    async fn handle(
        &self,
        request: Self::Request,
        scope: &mut HandlerScope,
        cancel: &CancelSignal,
    ) -> Result<<Self::Request as Request>::Response, HandlerError>;
}
