pub mod binder;
pub mod codec;
pub mod dispatcher;
pub mod responses;
pub mod router;
pub mod value;

use std::time::Duration;

use thiserror::Error;

use crate::handler::binder::BindingError;
use crate::handler::codec::CodecError;
use crate::handler::router::HandlerError;
use crate::http::HttpMethod;
use crate::http::status::HttpStatus;

/// Errors raised between a parsed request and its serialized result.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("no endpoint for {method} {path}")]
    RouteNotFound { method: HttpMethod, path: String },

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error("endpoint invocation failed")]
    Invocation(#[source] HandlerError),

    #[error("error serializing result from endpoint")]
    Serialization(#[source] CodecError),

    #[error("endpoint did not complete within {0:?}")]
    TimedOut(Duration),
}

impl DispatchError {
    pub fn into_http_status(&self) -> HttpStatus {
        match self {
            DispatchError::RouteNotFound { .. } => HttpStatus::NotFound,
            DispatchError::TimedOut(_) => HttpStatus::RequestTimeout,
            DispatchError::Binding(_)
            | DispatchError::Invocation(_)
            | DispatchError::Serialization(_) => HttpStatus::InternalServerError,
        }
    }

    /// Whether the connection must be dropped after reporting this error.
    pub fn closes_connection(&self) -> bool {
        matches!(self, DispatchError::TimedOut(_))
    }
}
