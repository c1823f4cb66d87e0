//! In-process request dispatch.

use crate::message::{Request, Response};
use std::sync::Arc;

/// A server that can answer requests without a network hop.
///
/// Implemented by the sync server so tests and embedded deployments can
/// route a client straight into the handler.
pub trait LoopbackServer: Send + Sync {
    /// Handles one request.
    fn handle_request(&self, request: &Request) -> Response;
}

impl<S: LoopbackServer + ?Sized> LoopbackServer for Arc<S> {
    fn handle_request(&self, request: &Request) -> Response {
        (**self).handle_request(request)
    }
}
