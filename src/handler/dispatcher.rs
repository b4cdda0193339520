use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::handler::DispatchError;
use crate::handler::binder;
use crate::handler::codec::Codec;
use crate::handler::router::RouteTable;
use crate::http::request::HttpRequest;

/// Routes a request to its endpoint and produces the serialized result.
pub struct Dispatcher {
    routes: RouteTable,
    codec: Arc<dyn Codec>,
    base_path: String,
}

impl Dispatcher {
    pub fn new(routes: RouteTable, codec: Arc<dyn Codec>, base_path: &str) -> Self {
        Self {
            routes,
            codec,
            base_path: base_path.to_string(),
        }
    }

    /// Route table key for a request path: every occurrence of the base path
    /// is removed, wherever it appears.
    pub fn route_key(&self, path: &str) -> String {
        if self.base_path.is_empty() {
            return path.to_string();
        }
        path.replace(&self.base_path, "")
    }

    pub fn dispatch(&self, req: &HttpRequest) -> Result<String, DispatchError> {
        let key = self.route_key(&req.path);
        let endpoint = self
            .routes
            .lookup(req.method, &key)
            .ok_or_else(|| DispatchError::RouteNotFound {
                method: req.method,
                path: req.path.clone(),
            })?;

        let args = binder::bind(&endpoint.parameters, req, self.codec.as_ref())?;

        let result = panic::catch_unwind(AssertUnwindSafe(|| (endpoint.handler)(args)))
            .map_err(|payload| DispatchError::Invocation(panic_message(payload).into()))?
            .map_err(DispatchError::Invocation)?;

        self.codec
            .serialize(&result)
            .map_err(DispatchError::Serialization)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("handler panicked: {s}")
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("handler panicked: {s}")
    } else {
        "handler panicked".to_string()
    }
}
