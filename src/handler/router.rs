//! Endpoint registration and lookup.
//!
//! Routes are exact `(method, path)` pairs registered once through
//! [`RouteTableBuilder`]; there is no pattern matching. The finished
//! [`RouteTable`] is immutable and shared read-only between connections.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::handler::value::{ParamType, Value};
use crate::http::HttpMethod;

pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type Handler = Arc<dyn Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync>;

/// Where a handler argument comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingKind {
    Body,
    /// Next positional query value.
    QueryParam,
    /// Named request header, matched case-sensitively.
    Header(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterBinding {
    pub kind: BindingKind,
    pub target: ParamType,
}

impl ParameterBinding {
    pub fn body(target: ParamType) -> Self {
        Self {
            kind: BindingKind::Body,
            target,
        }
    }

    pub fn query(target: ParamType) -> Self {
        Self {
            kind: BindingKind::QueryParam,
            target,
        }
    }

    pub fn header(name: &str, target: ParamType) -> Self {
        Self {
            kind: BindingKind::Header(name.to_string()),
            target,
        }
    }
}

pub struct EndpointDescriptor {
    pub method: HttpMethod,
    pub path: String,
    pub handler: Handler,
    pub parameters: Vec<ParameterBinding>,
}

impl fmt::Debug for EndpointDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EndpointDescriptor")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
pub struct RouteTable {
    routes: HashMap<HttpMethod, HashMap<String, EndpointDescriptor>>,
}

impl RouteTable {
    pub fn builder() -> RouteTableBuilder {
        RouteTableBuilder::default()
    }

    pub fn lookup(&self, method: HttpMethod, path: &str) -> Option<&EndpointDescriptor> {
        self.routes.get(&method)?.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.values().map(HashMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
pub struct RouteTableBuilder {
    table: RouteTable,
}

impl RouteTableBuilder {
    /// Registers `handler` for `method path`. Registering the same pair
    /// again replaces the earlier endpoint.
    pub fn route<F>(
        mut self,
        method: HttpMethod,
        path: &str,
        parameters: Vec<ParameterBinding>,
        handler: F,
    ) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        let endpoint = EndpointDescriptor {
            method,
            path: path.to_string(),
            handler: Arc::new(handler),
            parameters,
        };

        let previous = self
            .table
            .routes
            .entry(method)
            .or_default()
            .insert(path.to_string(), endpoint);
        if previous.is_some() {
            log::warn!("endpoint {method} {path} registered twice, keeping the last one");
        }
        self
    }

    pub fn get<F>(self, path: &str, parameters: Vec<ParameterBinding>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Get, path, parameters, handler)
    }

    pub fn put<F>(self, path: &str, parameters: Vec<ParameterBinding>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Put, path, parameters, handler)
    }

    pub fn post<F>(self, path: &str, parameters: Vec<ParameterBinding>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Post, path, parameters, handler)
    }

    pub fn patch<F>(self, path: &str, parameters: Vec<ParameterBinding>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Patch, path, parameters, handler)
    }

    pub fn delete<F>(self, path: &str, parameters: Vec<ParameterBinding>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Delete, path, parameters, handler)
    }

    pub fn options<F>(self, path: &str, parameters: Vec<ParameterBinding>, handler: F) -> Self
    where
        F: Fn(Vec<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.route(HttpMethod::Options, path, parameters, handler)
    }

    pub fn build(self) -> RouteTable {
        self.table
    }
}
