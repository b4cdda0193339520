//! A small HTTP/1.1 endpoint server written directly against TCP sockets.
//!
//! Endpoints are registered up front in a [`RouteTable`](handler::router::RouteTable)
//! and bound to request data through
//! [`ParameterBinding`](handler::router::ParameterBinding)s. The
//! [`Server`](net::server::Server) takes care of connections, keep-alive,
//! size and rate limits, and writing responses.

pub mod config;
pub mod handler;
pub mod http;
pub mod net;
