pub mod headers;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;

use std::fmt;

use crate::http::status::HttpStatus;

/// The only protocol version this server speaks.
pub const HTTP_VERSION: &str = "HTTP/1.1";

/// Routable HTTP methods.
/// Anything else on the request line is rejected by the
/// [`parser`] before it reaches the router.
#[derive(PartialEq, Eq, Hash, Debug, Clone, Copy)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Patch,
    Delete,
    Options,
}

impl HttpMethod {
    pub fn from_token(method: &str) -> Option<HttpMethod> {
        match method {
            "GET" => Some(HttpMethod::Get),
            "PUT" => Some(HttpMethod::Put),
            "POST" => Some(HttpMethod::Post),
            "PATCH" => Some(HttpMethod::Patch),
            "DELETE" => Some(HttpMethod::Delete),
            "OPTIONS" => Some(HttpMethod::Options),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
        }
    }

    /// Status written when a handler for this method completes normally.
    pub fn success_status(&self) -> HttpStatus {
        match self {
            HttpMethod::Post => HttpStatus::Created,
            _ => HttpStatus::Ok,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
