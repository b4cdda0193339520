//! HTTP headers abstraction for [`HttpRequest`](crate::http::request::HttpRequest) and
//! [`HttpResponse`](crate::http::response::HttpResponse)
//!
//! Headers are stored in an ordered map to preserve insertion order.
//! Names are kept exactly as received, so lookups are case-sensitive,
//! and setting a name twice replaces the earlier value in place.
//!
//! This abstraction does not enforce any HTTP semantics. The
//! [`parser`](crate::http::parser) decides what a well-formed header line is,
//! and [`HttpResponse`](crate::http::response::HttpResponse) decides which
//! headers a response carries.

use indexmap::IndexMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HttpHeaders {
    headers: IndexMap<String, String>,
}

impl HttpHeaders {
    pub fn new() -> Self {
        Self {
            headers: IndexMap::new(),
        }
    }

    pub fn set_raw(&mut self, name: &str, value: &str) {
        self.headers.insert(name.to_string(), value.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&String> {
        self.headers.get(name)
    }

    /// First header whose name matches `name` ignoring ASCII case.
    pub fn get_ignore_case(&self, name: &str) -> Option<&String> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn stringify(&self) -> String {
        let mut result = String::new();
        for (name, value) in &self.headers {
            result.push_str(&format!("{}: {}\r\n", name, value));
        }
        result
    }
}
