use std::borrow::Cow;

use crate::http::HttpMethod;
use crate::http::headers::HttpHeaders;

/// First line of a request, split into its three tokens.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestLine {
    pub method: HttpMethod,
    pub path: String,
    pub query: Option<String>,
}

/// A fully read request, alive for one request/response cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub path: String,

    /// Query values in order of appearance. Names are dropped: handlers bind
    /// these positionally.
    pub query_values: Vec<String>,

    pub headers: HttpHeaders,
    pub body: String,
}

impl HttpRequest {
    pub fn new(line: RequestLine, headers: HttpHeaders, body: String) -> Self {
        Self {
            method: line.method,
            query_values: line.query.as_deref().map(query_values).unwrap_or_default(),
            path: line.path,
            headers,
            body,
        }
    }
}

/// Splits a request target into its path and optional query.
/// A `#fragment` is never sent by conforming clients and is dropped if present.
pub fn split_target(target: &str) -> (String, Option<String>) {
    let target = target.split_once('#').map_or(target, |(t, _)| t);
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    }
}

/// Extracts the value half of every `name=value` pair.
///
/// Empty segments (`a=1&&b=2`) are skipped, a segment without `=` yields an
/// empty value, and values are percent-decoded when they decode cleanly.
pub fn query_values(query: &str) -> Vec<String> {
    query
        .split('&')
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let raw = segment.split_once('=').map_or("", |(_, v)| v);
            urlencoding::decode(raw)
                .unwrap_or(Cow::Borrowed(raw))
                .into_owned()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn target_without_query() {
        assert_eq!(split_target("/food/hot-dog"), ("/food/hot-dog".into(), None));
    }

    #[test]
    fn target_with_query_and_fragment() {
        let (path, query) = split_target("/a?x=1&y=2#top");
        assert_eq!(path, "/a");
        assert_eq!(query.as_deref(), Some("x=1&y=2"));
    }

    #[test]
    fn query_values_ignore_names() {
        assert_eq!(query_values("sauce=mustard&burnt=false"), vec!["mustard", "false"]);
        assert_eq!(query_values("y=1&x=2"), vec!["1", "2"]);
    }

    #[test]
    fn query_values_edge_cases() {
        assert_eq!(query_values("a=1&&flag&b="), vec!["1", "", ""]);
        assert_eq!(query_values("q=hot%20dog"), vec!["hot dog"]);
        assert_eq!(query_values("k=a=b"), vec!["a=b"]);
        assert!(query_values("").is_empty());
    }
}
