//! Byte-level HTTP/1.1 request reading.
//!
//! Requests are read one CRLF-terminated line at a time. Every byte taken
//! from the connection is charged against a per-request counter owned by
//! the caller, so the request line, the headers and the body all share one
//! `max_request_bytes` budget.
//!
//! The functions here only read and split. Sequencing them (and deciding
//! whether the connection survives a failure) is the job of
//! [`net::connection`](crate::net::connection).

use async_std::io::{BufReader, Read};
use async_std::prelude::*;
use thiserror::Error;

use crate::http::headers::HttpHeaders;
use crate::http::request::{RequestLine, split_target};
use crate::http::status::HttpStatus;
use crate::http::{HTTP_VERSION, HttpMethod};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("I/O error while reading request: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("unsupported method {0:?}")]
    UnsupportedMethod(String),

    #[error("unsupported protocol version {0:?}")]
    UnsupportedVersion(String),

    #[error("missing Host header")]
    MissingHost,

    #[error("request exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("timed out waiting for request data")]
    TimedOut,
}

impl ParseError {
    pub fn into_http_status(&self) -> HttpStatus {
        match self {
            ParseError::Io(_)
            | ParseError::Malformed(_)
            | ParseError::UnsupportedMethod(_)
            | ParseError::MissingHost => HttpStatus::BadRequest,
            ParseError::UnsupportedVersion(_) => HttpStatus::HttpVersionNotSupported,
            ParseError::TooLarge { .. } => HttpStatus::PayloadTooLarge,
            ParseError::TimedOut => HttpStatus::RequestTimeout,
        }
    }
}

fn charge(consumed: &mut usize, n: usize, max_bytes: usize) -> Result<(), ParseError> {
    *consumed = consumed
        .checked_add(n)
        .ok_or(ParseError::TooLarge { limit: max_bytes })?;
    if *consumed > max_bytes {
        return Err(ParseError::TooLarge { limit: max_bytes });
    }
    Ok(())
}

/// Reads one line, returning it without its trailing `\r\n`.
///
/// Returns `Ok(None)` when the peer closed the connection before sending a
/// single byte, and `Ok(Some(""))` for the blank line ending the headers.
pub async fn read_line<R>(
    reader: &mut R,
    consumed: &mut usize,
    max_bytes: usize,
) -> Result<Option<String>, ParseError>
where
    R: Read + Unpin,
{
    let mut line = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        let n = match reader.read(&mut byte).await {
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ParseError::Io(e)),
        };

        if n == 0 {
            if line.is_empty() {
                return Ok(None);
            }
            return Err(ParseError::Malformed("connection closed mid-line".into()));
        }

        charge(consumed, 1, max_bytes)?;
        line.push(byte[0]);

        if line.ends_with(b"\r\n") {
            line.truncate(line.len() - 2);
            return String::from_utf8(line)
                .map(Some)
                .map_err(|_| ParseError::Malformed("line is not valid UTF-8".into()));
        }
    }
}

/// Request line: METHOD TARGET HTTP/VERSION
pub fn parse_request_line(line: &str) -> Result<RequestLine, ParseError> {
    let parts: Vec<&str> = line.split(' ').collect();
    if parts.len() != 3 {
        return Err(ParseError::Malformed(format!("bad request line {line:?}")));
    }

    if parts[2] != HTTP_VERSION {
        return Err(ParseError::UnsupportedVersion(parts[2].to_string()));
    }

    let method = HttpMethod::from_token(parts[0])
        .ok_or_else(|| ParseError::UnsupportedMethod(parts[0].to_string()))?;

    if parts[1].is_empty() {
        return Err(ParseError::Malformed("empty request target".into()));
    }
    let (path, query) = split_target(parts[1]);

    Ok(RequestLine {
        method,
        path,
        query,
    })
}

/// Reads header lines up to and including the blank separator line.
pub async fn read_headers<R>(
    reader: &mut R,
    consumed: &mut usize,
    max_bytes: usize,
) -> Result<HttpHeaders, ParseError>
where
    R: Read + Unpin,
{
    let mut headers = HttpHeaders::new();

    loop {
        let line = read_line(reader, consumed, max_bytes)
            .await?
            .ok_or_else(|| ParseError::Malformed("connection closed inside headers".into()))?;

        if line.is_empty() {
            break;
        }

        let (name, value) = line
            .split_once(':')
            .ok_or_else(|| ParseError::Malformed(format!("bad header line {line:?}")))?;
        headers.set_raw(name.trim(), value.trim());
    }

    if !headers.contains("Host") {
        return Err(ParseError::MissingHost);
    }

    Ok(headers)
}

/// Reads the request body.
///
/// With a `Content-Length` header (matched in any case) exactly that many
/// bytes are read. Without one, only the bytes already buffered from the
/// socket are taken; the call never waits for more.
///
/// The length is charged against the budget before anything is allocated.
pub async fn read_body<S>(
    reader: &mut BufReader<S>,
    headers: &HttpHeaders,
    consumed: &mut usize,
    max_bytes: usize,
) -> Result<String, ParseError>
where
    S: Read + Unpin,
{
    let len = match headers.get_ignore_case("Content-Length") {
        Some(value) => value
            .parse::<usize>()
            .map_err(|_| ParseError::Malformed(format!("bad Content-Length {value:?}")))?,
        None => reader.buffer().len(),
    };

    charge(consumed, len, max_bytes)?;

    let mut body = vec![0; len];
    reader.read_exact(&mut body).await?;

    String::from_utf8(body).map_err(|_| ParseError::Malformed("body is not valid UTF-8".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_std::io::Cursor;

    fn reader(raw: &str) -> BufReader<Cursor<Vec<u8>>> {
        BufReader::new(Cursor::new(raw.as_bytes().to_vec()))
    }

    #[async_std::test]
    async fn line_reader_strips_crlf_and_counts() {
        let mut r = reader("GET / HTTP/1.1\r\n\r\n");
        let mut consumed = 0;

        let line = read_line(&mut r, &mut consumed, 1024).await.unwrap();
        assert_eq!(line.as_deref(), Some("GET / HTTP/1.1"));
        assert_eq!(consumed, 16);

        let blank = read_line(&mut r, &mut consumed, 1024).await.unwrap();
        assert_eq!(blank.as_deref(), Some(""));

        let eof = read_line(&mut r, &mut consumed, 1024).await.unwrap();
        assert_eq!(eof, None);
    }

    #[async_std::test]
    async fn line_reader_fails_mid_line_over_limit() {
        let mut r = reader("GET /a-very-long-path HTTP/1.1\r\n");
        let mut consumed = 0;
        let err = read_line(&mut r, &mut consumed, 8).await.unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { limit: 8 }));
        assert_eq!(consumed, 9);
    }

    #[async_std::test]
    async fn line_reader_rejects_truncated_line() {
        let mut r = reader("GET / HT");
        let mut consumed = 0;
        let err = read_line(&mut r, &mut consumed, 1024).await.unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[test]
    fn request_line_is_split_in_three() {
        let line = parse_request_line("GET /food/hot-dog?sauce=mustard HTTP/1.1").unwrap();
        assert_eq!(line.method, HttpMethod::Get);
        assert_eq!(line.path, "/food/hot-dog");
        assert_eq!(line.query.as_deref(), Some("sauce=mustard"));
    }

    #[test]
    fn request_line_errors() {
        assert!(matches!(
            parse_request_line("GET / HTTP/1.0"),
            Err(ParseError::UnsupportedVersion(v)) if v == "HTTP/1.0"
        ));
        assert!(matches!(
            parse_request_line("HEAD / HTTP/1.1"),
            Err(ParseError::UnsupportedMethod(_))
        ));
        assert!(matches!(
            parse_request_line("GET  / HTTP/1.1"),
            Err(ParseError::Malformed(_))
        ));
        assert!(matches!(parse_request_line("GET /"), Err(ParseError::Malformed(_))));
    }

    #[async_std::test]
    async fn headers_are_trimmed_and_last_wins() {
        let mut r = reader("Host: localhost\r\nmeat :  beef \r\nmeat: pork\r\n\r\n");
        let mut consumed = 0;
        let headers = read_headers(&mut r, &mut consumed, 1024).await.unwrap();

        assert_eq!(headers.get("Host").map(String::as_str), Some("localhost"));
        assert_eq!(headers.get("meat").map(String::as_str), Some("pork"));
        assert_eq!(headers.stringify(), "Host: localhost\r\nmeat: pork\r\n");
    }

    #[async_std::test]
    async fn headers_require_host() {
        let mut r = reader("Accept: */*\r\n\r\n");
        let mut consumed = 0;
        let err = read_headers(&mut r, &mut consumed, 1024).await.unwrap_err();
        assert!(matches!(err, ParseError::MissingHost));
        assert_eq!(err.into_http_status(), HttpStatus::BadRequest);
    }

    #[async_std::test]
    async fn header_without_colon_is_malformed() {
        let mut r = reader("Host: x\r\nnonsense\r\n\r\n");
        let mut consumed = 0;
        let err = read_headers(&mut r, &mut consumed, 1024).await.unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }

    #[async_std::test]
    async fn body_honours_content_length() {
        let mut r = reader("hello world");
        let mut headers = HttpHeaders::new();
        headers.set_raw("Content-Length", "5");
        let mut consumed = 0;

        let body = read_body(&mut r, &headers, &mut consumed, 1024).await.unwrap();
        assert_eq!(body, "hello");
        assert_eq!(consumed, 5);
    }

    #[async_std::test]
    async fn body_without_length_drains_buffered_bytes() {
        let mut r = reader("Host: x\r\n\r\n{\"a\":1}");
        let mut consumed = 0;
        let headers = read_headers(&mut r, &mut consumed, 1024).await.unwrap();

        let body = read_body(&mut r, &headers, &mut consumed, 1024).await.unwrap();
        assert_eq!(body, "{\"a\":1}");
    }

    #[async_std::test]
    async fn body_shares_the_request_budget() {
        let mut r = reader("0123456789");
        let mut headers = HttpHeaders::new();
        headers.set_raw("Content-Length", "10");
        let mut consumed = 95;

        let err = read_body(&mut r, &headers, &mut consumed, 100).await.unwrap_err();
        assert_eq!(err.into_http_status(), HttpStatus::PayloadTooLarge);
    }

    #[async_std::test]
    async fn huge_content_length_is_too_large() {
        let mut r = reader("");
        let mut headers = HttpHeaders::new();
        headers.set_raw("Content-Length", &usize::MAX.to_string());
        let mut consumed = 40;

        let err = read_body(&mut r, &headers, &mut consumed, 1024).await.unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { limit: 1024 }));
        assert_eq!(err.into_http_status(), HttpStatus::PayloadTooLarge);
    }

    #[async_std::test]
    async fn content_length_name_is_matched_in_any_case() {
        let mut r = reader("hello world");
        let mut headers = HttpHeaders::new();
        headers.set_raw("content-length", "11");
        let mut consumed = 0;

        let body = read_body(&mut r, &headers, &mut consumed, 1024).await.unwrap();
        assert_eq!(body, "hello world");
    }

    #[async_std::test]
    async fn bad_content_length_is_malformed() {
        let mut r = reader("");
        let mut headers = HttpHeaders::new();
        headers.set_raw("Content-Length", "ten");
        let mut consumed = 0;

        let err = read_body(&mut r, &headers, &mut consumed, 100).await.unwrap_err();
        assert!(matches!(err, ParseError::Malformed(_)));
    }
}
