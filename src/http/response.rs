use std::time::SystemTime;

use crate::http::HTTP_VERSION;
use crate::http::headers::HttpHeaders;
use crate::http::status::{HttpStatus, reason_phrase};

pub enum ResponseHeader {
    Date,
    ContentType,
    ContentLength,
    Connection,
}

#[derive(Debug)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HttpHeaders,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Builds a response carrying the full header set this server always emits.
    /// `Content-Length` is computed from the in-memory body.
    pub fn new(status: HttpStatus, content_type: &str, body: String) -> Self {
        Self::with_code(status.code(), content_type, body)
    }

    pub fn with_code(status: u16, content_type: &str, body: String) -> Self {
        let mut res = Self {
            status,
            headers: HttpHeaders::new(),
            body: body.into_bytes(),
        };

        res.set_header(ResponseHeader::Date, &httpdate::fmt_http_date(SystemTime::now()));
        res.set_header(ResponseHeader::ContentType, content_type);
        res.set_header(ResponseHeader::ContentLength, &res.body.len().to_string());
        res.set_header(ResponseHeader::Connection, "keep-alive");
        res
    }

    pub fn set_header(&mut self, h: ResponseHeader, value: &str) {
        let name = match h {
            ResponseHeader::Date => "Date",
            ResponseHeader::ContentType => "Content-Type",
            ResponseHeader::ContentLength => "Content-Length",
            ResponseHeader::Connection => "Connection",
        };

        self.headers.set_raw(name, value);
    }

    pub fn build_headers(&self) -> String {
        // HTTP/1.1 <status> <reason>\r\n
        // <header_name>: <header_value>\r\n
        // ...
        // \r\n
        format!(
            "{} {} {}\r\n{}\r\n",
            HTTP_VERSION,
            self.status,
            reason_phrase(self.status),
            self.headers.stringify(),
        )
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = self.build_headers().into_bytes();
        out.extend_from_slice(&self.body);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_format_has_headers_in_order() {
        let res = HttpResponse::new(HttpStatus::Created, "application/json", "{\"a\":1}".into());
        let text = String::from_utf8(res.to_bytes()).unwrap();

        let mut lines = text.split("\r\n");
        assert_eq!(lines.next(), Some("HTTP/1.1 201 Created"));
        assert!(lines.next().unwrap().starts_with("Date: "));
        assert_eq!(lines.next(), Some("Content-Type: application/json"));
        assert_eq!(lines.next(), Some("Content-Length: 7"));
        assert_eq!(lines.next(), Some("Connection: keep-alive"));
        assert_eq!(lines.next(), Some(""));
        assert_eq!(lines.next(), Some("{\"a\":1}"));
    }

    #[test]
    fn date_header_is_rfc1123() {
        let res = HttpResponse::new(HttpStatus::Ok, "text/plain", String::new());
        let date = res.headers.get("Date").unwrap();
        assert!(httpdate::parse_http_date(date).is_ok());
        assert!(date.ends_with(" GMT"));
    }

    #[test]
    fn content_length_counts_bytes_not_chars() {
        let res = HttpResponse::new(HttpStatus::Ok, "text/plain", "héllo".into());
        assert_eq!(res.headers.get("Content-Length").map(String::as_str), Some("6"));
    }

    #[test]
    fn unknown_code_keeps_empty_reason() {
        let res = HttpResponse::with_code(299, "text/plain", String::new());
        assert!(res.build_headers().starts_with("HTTP/1.1 299 \r\n"));
    }
}
