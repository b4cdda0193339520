#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpStatus {
    Ok = 200,
    Created = 201,

    BadRequest = 400,
    NotFound = 404,
    RequestTimeout = 408,
    PayloadTooLarge = 413,
    TooManyRequests = 429,

    InternalServerError = 500,
    HttpVersionNotSupported = 505,
}

impl HttpStatus {
    pub fn code(self) -> u16 {
        self as u16
    }
}

/// Reason phrase for a numeric status code, empty when the code is unknown.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",

        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        204 => "No Content",

        301 => "Moved Permanently",
        302 => "Found",
        304 => "Not Modified",

        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        408 => "Request Timeout",
        411 => "Length Required",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        429 => "Too Many Requests",

        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        505 => "HTTP Version Not Supported",
        _ => "",
    }
}
