use std::error::Error;

use serde_json::json;

use crate::http::response::HttpResponse;
use crate::http::status::HttpStatus;

/// Status and body written in place of a handler result.
#[derive(Debug, Clone, PartialEq)]
pub struct ErrorResponse {
    pub status: HttpStatus,
    pub body: String,
}

impl ErrorResponse {
    /// Every error body has the same shape: one `message` field holding the
    /// error and, when there is one, its direct cause.
    pub fn from_error(status: HttpStatus, err: &dyn Error) -> Self {
        let mut message = format!("Encountered exception processing request: {err}");
        if let Some(cause) = err.source() {
            message.push_str(&format!(": {cause}"));
        }

        Self {
            status,
            body: json!({ "message": message }).to_string(),
        }
    }

    pub fn into_response(self, content_type: &str) -> HttpResponse {
        HttpResponse::new(self.status, content_type, self.body)
    }
}
