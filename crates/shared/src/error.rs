use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    RateLimited,
    Internal,
}

impl ErrorCode {
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ErrorCode::Validation,
            401 => ErrorCode::Unauthorized,
            403 => ErrorCode::Forbidden,
            404 => ErrorCode::NotFound,
            429 => ErrorCode::RateLimited,
            _ => ErrorCode::Internal,
        }
    }
}

/// Error reported by the server for a non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Builds the error from a response status and its (possibly empty) body.
    ///
    /// The server answers failures with `{"detail": ..}`, `{"error": ..}`,
    /// `{"message": ..}` or a serializer error map; the first match wins and
    /// anything else is rendered as compact JSON.
    pub fn from_response(status: u16, body: &Value) -> Self {
        let message = ["detail", "error", "message"]
            .iter()
            .find_map(|key| body.get(key).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| body.as_str().map(str::to_string))
            .or_else(|| (!body.is_null()).then(|| body.to_string()))
            .unwrap_or_else(|| format!("request failed with status {status}"));
        Self::new(ErrorCode::from_status(status), message)
    }
}
