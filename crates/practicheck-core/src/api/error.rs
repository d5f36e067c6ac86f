use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Server { status: u16, message: String },

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Prefix of the message used when the server gave none
const GENERIC_FAILURE_PREFIX: &str = "Request failed with status";

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let cut: String = body.chars().take(MAX_ERROR_BODY_LENGTH).collect();
            format!("{}... (truncated, {} total bytes)", cut, body.len())
        }
    }

    /// Pull a human message out of an error body.
    ///
    /// Checks `detail`, then `message`, then `error`. FastAPI validation
    /// failures put a list of `{msg}` objects in `detail`; those are joined.
    pub fn extract_message(body: &str) -> Option<String> {
        let value: Value = serde_json::from_str(body).ok()?;
        ["detail", "message", "error"]
            .iter()
            .filter_map(|field| value.get(*field))
            .find_map(message_from_value)
    }

    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let message = Self::extract_message(body)
            .unwrap_or_else(|| format!("{} {}", GENERIC_FAILURE_PREFIX, status.as_u16()));
        match status.as_u16() {
            400 | 422 => ApiError::BadRequest(message),
            401 => ApiError::Unauthorized(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            500..=599 => ApiError::Server {
                status: status.as_u16(),
                message,
            },
            code => ApiError::Status {
                status: code,
                message,
            },
        }
    }

    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ApiError::InvalidRequest(err.to_string())
        } else {
            ApiError::ServiceUnavailable(err.to_string())
        }
    }

    pub fn invalid_body(body: &str, err: &serde_json::Error) -> Self {
        ApiError::InvalidResponse(format!("{}: {}", err, Self::truncate_body(body)))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::BadRequest(_) => Some(400),
            ApiError::Unauthorized(_) => Some(401),
            ApiError::Forbidden(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::Server { status, .. } | ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The message the server sent, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        let message = match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m) => m,
            ApiError::Server { message, .. } | ApiError::Status { message, .. } => message,
            _ => return None,
        };
        if message.starts_with(GENERIC_FAILURE_PREFIX) {
            None
        } else {
            Some(message)
        }
    }

    /// 401 and 403 end the session.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_) | ApiError::Forbidden(_))
    }

    /// Network failures and unusable responses; the user can only retry.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ApiError::ServiceUnavailable(_) | ApiError::InvalidResponse(_)
        )
    }

    /// The string to put in front of the user.
    pub fn user_message(&self) -> String {
        if self.is_unavailable() {
            "Service unavailable. Please try again.".to_string()
        } else {
            self.to_string()
        }
    }
}

fn message_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let parts: Vec<String> = items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    other => other.get("msg").and_then(Value::as_str).map(str::to_string),
                })
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("; "))
            }
        }
        Value::Object(_) => value.get("msg").and_then(Value::as_str).map(str::to_string),
        _ => None,
    }
}
