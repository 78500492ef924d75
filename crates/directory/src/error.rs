//! Directory call failures, tagged transient or permanent.
//!
//! Every failure carries an [`ErrorKind`]; whether it is retryable follows
//! from the kind alone (see [`ErrorKind::is_transient`]). Adapters classify
//! through [`DirectoryError::classify`] or [`DirectoryError::from_status`] so
//! the table below is the only place the decision is made.
//!
//! | kind           | source                    | class     |
//! |----------------|---------------------------|-----------|
//! | `rate_limited` | HTTP 429                  | transient |
//! | `timeout`      | HTTP 408, client timeout  | transient |
//! | `server_error` | HTTP 5xx                  | transient |
//! | `network`      | connection failure        | transient |
//! | `bad_request`  | HTTP 400, 422             | permanent |
//! | `unauthorized` | HTTP 401                  | permanent |
//! | `forbidden`    | HTTP 403                  | permanent |
//! | `not_found`    | HTTP 404                  | permanent |
//! | `conflict`     | HTTP 409                  | permanent |
//! | `other`        | anything else             | permanent |

use serde::Serialize;
use thiserror::Error;

pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RateLimited,
    Timeout,
    ServerError,
    Network,
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Other,
}

impl ErrorKind {
    pub fn from_status(status: u16) -> Self {
        match status {
            429 => ErrorKind::RateLimited,
            408 => ErrorKind::Timeout,
            400 | 422 => ErrorKind::BadRequest,
            401 => ErrorKind::Unauthorized,
            403 => ErrorKind::Forbidden,
            404 => ErrorKind::NotFound,
            409 => ErrorKind::Conflict,
            500..=599 => ErrorKind::ServerError,
            _ => ErrorKind::Other,
        }
    }

    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::Timeout | ErrorKind::ServerError | ErrorKind::Network
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Network => "network",
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Other => "other",
        }
    }
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DirectoryError {
    /// Retry-eligible failure (rate limit, timeout, transient server error).
    #[error("transient directory error ({kind}): {message}")]
    Transient { kind: ErrorKind, message: String },

    /// Failure that will not go away by retrying.
    #[error("permanent directory error ({kind}): {message}")]
    Permanent { kind: ErrorKind, message: String },
}

impl DirectoryError {
    /// Build an error whose class follows from `kind`.
    pub fn classify(kind: ErrorKind, message: impl Into<String>) -> Self {
        let message = message.into();
        if kind.is_transient() {
            DirectoryError::Transient { kind, message }
        } else {
            DirectoryError::Permanent { kind, message }
        }
    }

    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::classify(ErrorKind::from_status(status), message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::classify(ErrorKind::RateLimited, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::classify(ErrorKind::NotFound, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::classify(ErrorKind::BadRequest, message)
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DirectoryError::Transient { kind, .. } | DirectoryError::Permanent { kind, .. } => *kind,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            DirectoryError::Transient { message, .. } | DirectoryError::Permanent { message, .. } => {
                message
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, DirectoryError::Transient { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_classification_table() {
        let cases = [
            (429, ErrorKind::RateLimited, true),
            (408, ErrorKind::Timeout, true),
            (500, ErrorKind::ServerError, true),
            (502, ErrorKind::ServerError, true),
            (503, ErrorKind::ServerError, true),
            (504, ErrorKind::ServerError, true),
            (400, ErrorKind::BadRequest, false),
            (422, ErrorKind::BadRequest, false),
            (401, ErrorKind::Unauthorized, false),
            (403, ErrorKind::Forbidden, false),
            (404, ErrorKind::NotFound, false),
            (409, ErrorKind::Conflict, false),
            (418, ErrorKind::Other, false),
        ];

        for (status, kind, retryable) in cases {
            let err = DirectoryError::from_status(status, "boom");
            assert_eq!(err.kind(), kind, "status {status}");
            assert_eq!(err.is_retryable(), retryable, "status {status}");
        }
    }

    #[test]
    fn network_failures_are_transient() {
        let err = DirectoryError::classify(ErrorKind::Network, "connection reset");
        assert!(err.is_retryable());
        assert_eq!(err.message(), "connection reset");
    }

    #[test]
    fn display_includes_kind() {
        let err = DirectoryError::not_found("no such sku");
        assert_eq!(err.to_string(), "permanent directory error (not_found): no such sku");
    }
}
