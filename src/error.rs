use thiserror::Error;

/// Failure of a registry request or of the client-side checks before it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Transport(String),

    #[error("HTTP {status}{}", detail_suffix(.detail))]
    Status { status: u16, detail: Option<String> },

    #[error("Invalid admin password")]
    InvalidPassword,

    #[error("Parse error: {0}")]
    Decode(String),

    #[error("{0}")]
    Validation(String),
}

/// Coarse classification used to pick how an error is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkOrServer,
    Validation,
    Auth,
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail
        .as_deref()
        .map(|d| format!(": {}", d))
        .unwrap_or_default()
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::InvalidPassword => ErrorKind::Auth,
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Transport(_) | ApiError::Status { .. } | ApiError::Decode(_) => {
                ErrorKind::NetworkOrServer
            }
        }
    }

    /// Message for the user. Server details and validation text win over
    /// the caller's generic fallback.
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            ApiError::InvalidPassword => "Invalid admin password.".to_string(),
            ApiError::Validation(msg) => msg.clone(),
            ApiError::Status {
                detail: Some(detail),
                ..
            } if !detail.is_empty() => detail.clone(),
            _ => fallback.to_string(),
        }
    }

    /// Message for operations whose failures are reported generically.
    /// Server details are ignored; validation text is still shown.
    pub fn generic_message(&self, fallback: &str) -> String {
        match self {
            ApiError::Validation(msg) => msg.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Transport(e.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind() {
        assert_eq!(ApiError::InvalidPassword.kind(), ErrorKind::Auth);
        assert_eq!(
            ApiError::Validation("x".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            ApiError::Status {
                status: 500,
                detail: None
            }
            .kind(),
            ErrorKind::NetworkOrServer
        );
        assert_eq!(
            ApiError::Transport("refused".into()).kind(),
            ErrorKind::NetworkOrServer
        );
    }

    #[test]
    fn test_user_message() {
        let with_detail = ApiError::Status {
            status: 500,
            detail: Some("disk full".into()),
        };
        assert_eq!(with_detail.user_message("Upload failed"), "disk full");

        let without_detail = ApiError::Status {
            status: 502,
            detail: None,
        };
        assert_eq!(without_detail.user_message("Upload failed"), "Upload failed");

        assert_eq!(
            ApiError::InvalidPassword.user_message("Failed to delete dataset."),
            "Invalid admin password."
        );
        assert_eq!(
            ApiError::Transport("refused".into()).user_message("fallback"),
            "fallback"
        );
    }

    #[test]
    fn test_generic_message_ignores_detail() {
        let not_found = ApiError::Status {
            status: 404,
            detail: Some("Not Found".into()),
        };
        assert_eq!(not_found.generic_message("fallback"), "fallback");
        assert_eq!(
            ApiError::InvalidPassword.generic_message("fallback"),
            "fallback"
        );
        assert_eq!(
            ApiError::Validation("Not connected".into()).generic_message("fallback"),
            "Not connected"
        );
    }

    #[test]
    fn test_display() {
        let err = ApiError::Status {
            status: 404,
            detail: Some("Dataset not found".into()),
        };
        assert_eq!(err.to_string(), "HTTP 404: Dataset not found");
        let err = ApiError::Status {
            status: 500,
            detail: None,
        };
        assert_eq!(err.to_string(), "HTTP 500");
    }
}
