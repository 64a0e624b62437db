use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapError {
    /// The remote call never produced a usable HTTP answer.
    Network(String),
    /// The exchange answered with a JSON-RPC error object.
    Rpc {
        code: i64,
        message: String,
    },
    InvalidResponse(String),
    InvalidSelection(String),
    InvalidAmount(String),
    CatalogNotLoaded,
    NoExchange,
    Internal(String),
}

impl SwapError {
    /// Whether the failure happened on the exchange side rather than in our input.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::Rpc { .. } | Self::InvalidResponse(_)
        )
    }
}

impl fmt::Display for SwapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network(msg) => write!(f, "Network failure: {}", msg),
            Self::Rpc { code, message } => {
                write!(f, "Exchange rejected request ({}): {}", code, message)
            }
            Self::InvalidResponse(msg) => write!(f, "Invalid exchange response: {}", msg),
            Self::InvalidSelection(msg) => write!(f, "Invalid selection: {}", msg),
            Self::InvalidAmount(given) => write!(f, "Invalid amount: {}", given),
            Self::CatalogNotLoaded => write!(f, "Currency catalog not loaded yet"),
            Self::NoExchange => write!(f, "No exchange has been submitted"),
            Self::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for SwapError {}

impl From<reqwest::Error> for SwapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse(err.to_string())
        } else {
            Self::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SwapError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

impl IntoResponse for SwapError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidSelection(_) | Self::InvalidAmount(_) | Self::CatalogNotLoaded => {
                StatusCode::BAD_REQUEST
            }

            Self::NoExchange => StatusCode::NOT_FOUND,

            Self::Network(_) | Self::Rpc { .. } | Self::InvalidResponse(_) => {
                StatusCode::BAD_GATEWAY
            }

            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if self.is_remote() || status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Swap error: {}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_error_message_includes_code() {
        let err = SwapError::Rpc {
            code: -32600,
            message: "Invalid amount".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Exchange rejected request (-32600): Invalid amount"
        );
        assert!(err.is_remote());
    }

    #[test]
    fn status_codes_follow_error_kind() {
        let resp = SwapError::InvalidAmount("abc".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = SwapError::NoExchange.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = SwapError::Network("connection refused".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
