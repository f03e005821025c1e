//! API error type and its HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chainvote_store::StoreError;
use chainvote_types::{ApiErrorBody, ErrorCode};
use chainvote_verification::VerifyError;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid session token")]
    Unauthorized,

    #[error("admin role required")]
    Forbidden,

    #[error("invalid request: {0}")]
    BadRequest(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("the account has recorded votes; its wallet cannot change")]
    WalletLocked,

    #[error("the address is linked to another account")]
    WalletInUse,

    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Unauthorized => ErrorCode::Unauthorized,
            Self::Forbidden => ErrorCode::Forbidden,
            Self::BadRequest(_) => ErrorCode::BadRequest,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::WalletLocked => ErrorCode::WalletLocked,
            Self::WalletInUse => ErrorCode::WalletInUse,
            Self::Verify(e) => e.code(),
            Self::Store(StoreError::NotFound(_)) => ErrorCode::NotFound,
            Self::Store(_) => ErrorCode::Internal,
        }
    }
}

/// HTTP status for each wire error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::BadRequest => StatusCode::BAD_REQUEST,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::NotConfirmed | ErrorCode::WalletLocked | ErrorCode::WalletInUse => {
            StatusCode::CONFLICT
        }
        ErrorCode::WalletNotLinked
        | ErrorCode::TransactionReverted
        | ErrorCode::ReceiptMismatch
        | ErrorCode::ElectionClosed => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::LedgerUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        if code == ErrorCode::Internal {
            error!(error = %self, "request failed");
        }
        let body = ApiErrorBody {
            code,
            message: self.to_string(),
        };
        (status_for(code), Json(body)).into_response()
    }
}
