//! API error types.

use axum::extract::multipart::MultipartError;
use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use sprout_core::storage::DatabaseError;
use sprout_core::{ExportError, ImportError, ImportStage, StoreError, StoreState};

/// Seconds a client should wait before retrying while an import runs.
const RETRY_AFTER_SECS: &str = "5";

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Import stage that failed, for `import_aborted` / `import_inconsistent`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<ImportStage>,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("no archive file was attached")]
    MissingArchive,

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("store is {0}")]
    Unavailable(StoreState),

    #[error("import error: {0}")]
    Import(ImportError),

    #[error("export error: {0}")]
    Export(ExportError),

    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(state) => Self::Unavailable(state),
            StoreError::Database(e) => Self::Database(e),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(e: ImportError) -> Self {
        match e {
            ImportError::Unavailable(state) => Self::Unavailable(state),
            other => Self::Import(other),
        }
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        match e {
            ExportError::Store(StoreError::Unavailable(state)) => Self::Unavailable(state),
            other => Self::Export(other),
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(e: MultipartError) -> Self {
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(e.body_text())
        } else {
            Self::BadRequest(e.body_text())
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::from_rejection(e.status(), e.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::from_rejection(e.status(), e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::from_rejection(e.status(), e.body_text())
    }
}

impl From<MultipartRejection> for ApiError {
    fn from(e: MultipartRejection) -> Self {
        Self::from_rejection(e.status(), e.body_text())
    }
}

impl ApiError {
    /// Extractor rejections keep their size-limit status, everything else
    /// is a bad request.
    fn from_rejection(status: StatusCode, text: String) -> Self {
        if status == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(text)
        } else {
            Self::BadRequest(text)
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::MissingArchive => "missing_archive",
            Self::PayloadTooLarge(_) => "payload_too_large",
            Self::Unavailable(_) => "store_unavailable",
            Self::Import(e) => match e {
                ImportError::InvalidArchive(_) => "invalid_archive",
                ImportError::MissingDatabase => "missing_database",
                ImportError::IntegrityMismatch(_) => "integrity_mismatch",
                ImportError::UnsafeEntry(_) => "unsafe_entry",
                ImportError::Unavailable(_) => "store_unavailable",
                ImportError::Aborted { .. } => "import_aborted",
                ImportError::Inconsistent { .. } => "import_inconsistent",
            },
            Self::Export(_) => "export_failed",
            Self::Database(_) | Self::Internal(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) | Self::MissingArchive => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Import(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            Self::Import(ImportError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Import(_) | Self::Export(_) | Self::Database(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show clients. Server-side failures get a fixed text;
    /// the detail only goes to the log.
    fn public_message(&self) -> String {
        match self {
            Self::Import(ImportError::Aborted { .. }) => {
                "Import failed; the previous data was restored".to_string()
            }
            Self::Import(ImportError::Inconsistent { .. }) => {
                "Import failed and the previous data could not be fully restored; \
                 check the server log"
                    .to_string()
            }
            Self::Export(_) => "Backup export failed; check the server log".to_string(),
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::Unavailable(_) | Self::Import(ImportError::Unavailable(_)) => {
                "Store is temporarily unavailable while a backup is imported; retry shortly"
                    .to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }

        let stage = match &self {
            Self::Import(e) => e.stage(),
            _ => None,
        };
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.public_message(),
            stage,
        };

        if status == StatusCode::SERVICE_UNAVAILABLE {
            return (status, [(header::RETRY_AFTER, RETRY_AFTER_SECS)], Json(body)).into_response();
        }
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
