use crate::connectors::ConnectorError;
use actix_web::{error::ResponseError, http::StatusCode, HttpResponse};
use serde_json::json;

/// Failures of the conversation and ingestion pipelines, as seen by callers.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    UnsupportedFileType(String),
    #[error("{0}")]
    FileTooLarge(String),
    #[error("{0}")]
    InvalidRole(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    BlobExpired(String),
    #[error("{0}")]
    Extraction(String),
    #[error("{0}")]
    Upstream(String),
    #[error("{0}")]
    UpstreamStream(String),
    #[error("{0}")]
    UpstreamFormat(String),
    #[error("{0}")]
    UpstreamTimeout(String),
    #[error("{0}")]
    Storage(String),
    #[error("{0}")]
    Cache(String),
}

impl ChatError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::UnsupportedFileType(_) => "unsupported_file_type",
            Self::FileTooLarge(_) => "file_too_large",
            Self::InvalidRole(_) => "invalid_role",
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::BlobExpired(_) => "blob_expired",
            Self::Extraction(_) => "extraction_error",
            Self::Upstream(_) => "upstream_error",
            Self::UpstreamStream(_) => "upstream_stream_error",
            Self::UpstreamFormat(_) => "upstream_format_error",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::Storage(_) => "storage_error",
            Self::Cache(_) => "cache_error",
        }
    }

    pub fn chat_not_found() -> Self {
        Self::NotFound("Chat not found".to_string())
    }

    /// Connector failure that happened while a reply was being streamed.
    pub fn from_stream(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Timeout(msg) => Self::UpstreamTimeout(msg),
            ConnectorError::InvalidRole(msg) => Self::InvalidRole(msg),
            other => Self::UpstreamStream(other.to_string()),
        }
    }
}

impl From<ConnectorError> for ChatError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Timeout(msg) => Self::UpstreamTimeout(msg),
            ConnectorError::InvalidRole(msg) => Self::InvalidRole(msg),
            ConnectorError::StreamInterrupted(msg) => Self::UpstreamStream(msg),
            other => Self::Upstream(other.to_string()),
        }
    }
}

impl ResponseError for ChatError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_)
            | Self::UnsupportedFileType(_)
            | Self::FileTooLarge(_)
            | Self::InvalidRole(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BlobExpired(_) => StatusCode::GONE,
            Self::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Upstream(_) | Self::UpstreamStream(_) | Self::UpstreamFormat(_) => {
                StatusCode::BAD_GATEWAY
            }
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Cache(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(json!({
            "status": "Error",
            "code": status.as_u16(),
            "kind": self.kind(),
            "message": self.to_string(),
        }))
    }
}
