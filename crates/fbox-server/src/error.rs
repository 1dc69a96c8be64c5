use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use fbox_blob::BlobError;
use fbox_meta::MetaError;
use fbox_push::PushError;
use fbox_types::{BlobHash, TypeError};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("box not found: {0}")]
    BoxNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("Content-Length header is required")]
    LengthRequired,

    #[error("blob of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: u64, limit: u64 },

    #[error(transparent)]
    Push(#[from] PushError),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<TypeError> for ServerError {
    fn from(e: TypeError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

fn meta_status(e: &MetaError) -> StatusCode {
    match e {
        MetaError::BoxExists { .. } | MetaError::CommitExists(_) | MetaError::Conflict { .. } => {
            StatusCode::CONFLICT
        }
        MetaError::BoxNotFound(_) | MetaError::CommitNotFound(_) => StatusCode::NOT_FOUND,
        MetaError::InvalidBranchName { .. } | MetaError::InvalidRecord(_) => {
            StatusCode::BAD_REQUEST
        }
        MetaError::Corrupt(_) | MetaError::Database(_) | MetaError::LockPoisoned(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn blob_status(e: &BlobError) -> StatusCode {
    match e {
        BlobError::Truncated { .. } | BlobError::DigestMismatch { .. } => StatusCode::BAD_REQUEST,
        BlobError::Io(_) | BlobError::LockPoisoned(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::BoxNotFound(_) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::LengthRequired => StatusCode::LENGTH_REQUIRED,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Push(e) => match e {
                PushError::BadRequest(_) => StatusCode::BAD_REQUEST,
                PushError::MissingBlobs(_) => StatusCode::UNPROCESSABLE_ENTITY,
                PushError::Conflict { .. } => StatusCode::CONFLICT,
                PushError::Blob(e) => blob_status(e),
                PushError::Meta(e) => meta_status(e),
            },
            Self::Meta(e) => meta_status(e),
            Self::Blob(e) => blob_status(e),
            Self::Config(_) | Self::Io(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn missing(&self) -> Option<&[BlobHash]> {
        match self {
            Self::Push(PushError::MissingBlobs(missing)) => Some(missing),
            _ => None,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
            let body = json!({ "error": "internal server error" });
            return (status, Json(body)).into_response();
        }

        let body = match self.missing() {
            Some(missing) => json!({ "error": self.to_string(), "missing": missing }),
            None => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;
    use fbox_types::{BoxId, CommitId};

    #[test]
    fn status_mapping() {
        let cases: Vec<(ServerError, StatusCode)> = vec![
            (ServerError::BoxNotFound("x".into()), StatusCode::NOT_FOUND),
            (ServerError::LengthRequired, StatusCode::LENGTH_REQUIRED),
            (
                ServerError::PayloadTooLarge { size: 2, limit: 1 },
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                PushError::MissingBlobs(vec![]).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PushError::Conflict {
                    branch: "main".into(),
                    commit_id: CommitId::from("c"),
                    current: None,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                MetaError::BoxExists {
                    namespace: "global".into(),
                    name: "demo".into(),
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                MetaError::BoxNotFound(BoxId::from("b")).into(),
                StatusCode::NOT_FOUND,
            ),
            (
                BlobError::Truncated {
                    hash: BlobHash::parse("aa").unwrap(),
                    expected: 3,
                    actual: 1,
                }
                .into(),
                StatusCode::BAD_REQUEST,
            ),
            (
                MetaError::Corrupt("bad".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                TypeError::InvalidVisibility("secret".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status(), status, "{err}");
        }
    }

    #[test]
    fn server_errors_hide_details() {
        let response = ServerError::Internal("secret path /var/db".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
