//! Error taxonomy for the service.
//!
//! Every failure mode a handler can surface is an explicit variant here, so
//! callers and tests can match on kind instead of string-matching messages.
//! The `Display` output of the recoverable variants is a user-facing contract:
//! the exact strings are preserved deliberately.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// All failure modes of the service.
#[derive(Debug, Clone)]
pub enum Error {
    /// Signup or login attempted with an empty username or password.
    EmptyFields,
    /// Signup conflict: the username is already taken.
    DuplicateUser,
    /// Login failure. Deliberately does not reveal which field was wrong.
    InvalidCredentials,
    /// A request requires an authenticated session and none was presented.
    SessionRequired,
    /// Summarize was called without an uploaded file.
    MissingFile,
    /// No API credential configured for the summarization client.
    MissingCredential,
    /// The uploaded file has an extension we do not extract text from.
    UnsupportedFormat(String),
    /// Raw bytes could not be decoded as text (e.g. invalid UTF-8 in a .txt).
    Decode(String),
    /// The PDF/DOCX extraction capability failed.
    Extraction(String),
    /// The hosted model call failed (transport, auth, quota, context length).
    Summarization(String),
    /// Credential store failure.
    Store(String),
    /// Filesystem failure (temp spool file, database directory).
    Io(String),
}

impl Error {
    /// Stable machine-readable kind, used in JSON error bodies and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::EmptyFields => "empty_fields",
            Self::DuplicateUser => "duplicate_user",
            Self::InvalidCredentials => "invalid_credentials",
            Self::SessionRequired => "session_required",
            Self::MissingFile => "missing_file",
            Self::MissingCredential => "missing_credential",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Decode(_) => "decode_error",
            Self::Extraction(_) => "extraction_error",
            Self::Summarization(_) => "summarization_error",
            Self::Store(_) => "store_error",
            Self::Io(_) => "io_error",
        }
    }

    /// HTTP status for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyFields | Self::MissingFile | Self::MissingCredential => {
                StatusCode::BAD_REQUEST
            }
            Self::DuplicateUser => StatusCode::CONFLICT,
            Self::InvalidCredentials | Self::SessionRequired => StatusCode::UNAUTHORIZED,
            Self::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Decode(_) | Self::Extraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Summarization(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) | Self::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFields => write!(f, "please fill in both fields"),
            Self::DuplicateUser => write!(f, "username already exists"),
            Self::InvalidCredentials => write!(f, "invalid username or password"),
            Self::SessionRequired => write!(f, "authentication required"),
            Self::MissingFile => write!(f, "please upload a file first"),
            Self::MissingCredential => write!(f, "please enter your api key first"),
            Self::UnsupportedFormat(_) => write!(f, "unsupported file type"),
            Self::Decode(msg) => write!(f, "failed to decode document: {}", msg),
            Self::Extraction(msg) => write!(f, "failed to extract text: {}", msg),
            Self::Summarization(msg) => write!(f, "summarization failed: {}", msg),
            Self::Store(msg) => write!(f, "credential store error: {}", msg),
            Self::Io(msg) => write!(f, "io error: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e.to_string())
    }
}

/// JSON error body returned by the HTTP surface.
#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(kind = self.kind(), "request failed: {}", self);
        } else {
            tracing::warn!(kind = self.kind(), "request rejected: {}", self);
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
