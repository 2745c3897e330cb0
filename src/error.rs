//! Error types shared by the access and table engines.

/// Error type for adminkit operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    // Auth errors
    #[error("Unauthorized")]
    Unauthorized,

    #[error("Token expired")]
    TokenExpired,

    #[error("Forbidden: {path}")]
    Forbidden { path: String },

    // Table errors
    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Invalid column order: {0}")]
    InvalidColumnOrder(String),

    #[error("Page {index} is out of range ({page_count} pages)")]
    PageOutOfRange { index: usize, page_count: usize },

    #[error("Invalid page size: {0}")]
    InvalidPageSize(usize),

    #[error("Stale response for request {seq}")]
    StaleResponse { seq: u64 },

    // Transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected status {0}")]
    Status(u16),

    #[error("Request timed out")]
    Timeout,

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    // System errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JWT error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the error was caused by the caller rather than the environment.
    pub fn is_client_error(&self) -> bool {
        match self {
            Error::Unauthorized
            | Error::TokenExpired
            | Error::Forbidden { .. }
            | Error::UnknownColumn(_)
            | Error::InvalidColumnOrder(_)
            | Error::PageOutOfRange { .. }
            | Error::InvalidPageSize(_)
            | Error::StaleResponse { .. } => true,

            // A 4xx from the backend is still our request's fault
            Error::Status(code) => (400..500).contains(code),

            Error::Http(_)
            | Error::Timeout
            | Error::Config(_)
            | Error::Io(_)
            | Error::Json(_)
            | Error::Jwt(_)
            | Error::Internal(_) => false,
        }
    }
}

/// Result type alias using adminkit's Error.
pub type Result<T> = std::result::Result<T, Error>;
