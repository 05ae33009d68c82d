use thiserror::Error;

/// Failures surfaced by the extraction boundary and the review commands.
#[derive(Error, Debug)]
pub enum InvoiceError {
    /// The request to the extraction service never completed.
    #[error("extraction request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The extraction service answered with a non-success status.
    #[error("extraction service returned {status}: {detail}")]
    Service {
        status: reqwest::StatusCode,
        detail: String,
    },

    /// The service answered but the body does not match the document shape.
    #[error("malformed extraction response: {0}")]
    MalformedResponse(#[from] serde_json::Error),

    /// A command referenced a line item that is not in the current snapshot.
    #[error("no line item with id {0}")]
    UnknownItem(uuid::Uuid),

    #[error("upload rejected: {0}")]
    UploadLocked(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, InvoiceError>;
