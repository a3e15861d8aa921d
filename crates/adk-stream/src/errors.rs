use thiserror::Error;

/// Errors surfaced by a streaming exchange. Only these reach the user; decode and
/// formatting problems inside the stream are absorbed before they get here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Stream processing error: {0}")]
    Body(#[source] reqwest::Error),

    #[error("Message must contain either text or files")]
    EmptyMessage,

    #[error("Exchange was cancelled before the stream finished")]
    Cancelled,

    #[error("Message state error: {0}")]
    State(#[from] AccumulatorError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type ChatResult<T> = Result<T, ChatError>;

/// Lifecycle violations on the message accumulator. These indicate a sequencing bug in
/// the caller rather than anything the remote agent did.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccumulatorError {
    #[error("message {id} is already open")]
    AlreadyOpen { id: String },

    #[error("no message has been opened")]
    NotOpen,

    #[error("message {id} is already closed")]
    AlreadyClosed { id: String },
}

#[derive(Error, Debug)]
pub enum AttachmentError {
    #[error("{name}: File size must be less than 20MB (got {size} bytes)")]
    TooLarge { name: String, size: u64 },

    #[error("File type \"{mime_type}\" ({extension}) is not supported")]
    Unsupported {
        mime_type: String,
        extension: String,
    },

    #[error("Failed to read file {name}: {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}
