use thiserror::Error;

/// Crate-wide error taxonomy.
///
/// Leaf-level entity operations (one channel, one role, one message) catch
/// these locally and degrade; only precondition failures and top-level
/// sequencing errors abort a restore.
#[derive(Debug, Error)]
pub enum Error {
    /// A required capability to read or write the workspace is missing.
    /// Fatal: the restore does not start, or aborts as a whole.
    #[error("precondition failed: {0}")]
    Precondition(String),

    /// A requested snapshot or entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The remote service answered with a non-success status.
    #[error("remote service error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// Transport-level failure talking to the remote service.
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A snapshot document could not be encoded or decoded.
    #[error("invalid snapshot document: {0}")]
    Snapshot(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
