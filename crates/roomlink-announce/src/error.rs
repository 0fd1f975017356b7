//! Error types for the announce layer.

/// Errors from an [`AnnounceSession`](crate::AnnounceSession) or a
/// [`DirectoryBackend`](crate::DirectoryBackend).
#[derive(Debug, thiserror::Error)]
pub enum AnnounceError {
    /// `start` was called on a session that is already announcing.
    #[error("announce session already running")]
    AlreadyRunning,

    /// `stop` was called on a session that isn't announcing.
    #[error("announce session not running")]
    NotRunning,

    /// The backend has no endpoint to talk to.
    #[error("directory endpoint is not configured")]
    NoEndpoint,

    /// Publishing and deleting need a username and token.
    #[error("directory credentials are not configured")]
    MissingCredentials,

    /// The directory answered with an error status.
    #[error("directory returned status {0}")]
    Status(u16),

    /// The directory answered with something other than JSON.
    #[error("directory returned unexpected content type {0:?}")]
    UnexpectedContentType(String),

    /// The directory's reply didn't have the expected shape.
    #[error("malformed directory reply: {0}")]
    Json(#[from] serde_json::Error),

    /// The request never got an answer.
    #[cfg(feature = "web")]
    #[error("directory request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A helper thread couldn't be started.
    #[error("could not start announce thread: {0}")]
    Spawn(#[source] std::io::Error),
}
