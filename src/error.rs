//! Error types for Nuntia.

use thiserror::Error;

/// Common error type for Nuntia.
#[derive(Error, Debug)]
pub enum NuntiaError {
    /// Database error.
    ///
    /// Generic wrapper for errors coming from the database backend. Errors
    /// raised while the sync pipeline writes stories use [`StoreWriteFailure`]
    /// instead.
    ///
    /// [`StoreWriteFailure`]: NuntiaError::StoreWriteFailure
    #[error("database error: {0}")]
    Database(String),

    /// Database connection error.
    #[error("database connection error: {0}")]
    DatabaseConnection(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The feed URL is malformed or not allowed.
    #[error("invalid feed URL: {0}")]
    InvalidUrl(String),

    /// Network, DNS or HTTP status failure while reaching the feed.
    #[error("feed unreachable: {0}")]
    FeedUnreachable(String),

    /// The feed request did not complete within the configured timeout.
    #[error("feed fetch timed out: {0}")]
    FetchTimeout(String),

    /// A response was received but it is not a usable RSS/Atom document.
    #[error("feed unparsable: {0}")]
    FeedUnparsable(String),

    /// The (url, owner) pair is already subscribed.
    #[error("feed already subscribed: {url}")]
    DuplicateFeedSubscription {
        /// Feed URL.
        url: String,
        /// Owner of the existing subscription.
        owner_id: Option<String>,
    },

    /// The store rejected a write for a reason other than a duplicate story.
    #[error("store write failure: {0}")]
    StoreWriteFailure(String),

    /// Another sync cycle for the same feed is still in flight.
    #[error("sync already running for feed {0}")]
    SyncAlreadyRunning(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl NuntiaError {
    /// Whether the error means the feed could not be reached at all.
    ///
    /// Timeouts count as unreachable.
    pub fn is_unreachable(&self) -> bool {
        matches!(
            self,
            NuntiaError::FeedUnreachable(_) | NuntiaError::FetchTimeout(_)
        )
    }
}

impl From<sqlx::Error> for NuntiaError {
    fn from(e: sqlx::Error) -> Self {
        NuntiaError::Database(e.to_string())
    }
}

/// Result type alias for Nuntia operations.
pub type Result<T> = std::result::Result<T, NuntiaError>;
