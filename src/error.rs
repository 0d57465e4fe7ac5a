use thiserror::Error;

/// Errors surfaced across the public session API.
///
/// State-machine internals never produce these; ad-side failures are
/// modelled as transitions. Only direct misuse of the query API, bad
/// configuration or unparseable names reach the caller.
#[derive(Debug, Error)]
pub enum AdsError {
    #[error("you cannot use videoElementRecycled while there is no snapshot")]
    NoSnapshot,

    #[error("unknown event type '{0}'")]
    UnknownEvent(String),

    #[error("unknown ad state '{0}'")]
    UnknownState(String),

    #[error("invalid config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures reported by a media element while it is being driven.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MediaError {
    #[error("media is not seekable yet")]
    NotSeekable,

    #[error("play request rejected: {0}")]
    PlayRejected(String),

    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
}

pub type AdsResult<T> = Result<T, AdsError>;
