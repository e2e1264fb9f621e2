//! Crate-wide error taxonomy (§7). Modeled on the teacher's per-module
//! `thiserror` enums (`library::error::LibraryError`,
//! `infrastructure::jobs::error::JobError`) — one flat enum, `#[from]` for
//! the handful of upstream error types we wrap, plain string payloads
//! everywhere else.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SkcdError>;

#[derive(Debug, Error)]
pub enum SkcdError {
    #[error("stored schema major version {stored} exceeds the version this build supports ({current})")]
    SchemaUnsupported { stored: i32, current: i32 },

    #[error("tsk_db_info is missing or unreadable: {0}")]
    SchemaCorrupt(String),

    #[error("networked case descriptor is missing a host")]
    ConnectionMissingHost,

    #[error("networked case descriptor is missing a port")]
    ConnectionMissingPort,

    #[error("networked case descriptor is missing a username")]
    ConnectionMissingUser,

    #[error("networked case descriptor is missing a password")]
    ConnectionMissingPassword,

    #[error("connection rejected by server: {0}")]
    ConnectionRejected(String),

    #[error("SSL certificate verification failed: {0}")]
    ConnectionSsl(String),

    #[error("host/port unreachable: {0}")]
    ConnectionUnreachable(String),

    #[error("authentication failed: {0}")]
    ConnectionAuth(String),

    #[error("insufficient privilege: {0}")]
    ConnectionPrivilege(String),

    #[error("server out of disk/resource: {0}")]
    ConnectionResource(String),

    #[error("server limits exceeded: {0}")]
    ConnectionLimit(String),

    #[error("server internal error: {0}")]
    ConnectionInternal(String),

    #[error("unrecognized connection error: {0}")]
    ConnectionUnknown(String),

    #[error("transient busy/locked error: {0}")]
    TransientBusy(String),

    #[error("transient communication error: {0}")]
    TransientComm(String),

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database engine error: {0}")]
    Engine(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl SkcdError {
    /// §4.2/§11: is this error worth retrying under the calling backend's
    /// budget? Classification itself lives in `crate::retry`; this is just
    /// the coarse "don't even try" filter used once an error has already
    /// been classified and re-wrapped.
    pub fn is_transient(&self) -> bool {
        matches!(self, SkcdError::TransientBusy(_) | SkcdError::TransientComm(_))
    }
}
