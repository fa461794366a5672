use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::protocol::response::{ErrPayload, ErrPayloadBytes};

pub type Result<T> = core::result::Result<T, Error>;

/// Error taxonomy for the client.
///
/// Transient command errors (`QueryError`) leave the connection reusable.
/// Everything under "fatal" closes the connection outright; the pool drops
/// the entry on release rather than returning it to the idle queue.
#[derive(Debug, Error)]
pub enum Error {
    /// An `ERR` packet arrived while a command was in flight. The connection
    /// that produced this is still `Ready` and may be reused.
    #[error("query error {code} ({sql_state}): {message}")]
    QueryError {
        code: u16,
        sql_state: String,
        message: String,
    },

    /// The request was cancelled by the caller. Never fatal to the
    /// connection; the pool reconciles the connection in the background.
    #[error("operation was cancelled")]
    Cancelled,

    /// I/O failure, sequence mismatch, or any other condition that leaves
    /// the wire state unrecoverable. The connection transitions to `Closed`.
    #[error("connection error: {0}")]
    ConnectionError(String),

    /// A frame or payload did not match the shape the protocol requires.
    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("pool is closed")]
    PoolClosed,

    #[error("timed out waiting for a pooled connection")]
    PoolWaiterTimedOut,

    #[error("prepared statement is closed")]
    PreparedStatementClosed,

    #[error("parameter count mismatch: expected {expected}, got {got}")]
    ParamCountMismatch { expected: usize, got: usize },

    #[error("handshake failed: {0}")]
    HandshakeError(String),

    #[error("authentication failed: {0}")]
    AuthError(String),

    #[error("server error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("bad config: {0}")]
    BadConfigError(String),

    #[error("invalid usage: {0}")]
    BadUsageError(String),

    #[error("malformed packet")]
    InvalidPacket,

    #[error("unexpected end of packet")]
    UnexpectedEof,

    #[error("unknown protocol element: {0}")]
    UnknownProtocolError(String),

    #[error("unsupported authentication plugin or mechanism: {0}")]
    Unsupported(String),

    #[error("a bug in zero-mysql: {0}")]
    LibraryBug(color_eyre::Report),

    #[error(
        "connection mismatch: transaction started on connection {expected}, but commit/rollback called on connection {actual}"
    )]
    ConnectionMismatch { expected: u64, actual: u64 },

    #[error("cannot nest transactions - a transaction is already active")]
    NestedTransaction,
}

impl Error {
    /// True if this error reflects a fatal, connection-closing condition
    /// rather than a transient command-level failure.
    pub fn is_fatal_to_connection(&self) -> bool {
        !matches!(
            self,
            Error::QueryError { .. } | Error::Cancelled | Error::ServerError(_)
        )
    }
}

impl<'buf> From<ErrPayloadBytes<'buf>> for Error {
    fn from(value: ErrPayloadBytes<'buf>) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::QueryError {
                code: err_payload.error_code,
                sql_state: err_payload.sql_state,
                message: err_payload.message,
            },
            Err(err) => err,
        }
    }
}

impl From<core::convert::Infallible> for Error {
    fn from(err: core::convert::Infallible) -> Self {
        match err {}
    }
}

impl Error {
    pub fn from_debug(err: impl std::fmt::Debug) -> Self {
        Self::LibraryBug(color_eyre::eyre::eyre!(format!("{:#?}", err)))
    }
}

impl<Src, Dst: ?Sized> From<zerocopy::CastError<Src, Dst>> for Error {
    fn from(err: zerocopy::CastError<Src, Dst>) -> Self {
        Self::LibraryBug(color_eyre::eyre::eyre!("{:#?}", err))
    }
}
