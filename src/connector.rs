//! Transport factory consumed by [`crate::tokio::Connection`] and
//! [`crate::tokio::Pool`].
//!
//! Mirrors bb8's `ManageConnection`: a small async factory trait that owns
//! how a raw transport is dialed, so the pool and the connection actor never
//! call `TcpStream::connect` directly and tests can substitute an in-memory
//! duplex stream.

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::opts::Opts;

/// Anything that can serve as the connection actor's socket.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Transport for T {}

/// Dials a fresh transport to a MySQL server.
///
/// Implementations are held by the connection actor (for its own socket) and
/// by the [`crate::tokio::Pool`] (to create new pooled connections), so they
/// must be `Clone` and cheap to share (typically just an `Arc<Opts>` or
/// similarly small handle).
#[async_trait]
pub trait Connector: Clone + Send + Sync + 'static {
    type Transport: Transport;

    /// Open a new transport to the server described by this connector.
    async fn connect(&self) -> Result<Self::Transport>;

    /// Connection parameters used for authentication and session setup.
    fn opts(&self) -> &Opts;
}

/// The default [`Connector`]: plain TCP (or Unix socket), optionally
/// upgraded to TLS during the handshake.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    opts: Opts,
}

impl TcpConnector {
    pub fn new(opts: Opts) -> Self {
        Self { opts }
    }
}

#[async_trait]
impl Connector for TcpConnector {
    type Transport = crate::tokio::stream::Stream;

    async fn connect(&self) -> Result<Self::Transport> {
        if let Some(path) = &self.opts.socket {
            let stream = tokio::net::UnixStream::connect(path).await?;
            return Ok(crate::tokio::stream::Stream::Unix(stream));
        }

        let host = self
            .opts
            .host
            .as_deref()
            .ok_or_else(|| Error::BadConfigError("missing host in connection options".into()))?;
        let addr = format!("{}:{}", host, self.opts.port);
        let stream = tokio::time::timeout(self.opts.connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| Error::BadConfigError(format!("connect to {addr} timed out")))??;
        stream.set_nodelay(self.opts.tcp_nodelay)?;
        let stream = crate::tokio::stream::Stream::Tcp(stream);

        #[cfg(feature = "tls")]
        let stream = if self.opts.tls {
            stream
                .upgrade_to_tls(host, self.opts.ssl_verify)
                .await
                .map_err(Error::IoError)?
        } else {
            stream
        };
        #[cfg(not(feature = "tls"))]
        if self.opts.tls {
            return Err(Error::BadConfigError(
                "TLS requested but the `tls` feature is not enabled".into(),
            ));
        }

        Ok(stream)
    }

    fn opts(&self) -> &Opts {
        &self.opts
    }
}
