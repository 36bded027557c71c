//! # Session
//!
//! One encrypted connection: the hello exchange, a send descriptor, a
//! receive descriptor, and the lifecycle both descriptors report to.
//!
//! A session closes at most once. The first close (a local `close`/`disconnect`,
//! a fault on either direction, or the peer hanging up) logs the reason and
//! closes both descriptors. That aborts whatever they still had pending, shuts
//! the write half down so the peer reads end-of-stream, and drops both halves.
//!
//! ## Usage
//! ```rust,no_run
//! use gamewire::config::NetworkConfig;
//! use gamewire::transport::session::Session;
//! use tokio::net::TcpListener;
//!
//! # async fn run() -> gamewire::error::Result<()> {
//! let config = NetworkConfig::default();
//! let factory = config.crypto.factory();
//! let listener = TcpListener::bind("127.0.0.1:8484").await?;
//! let (stream, _) = listener.accept().await?;
//!
//! let session = Session::accept(stream, &factory, &config).await?;
//! while let Ok(packet) = session.read_packet().await {
//!     session.write_packet(packet.freeze()).await?;
//! }
//! # Ok(())
//! # }
//! ```

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tracing::{info, instrument, warn};

use crate::config::NetworkConfig;
use crate::core::codec::{FrameDecoder, FrameEncoder};
use crate::crypto::endpoint::{client_crypto, server_crypto, EndpointCrypto};
use crate::crypto::rolling_iv::RollingIvFactory;
use crate::error::{constants, ProtocolError, Result};
use crate::protocol::handshake::{read_hello, write_hello, Hello};
use crate::transport::descriptor::{DescriptorContainer, DescriptorState, FaultHandler};
use crate::transport::receive::ReceiveDescriptor;
use crate::transport::send::SendDescriptor;
use crate::utils::metrics::global_metrics;

/// Reason logged when a session is closed without one
pub const NO_REASON: &str = "(no reason supplied)";

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Cheaply cloneable handle to one connection.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: u64,
    closed: AtomicBool,
    send: SendDescriptor<BoxedWriter>,
    receive: ReceiveDescriptor<BoxedReader>,
}

impl DescriptorContainer for SessionInner {
    fn close(&self) {
        self.shutdown(None);
    }
}

impl SessionInner {
    fn shutdown(&self, reason: Option<&str>) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let reason = reason
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or(NO_REASON);
        info!(session_id = self.id, reason, "Session was closed");

        self.send.close();
        self.receive.close();
        global_metrics().session_closed();
    }
}

impl Session {
    /// Server side: announce fresh seeds, then start the encrypted stream.
    #[instrument(skip_all)]
    pub async fn accept<S>(
        mut stream: S,
        factory: &RollingIvFactory,
        config: &NetworkConfig,
    ) -> Result<Session>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let hello = Hello::generate(
            factory.version(),
            config.crypto.patch_location.clone(),
            config.crypto.locale,
        )?;

        let exchange = tokio::time::timeout(
            config.session.handshake_timeout,
            write_hello(&mut stream, &hello),
        );
        if let Err(err) = flatten_timeout(exchange.await) {
            global_metrics().handshake_failed();
            return Err(err);
        }

        let crypto = server_crypto(factory, &hello.client_iv, &hello.server_iv)?;
        Ok(Self::from_stream(stream, crypto, config))
    }

    /// Client side: read the server's hello and derive the matching crypto.
    #[instrument(skip_all)]
    pub async fn connect<S>(
        mut stream: S,
        factory: &RollingIvFactory,
        config: &NetworkConfig,
    ) -> Result<Session>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let exchange = tokio::time::timeout(
            config.session.handshake_timeout,
            read_hello(&mut stream, factory.version()),
        );
        let hello = match flatten_timeout(exchange.await) {
            Ok(hello) => hello,
            Err(err) => {
                global_metrics().handshake_failed();
                return Err(err);
            }
        };

        let crypto = client_crypto(factory, &hello.client_iv, &hello.server_iv)?;
        Ok(Self::from_stream(stream, crypto, config))
    }

    /// Wrap an already established stream whose crypto is known.
    pub fn from_stream<S>(stream: S, crypto: EndpointCrypto, config: &NetworkConfig) -> Session
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (reader, writer): (ReadHalf<S>, WriteHalf<S>) = tokio::io::split(stream);
        let reader: BoxedReader = Box::new(reader);
        let writer: BoxedWriter = Box::new(writer);
        let (encryptor, decryptor) = crypto.into_parts();
        let custom = config.crypto.custom_crypto;
        let max_packet = config.session.max_packet_size;

        let encoder = FrameEncoder::new(encryptor, custom).with_max_payload(max_packet);
        let decoder = FrameDecoder::new(decryptor, custom).with_max_payload(max_packet);
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);

        let inner = Arc::new_cyclic(|weak: &Weak<SessionInner>| {
            let container: Weak<dyn DescriptorContainer> = weak.clone();
            SessionInner {
                id,
                closed: AtomicBool::new(false),
                send: SendDescriptor::new(container.clone(), writer, encoder),
                receive: ReceiveDescriptor::new(container, reader, decoder),
            }
        });

        global_metrics().session_opened();
        info!(session_id = id, custom_crypto = custom, "Session opened");
        Session { inner }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub fn send_state(&self) -> DescriptorState {
        self.inner.send.descriptor().state()
    }

    pub fn receive_state(&self) -> DescriptorState {
        self.inner.receive.descriptor().state()
    }

    /// Subscribe to socket faults on either direction.
    ///
    /// Framing violations close the session without reaching this handler.
    pub fn on_fault<F>(&self, handler: F)
    where
        F: Fn(io::ErrorKind) + Send + Sync + 'static,
    {
        let handler: FaultHandler = Arc::new(handler);
        self.inner.send.set_fault_handler(handler.clone());
        self.inner.receive.set_fault_handler(handler);
    }

    /// Encrypt and send one packet.
    pub async fn write_packet(&self, payload: impl Into<Bytes>) -> Result<()> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.inner.send.send(payload.into()).await
    }

    /// Receive and decrypt the next packet.
    pub async fn read_packet(&self) -> Result<BytesMut> {
        if self.is_closed() {
            return Err(ProtocolError::ConnectionClosed);
        }
        self.inner.receive.receive().await
    }

    /// Close the session, logging why.
    pub fn disconnect(&self, reason: &str) {
        self.inner.shutdown(Some(reason));
    }

    pub fn close(&self) {
        self.inner.shutdown(None);
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

fn flatten_timeout<T>(
    outcome: std::result::Result<Result<T>, tokio::time::error::Elapsed>,
) -> Result<T> {
    match outcome {
        Ok(result) => result,
        Err(_) => {
            warn!("{}", constants::ERR_HANDSHAKE_TIMEOUT);
            Err(ProtocolError::Timeout)
        }
    }
}
