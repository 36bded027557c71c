//! Receive-side descriptor: reads, validates and decrypts incoming packets.
//!
//! Closing the descriptor cancels the in-flight read and drops the read half.

use std::sync::{Arc, Weak};

use bytes::BytesMut;
use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_util::codec::FramedRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::codec::FrameDecoder;
use crate::error::{ProtocolError, Result};
use crate::transport::descriptor::{
    Completion, Descriptor, DescriptorContainer, Direction, FaultHandler, Teardown,
};
use crate::utils::metrics::global_metrics;

type ReaderSlot<R> = Arc<Mutex<Option<FramedRead<R, FrameDecoder>>>>;

/// Cancels the in-flight read and drops the read half when the descriptor closes.
pub struct ReceiveTeardown<R> {
    cancel: CancellationToken,
    reader: ReaderSlot<R>,
}

impl<R> Teardown for ReceiveTeardown<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    fn on_closed(&self) {
        self.cancel.cancel();

        let reader = self.reader.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    reader.lock().await.take();
                });
            }
            Err(_) => {
                if let Ok(mut slot) = reader.try_lock() {
                    slot.take();
                }
            }
        }
    }
}

pub struct ReceiveDescriptor<R> {
    base: Descriptor<ReceiveTeardown<R>>,
    reader: ReaderSlot<R>,
    cancel: CancellationToken,
}

impl<R> ReceiveDescriptor<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    pub fn new(
        container: Weak<dyn DescriptorContainer>,
        reader: R,
        decoder: FrameDecoder,
    ) -> Self {
        let cancel = CancellationToken::new();
        let reader = Arc::new(Mutex::new(Some(FramedRead::new(reader, decoder))));
        Self {
            base: Descriptor::new(
                Direction::Receive,
                container,
                ReceiveTeardown {
                    cancel: cancel.clone(),
                    reader: reader.clone(),
                },
            ),
            reader,
            cancel,
        }
    }

    pub fn descriptor(&self) -> &Descriptor<ReceiveTeardown<R>> {
        &self.base
    }

    pub fn set_fault_handler(&self, handler: FaultHandler) {
        self.base.set_fault_handler(handler);
    }

    /// Wait for the next complete packet and return its decrypted body.
    ///
    /// # Errors
    /// - `ConnectionClosed` when the peer shut the stream down
    /// - `SocketFault` when the read failed
    /// - `InvalidHeader` / `OversizedPacket` for framing violations
    /// - `Aborted` when the descriptor was closed locally
    pub async fn receive(&self) -> Result<BytesMut> {
        let mut slot = self.reader.lock().await;
        self.base.begin()?;
        let Some(reader) = slot.as_mut() else {
            self.base.complete();
            return Err(ProtocolError::ConnectionClosed);
        };

        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            frame = reader.next() => Some(frame),
        };

        let Some(frame) = next else {
            self.base.on_completion(Completion::Aborted);
            return Err(ProtocolError::Aborted);
        };

        match frame {
            Some(Ok(packet)) => {
                self.base.complete();
                global_metrics().packet_received(packet.len() as u64);
                Ok(packet)
            }
            Some(Err(ProtocolError::Io(err))) => {
                let kind = err.kind();
                self.base.on_completion(Completion::from(&err));
                Err(ProtocolError::SocketFault(kind))
            }
            Some(Err(violation)) => {
                // a protocol violation, not a socket fault
                warn!(error = %violation, "Dropping connection after framing violation");
                global_metrics().protocol_error();
                self.base.complete();
                self.base.close_container();
                Err(violation)
            }
            None => {
                debug!("Remote end closed the stream");
                self.base.on_completion(Completion::Success);
                Err(ProtocolError::ConnectionClosed)
            }
        }
    }

    pub fn close(&self) {
        self.base.close();
    }
}
