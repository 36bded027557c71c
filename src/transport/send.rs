//! Send-side descriptor: frames, encrypts and writes outgoing packets.
//!
//! Closing the descriptor cancels the in-flight write, then shuts the write
//! half down and drops it, so the peer sees end-of-stream.

use std::sync::{Arc, Weak};

use bytes::Bytes;
use futures::SinkExt;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::runtime::Handle;
use tokio::sync::Mutex;
use tokio_util::codec::FramedWrite;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use crate::core::codec::FrameEncoder;
use crate::error::{ProtocolError, Result};
use crate::transport::descriptor::{
    Completion, Descriptor, DescriptorContainer, Direction, FaultHandler, Teardown,
};
use crate::utils::metrics::global_metrics;

type WriterSlot<W> = Arc<Mutex<Option<FramedWrite<W, FrameEncoder>>>>;

/// Cancels the in-flight write and releases the write half when the descriptor closes.
pub struct SendTeardown<W> {
    cancel: CancellationToken,
    writer: WriterSlot<W>,
}

impl<W> Teardown for SendTeardown<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn on_closed(&self) {
        self.cancel.cancel();

        let writer = self.writer.clone();
        match Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    // waits for a cancelled send to let go of the lock
                    let Some(mut framed) = writer.lock().await.take() else {
                        return;
                    };
                    if let Err(err) = framed.get_mut().shutdown().await {
                        debug!(error = %err, "Write half shutdown failed");
                    }
                });
            }
            Err(_) => {
                // no runtime to flush on; dropping closes the half
                if let Ok(mut slot) = writer.try_lock() {
                    slot.take();
                }
            }
        }
    }
}

pub struct SendDescriptor<W> {
    base: Descriptor<SendTeardown<W>>,
    writer: WriterSlot<W>,
    cancel: CancellationToken,
}

impl<W> SendDescriptor<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        container: Weak<dyn DescriptorContainer>,
        writer: W,
        encoder: FrameEncoder,
    ) -> Self {
        let cancel = CancellationToken::new();
        let writer = Arc::new(Mutex::new(Some(FramedWrite::new(writer, encoder))));
        Self {
            base: Descriptor::new(
                Direction::Send,
                container,
                SendTeardown {
                    cancel: cancel.clone(),
                    writer: writer.clone(),
                },
            ),
            writer,
            cancel,
        }
    }

    pub fn descriptor(&self) -> &Descriptor<SendTeardown<W>> {
        &self.base
    }

    pub fn set_fault_handler(&self, handler: FaultHandler) {
        self.base.set_fault_handler(handler);
    }

    /// Encrypt and write one packet.
    ///
    /// Sends queue behind each other so the encrypt IV advances in wire order.
    #[instrument(skip(self, payload), fields(bytes = payload.len()))]
    pub async fn send(&self, payload: Bytes) -> Result<()> {
        let byte_count = payload.len() as u64;
        let mut slot = self.writer.lock().await;
        self.base.begin()?;
        let Some(writer) = slot.as_mut() else {
            self.base.complete();
            return Err(ProtocolError::ConnectionClosed);
        };

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(ProtocolError::Aborted),
            result = writer.send(payload) => result,
        };

        match outcome {
            Ok(()) => {
                self.base.complete();
                global_metrics().packet_sent(byte_count);
                Ok(())
            }
            Err(ProtocolError::Aborted) => {
                self.base.on_completion(Completion::Aborted);
                Err(ProtocolError::Aborted)
            }
            Err(ProtocolError::Io(err)) => {
                let kind = err.kind();
                // release the lock so the teardown can take the writer
                drop(slot);
                self.base.on_completion(Completion::from(&err));
                Err(ProtocolError::SocketFault(kind))
            }
            Err(other) => {
                // rejected by the encoder before anything reached the socket
                debug!(error = %other, "Packet rejected before sending");
                self.base.complete();
                Err(other)
            }
        }
    }

    pub fn close(&self) {
        self.base.close();
    }
}
