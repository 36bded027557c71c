//! # Socket Operation Descriptor
//!
//! Owns the completion handling of one socket direction of a connection.
//!
//! ## State Machine
//! ```text
//! Idle -> Pending -> Idle                 (data transferred, context reused)
//!                 -> Closing -> Closed    (close instruction)
//! ```
//!
//! Every outcome other than a data-carrying success is routed through
//! [`Descriptor::on_completion`]:
//! - a fault notifies the registered fault handler, if any;
//! - anything that is not `Aborted` instructs the owning connection to close.
//!
//! Protocol violations are not socket faults: they go straight to
//! [`Descriptor::close_container`] without notifying the subscriber.
//!
//! `Aborted` is what a pending operation reports after a local close. It is
//! expected and never notifies or closes again.
//!
//! [`Descriptor::close`] runs the [`Teardown`] hook at most once, from whichever
//! completion path gets there first.

use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use tracing::{debug, warn};

use crate::error::{constants, ProtocolError, Result};
use crate::utils::metrics::global_metrics;

/// The lifecycle owner a descriptor reports back to.
pub trait DescriptorContainer: Send + Sync {
    /// Close the whole connection.
    fn close(&self);
}

/// Direction-specific teardown run exactly once when a descriptor closes.
pub trait Teardown: Send + Sync {
    fn on_closed(&self);
}

/// Fault subscriber, called with the fault's error kind.
pub type FaultHandler = Arc<dyn Fn(io::ErrorKind) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Send,
    Receive,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Send => f.write_str("send"),
            Direction::Receive => f.write_str("receive"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DescriptorState {
    Idle = 0,
    Pending = 1,
    Closing = 2,
    Closed = 3,
}

impl DescriptorState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => DescriptorState::Idle,
            1 => DescriptorState::Pending,
            2 => DescriptorState::Closing,
            _ => DescriptorState::Closed,
        }
    }
}

/// Outcome of an asynchronous socket operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Finished without error (a zero-byte read reports this too)
    Success,
    /// Cancelled by a local close
    Aborted,
    /// Failed with a socket error
    Fault(io::ErrorKind),
}

impl From<&io::Error> for Completion {
    fn from(err: &io::Error) -> Self {
        Completion::Fault(err.kind())
    }
}

pub struct Descriptor<T> {
    direction: Direction,
    state: AtomicU8,
    closed: AtomicBool,
    fault_handler: Mutex<Option<FaultHandler>>,
    container: Weak<dyn DescriptorContainer>,
    teardown: T,
}

impl<T: Teardown> Descriptor<T> {
    pub fn new(
        direction: Direction,
        container: Weak<dyn DescriptorContainer>,
        teardown: T,
    ) -> Self {
        Self {
            direction,
            state: AtomicU8::new(DescriptorState::Idle as u8),
            closed: AtomicBool::new(false),
            fault_handler: Mutex::new(None),
            container,
            teardown,
        }
    }

    /// Register the fault subscriber, replacing any previous one.
    /// Ignored once the descriptor is closed.
    pub fn set_fault_handler(&self, handler: FaultHandler) {
        let mut slot = self
            .fault_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.is_closed() {
            *slot = Some(handler);
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> DescriptorState {
        DescriptorState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn teardown(&self) -> &T {
        &self.teardown
    }

    /// Mark an operation as issued.
    ///
    /// # Errors
    /// `InvalidState` if one is already pending, `ConnectionClosed` once closing.
    pub fn begin(&self) -> Result<()> {
        match self.state.compare_exchange(
            DescriptorState::Idle as u8,
            DescriptorState::Pending as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(current) if current == DescriptorState::Pending as u8 => Err(
                ProtocolError::InvalidState(constants::ERR_OPERATION_PENDING.into()),
            ),
            Err(_) => Err(ProtocolError::ConnectionClosed),
        }
    }

    /// A data transfer succeeded; the context is ready for the next operation.
    pub fn complete(&self) {
        let _ = self.state.compare_exchange(
            DescriptorState::Pending as u8,
            DescriptorState::Idle as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    /// Route a completion that did not transfer data.
    pub fn on_completion(&self, completion: Completion) {
        if let Completion::Fault(kind) = completion {
            warn!(direction = %self.direction, fault = ?kind, "Socket operation failed");
            global_metrics().socket_fault();
            if let Some(handler) = self.current_fault_handler() {
                handler(kind);
            }
        }

        if completion == Completion::Aborted {
            debug!(direction = %self.direction, "Socket operation aborted");
            global_metrics().operation_aborted();
            self.complete();
            return;
        }

        self.close_container();
    }

    /// Instruct the owning connection to close, or close this descriptor if
    /// the connection is already gone. The fault subscriber is not involved.
    pub fn close_container(&self) {
        match self.container.upgrade() {
            Some(container) => container.close(),
            None => self.close(),
        }
    }

    /// Drop the fault subscriber and run the teardown hook, once.
    pub fn close(&self) {
        {
            // closed flips under the handler lock so no handler is handed out afterwards
            let mut slot = self
                .fault_handler
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if self.closed.swap(true, Ordering::AcqRel) {
                return;
            }
            self.state
                .store(DescriptorState::Closing as u8, Ordering::Release);
            slot.take();
        }
        self.teardown.on_closed();

        self.state.store(DescriptorState::Closed as u8, Ordering::Release);
        debug!(direction = %self.direction, "Descriptor closed");
    }

    fn current_fault_handler(&self) -> Option<FaultHandler> {
        let slot = self
            .fault_handler
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.is_closed() {
            return None;
        }
        slot.clone()
    }
}

impl<T> fmt::Debug for Descriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("direction", &self.direction)
            .field(
                "state",
                &DescriptorState::from_u8(self.state.load(Ordering::Relaxed)),
            )
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct CountingTeardown(AtomicUsize);

    impl Teardown for CountingTeardown {
        fn on_closed(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Orphan;

    impl DescriptorContainer for Orphan {
        fn close(&self) {}
    }

    fn orphan_descriptor() -> Descriptor<CountingTeardown> {
        let container: Weak<dyn DescriptorContainer> = Weak::<Orphan>::new();
        Descriptor::new(Direction::Send, container, CountingTeardown::default())
    }

    #[test]
    fn begin_complete_cycle() {
        let descriptor = orphan_descriptor();
        assert_eq!(descriptor.state(), DescriptorState::Idle);
        descriptor.begin().unwrap();
        assert_eq!(descriptor.state(), DescriptorState::Pending);
        assert!(matches!(
            descriptor.begin(),
            Err(ProtocolError::InvalidState(_))
        ));
        descriptor.complete();
        assert_eq!(descriptor.state(), DescriptorState::Idle);
    }

    #[test]
    fn closed_descriptor_refuses_work() {
        let descriptor = orphan_descriptor();
        descriptor.close();
        descriptor.close();
        assert_eq!(descriptor.state(), DescriptorState::Closed);
        assert_eq!(descriptor.teardown().0.load(Ordering::SeqCst), 1);
        assert!(matches!(
            descriptor.begin(),
            Err(ProtocolError::ConnectionClosed)
        ));
    }

    #[test]
    fn handler_registered_after_close_is_never_called() {
        let descriptor = orphan_descriptor();
        descriptor.close();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        descriptor.set_fault_handler(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        descriptor.on_completion(Completion::Fault(io::ErrorKind::ConnectionReset));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn orphaned_descriptor_closes_itself_on_fault() {
        let descriptor = orphan_descriptor();
        descriptor.begin().unwrap();
        descriptor.on_completion(Completion::Fault(io::ErrorKind::ConnectionReset));
        assert!(descriptor.is_closed());
        assert_eq!(descriptor.teardown().0.load(Ordering::SeqCst), 1);
    }
}
