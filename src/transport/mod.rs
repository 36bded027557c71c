//! # Transport Layer
//!
//! Async socket plumbing for one encrypted connection.
//!
//! ## Components
//! - **Descriptor**: completion routing and the close-once state machine
//! - **Send / Receive**: one descriptor per direction, each owning its codec half
//! - **Session**: the hello exchange and the container both descriptors report to
//!
//! Any fault on either direction, or the peer closing the stream, closes the
//! whole session. Operations still pending at that point complete as aborted.

pub mod descriptor;
pub mod receive;
pub mod send;
pub mod session;

pub use descriptor::{Completion, DescriptorContainer, DescriptorState, Direction};
pub use session::Session;
