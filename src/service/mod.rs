//! # Session Services
//!
//! Background tasks that run alongside an established [`Session`](crate::transport::Session).

pub mod keepalive;

pub use keepalive::{spawn_keepalive, KeepAlive, KeepAliveAction};
