//! # Keep-Alive
//!
//! Periodic pings with a missed-response budget. Each tick counts one ping; a
//! pong resets the count. Once the count goes past the budget the session is
//! disconnected instead of pinged again.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use crate::config::KeepAliveConfig;
use crate::transport::session::Session;

/// Disconnect reason when the peer stops answering pings
pub const NO_PING_RESPONSE: &str = "No ping response.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeepAliveAction {
    SendPing,
    Disconnect,
}

#[derive(Debug)]
pub struct KeepAlive {
    sent_pings: AtomicU32,
    missed_pings_allowed: u32,
}

impl KeepAlive {
    pub fn new(missed_pings_allowed: u32) -> Self {
        Self {
            sent_pings: AtomicU32::new(0),
            missed_pings_allowed,
        }
    }

    pub fn from_config(config: &KeepAliveConfig) -> Self {
        Self::new(config.missed_pings_allowed)
    }

    /// Count a timer tick and decide what to do with it.
    pub fn tick(&self) -> KeepAliveAction {
        let sent = self.sent_pings.fetch_add(1, Ordering::AcqRel).saturating_add(1);
        if sent > self.missed_pings_allowed {
            KeepAliveAction::Disconnect
        } else {
            KeepAliveAction::SendPing
        }
    }

    /// The peer answered; start counting from zero again.
    pub fn pong(&self) {
        self.sent_pings.store(0, Ordering::Release);
    }

    /// Pings sent since the last pong.
    pub fn outstanding(&self) -> u32 {
        self.sent_pings.load(Ordering::Acquire)
    }
}

/// Ping `session` every `config.interval` until it closes or stops answering.
///
/// The caller feeds pongs into the returned counter from its packet loop.
pub fn spawn_keepalive(
    session: Session,
    config: &KeepAliveConfig,
    ping: Bytes,
) -> (Arc<KeepAlive>, JoinHandle<()>) {
    let keepalive = Arc::new(KeepAlive::from_config(config));
    let interval = config.interval;
    let counter = keepalive.clone();

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            if session.is_closed() {
                break;
            }

            match keepalive.tick() {
                KeepAliveAction::Disconnect => {
                    info!(session_id = session.id(), "Peer stopped answering pings");
                    session.disconnect(NO_PING_RESPONSE);
                    break;
                }
                KeepAliveAction::SendPing => {
                    debug!(
                        session_id = session.id(),
                        outstanding = keepalive.outstanding(),
                        "PING"
                    );
                    if let Err(err) = session.write_packet(ping.clone()).await {
                        debug!(error = %err, "Keep-alive ping failed");
                        break;
                    }
                }
            }
        }
    });
    (counter, task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NetworkConfig;
    use crate::crypto::endpoint::{client_crypto, server_crypto};
    use crate::error::ProtocolError;
    use std::time::Duration;

    #[test]
    fn budget_allows_exactly_the_configured_misses() {
        let keepalive = KeepAlive::new(3);
        for _ in 0..3 {
            assert_eq!(keepalive.tick(), KeepAliveAction::SendPing);
        }
        assert_eq!(keepalive.tick(), KeepAliveAction::Disconnect);
    }

    #[test]
    fn pong_resets_the_count() {
        let keepalive = KeepAlive::new(1);
        assert_eq!(keepalive.tick(), KeepAliveAction::SendPing);
        keepalive.pong();
        assert_eq!(keepalive.outstanding(), 0);
        assert_eq!(keepalive.tick(), KeepAliveAction::SendPing);
        assert_eq!(keepalive.tick(), KeepAliveAction::Disconnect);
    }

    fn session_pair() -> (Session, Session) {
        let config = NetworkConfig::default();
        let factory = config.crypto.factory();
        let (server_io, client_io) = tokio::io::duplex(64 * 1024);
        let server = server_crypto(&factory, &[1, 2, 3, 4], &[9, 8, 7, 6]).unwrap();
        let client = client_crypto(&factory, &[1, 2, 3, 4], &[9, 8, 7, 6]).unwrap();
        (
            Session::from_stream(server_io, server, &config),
            Session::from_stream(client_io, client, &config),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn silent_peer_is_disconnected() {
        let (server, client) = session_pair();
        let config = KeepAliveConfig {
            interval: Duration::from_secs(15),
            missed_pings_allowed: 1,
        };
        let (keepalive, task) =
            spawn_keepalive(server.clone(), &config, Bytes::from_static(&[0x11, 0x00]));

        task.await.unwrap();
        assert!(server.is_closed());
        assert_eq!(keepalive.outstanding(), 2);

        let ping = client.read_packet().await.unwrap();
        assert_eq!(&ping[..], &[0x11, 0x00]);
        assert!(matches!(
            client.read_packet().await,
            Err(ProtocolError::ConnectionClosed)
        ));
        assert!(client.is_closed());
    }

    #[tokio::test(start_paused = true)]
    async fn answered_pings_keep_the_session_open() {
        let (server, client) = session_pair();
        let config = KeepAliveConfig {
            interval: Duration::from_secs(15),
            missed_pings_allowed: 1,
        };
        let (keepalive, task) =
            spawn_keepalive(server.clone(), &config, Bytes::from_static(&[0x11, 0x00]));

        for _ in 0..5 {
            client.read_packet().await.unwrap();
            keepalive.pong();
        }
        assert!(!server.is_closed());

        server.close();
        task.await.unwrap();
    }
}
