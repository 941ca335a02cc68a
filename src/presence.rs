use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use warp::ws::Message;

use crate::models::{Identity, OnlineFrame};

#[derive(Debug)]
struct Connection {
    seq: u64,
    identity: Option<Identity>,
    tx: UnboundedSender<Message>,
    connected_at: DateTime<Utc>,
}

/// Every open socket of this process, keyed by connection id.
#[derive(Debug, Clone, Default)]
pub struct Hub {
    connections: Arc<RwLock<HashMap<String, Connection>>>,
    next_seq: Arc<AtomicU64>,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(
        &self,
        conn_id: &str,
        identity: Option<Identity>,
        tx: UnboundedSender<Message>,
    ) {
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let mut connections = self.connections.write().await;
        connections.insert(
            conn_id.to_string(),
            Connection {
                seq,
                identity,
                tx,
                connected_at: Utc::now(),
            },
        );
        debug!("Registered {conn_id}, total connections: {}", connections.len());
    }

    /// Returns whether the connection was still registered.
    pub async fn unregister(&self, conn_id: &str) -> bool {
        let mut connections = self.connections.write().await;
        match connections.remove(conn_id) {
            Some(connection) => {
                let lifetime = Utc::now() - connection.connected_at;
                debug!(
                    "Unregistered {conn_id} after {}s, remaining connections: {}",
                    lifetime.num_seconds(),
                    connections.len()
                );
                true
            }
            None => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }

    /// Authenticated users with at least one socket, in connection order.
    pub async fn online(&self) -> Vec<Identity> {
        let connections = self.connections.read().await;
        let mut authenticated: Vec<_> = connections
            .values()
            .filter_map(|c| c.identity.as_ref().map(|id| (c.seq, id)))
            .collect();
        authenticated.sort_by_key(|(seq, _)| *seq);

        let mut seen = HashSet::new();
        authenticated
            .into_iter()
            .filter(|(_, id)| seen.insert(id.user_id.clone()))
            .map(|(_, id)| id.clone())
            .collect()
    }

    /// Sends the current presence snapshot to every socket.
    pub async fn broadcast_online(&self) {
        let frame = OnlineFrame {
            online: self.online().await,
        };
        let payload = match serde_json::to_string(&frame) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Failed to serialize presence frame: {e}");
                return;
            }
        };

        let connections = self.connections.read().await;
        for (conn_id, connection) in connections.iter() {
            if connection.tx.send(Message::text(payload.clone())).is_err() {
                debug!("Presence frame dropped for closing connection {conn_id}");
            }
        }
    }

    /// Pushes a frame to every socket owned by `user_id`; returns how many took it.
    pub async fn send_to_user(&self, user_id: &str, payload: &str) -> usize {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter(|c| c.identity.as_ref().is_some_and(|id| id.user_id == user_id))
            .filter(|c| c.tx.send(Message::text(payload)).is_ok())
            .count()
    }

    /// Pushes a frame to a single connection.
    pub async fn send_to_connection(&self, conn_id: &str, payload: &str) -> bool {
        let connections = self.connections.read().await;
        connections
            .get(conn_id)
            .is_some_and(|c| c.tx.send(Message::text(payload)).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};

    fn identity(user_id: &str, username: &str) -> Option<Identity> {
        Some(Identity {
            user_id: user_id.to_string(),
            username: username.to_string(),
        })
    }

    fn drain(rx: &mut UnboundedReceiver<Message>) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            frames.push(msg.to_str().unwrap().to_string());
        }
        frames
    }

    #[tokio::test]
    async fn online_lists_each_user_once_in_connection_order() {
        let hub = Hub::new();
        let (tx, _rx) = unbounded_channel();
        hub.register("c1", identity("u2", "bob"), tx.clone()).await;
        hub.register("c2", identity("u1", "alice"), tx.clone()).await;
        hub.register("c3", identity("u2", "bob"), tx.clone()).await;
        hub.register("c4", None, tx).await;

        let online = hub.online().await;
        let names: Vec<_> = online.iter().map(|i| i.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
        assert_eq!(hub.len().await, 4);
    }

    #[tokio::test]
    async fn broadcast_reaches_anonymous_sockets_too() {
        let hub = Hub::new();
        let (tx_a, mut rx_a) = unbounded_channel();
        let (tx_b, mut rx_b) = unbounded_channel();
        hub.register("c1", identity("u1", "alice"), tx_a).await;
        hub.register("c2", None, tx_b).await;

        hub.broadcast_online().await;

        let expected = r#"{"online":[{"userId":"u1","username":"alice"}]}"#;
        assert_eq!(drain(&mut rx_a), vec![expected]);
        assert_eq!(drain(&mut rx_b), vec![expected]);
    }

    #[tokio::test]
    async fn send_to_user_fans_out_to_every_socket_of_that_user() {
        let hub = Hub::new();
        let (tx_1, mut rx_1) = unbounded_channel();
        let (tx_2, mut rx_2) = unbounded_channel();
        let (tx_other, mut rx_other) = unbounded_channel();
        hub.register("c1", identity("u1", "alice"), tx_1).await;
        hub.register("c2", identity("u1", "alice"), tx_2).await;
        hub.register("c3", identity("u2", "bob"), tx_other).await;

        assert_eq!(hub.send_to_user("u1", "hello").await, 2);
        assert_eq!(drain(&mut rx_1), vec!["hello"]);
        assert_eq!(drain(&mut rx_2), vec!["hello"]);
        assert!(drain(&mut rx_other).is_empty());

        assert_eq!(hub.send_to_user("nobody", "hello").await, 0);
    }

    #[tokio::test]
    async fn unregister_removes_from_presence() {
        let hub = Hub::new();
        let (tx, rx) = unbounded_channel();
        hub.register("c1", identity("u1", "alice"), tx).await;
        assert!(hub.unregister("c1").await);
        assert!(!hub.unregister("c1").await);
        assert!(hub.online().await.is_empty());
        assert!(hub.is_empty().await);
        drop(rx);
    }

    #[tokio::test]
    async fn closed_receivers_are_not_counted() {
        let hub = Hub::new();
        let (tx, rx) = unbounded_channel();
        hub.register("c1", identity("u1", "alice"), tx).await;
        drop(rx);
        assert_eq!(hub.send_to_user("u1", "hello").await, 0);
        assert!(!hub.send_to_connection("c1", "hello").await);
    }
}
