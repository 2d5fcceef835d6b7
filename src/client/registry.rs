//! Client registry
//!
//! Tracks every open session and the station state it has announced. The map
//! is private: each method takes the lock once, touches the map, and releases
//! it before returning, so no socket I/O ever happens under the lock.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::client::state::ClientState;
use crate::error::{RelayError, Result};
use crate::protocol::messages::StationAnnouncement;

/// Encoded frame queued for delivery to one session.
pub type Frame = Arc<[u8]>;

/// Sending side of a session's outbound queue.
pub type Outbound = mpsc::Sender<Frame>;

struct Entry {
    order: u64,
    state: ClientState,
    outbound: Outbound,
}

#[derive(Default)]
struct Inner {
    clients: HashMap<SocketAddr, Entry>,
    next_order: u64,
}

/// Registry for tracking connected clients
pub struct ClientRegistry {
    inner: Mutex<Inner>,
    max_clients: usize,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_clients,
        }
    }

    /// Adds a session with empty state. Returns the number of registered sessions.
    pub async fn register(&self, addr: SocketAddr, outbound: Outbound) -> Result<usize> {
        let mut inner = self.inner.lock().await;
        if inner.clients.len() >= self.max_clients {
            return Err(RelayError::ServerFull {
                max: self.max_clients,
            });
        }

        let order = inner.next_order;
        inner.next_order += 1;
        inner.clients.insert(
            addr,
            Entry {
                order,
                state: ClientState::default(),
                outbound,
            },
        );
        Ok(inner.clients.len())
    }

    /// Removes a session, returning its final state.
    pub async fn unregister(&self, addr: &SocketAddr) -> Option<ClientState> {
        let mut inner = self.inner.lock().await;
        inner.clients.remove(addr).map(|entry| entry.state)
    }

    /// Merges an announcement into a session's state and returns the result.
    pub async fn update(
        &self,
        addr: &SocketAddr,
        announcement: &StationAnnouncement,
    ) -> Option<ClientState> {
        let mut inner = self.inner.lock().await;
        inner.clients.get_mut(addr).map(|entry| {
            entry.state.apply(announcement);
            entry.state.clone()
        })
    }

    /// Station names of all sessions that have announced one, oldest session first.
    pub async fn snapshot(&self) -> Vec<String> {
        let inner = self.inner.lock().await;
        let mut stations: Vec<(u64, String)> = inner
            .clients
            .values()
            .filter_map(|entry| {
                entry
                    .state
                    .station()
                    .map(|station| (entry.order, station.to_string()))
            })
            .collect();
        stations.sort_by_key(|(order, _)| *order);
        stations.into_iter().map(|(_, station)| station).collect()
    }

    /// Outbound queues of all sessions except `exclude`.
    pub async fn recipients(&self, exclude: Option<&SocketAddr>) -> Vec<(SocketAddr, Outbound)> {
        let inner = self.inner.lock().await;
        inner
            .clients
            .iter()
            .filter(|(addr, _)| Some(*addr) != exclude)
            .map(|(addr, entry)| (*addr, entry.outbound.clone()))
            .collect()
    }

    pub async fn outbound(&self, addr: &SocketAddr) -> Option<Outbound> {
        let inner = self.inner.lock().await;
        inner.clients.get(addr).map(|entry| entry.outbound.clone())
    }

    pub async fn state(&self, addr: &SocketAddr) -> Option<ClientState> {
        let inner = self.inner.lock().await;
        inner.clients.get(addr).map(|entry| entry.state.clone())
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.clients.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
