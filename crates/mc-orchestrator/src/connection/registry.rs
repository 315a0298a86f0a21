//! Registry of connection headers keyed by port
//!
//! Headers live in a [`DashMap`] so readers never wait on each other. Work
//! that awaits the network is done on a cloned header while holding that
//! port's guard, then written back; no map reference is ever held across an
//! await point.
//!
//! # Locking model
//!
//! - Per-port guards serialize refresh and lifecycle changes of one port.
//! - The bulk lock is taken shared by scans and exclusively by bulk actions
//!   (connect/disconnect/quit over many ports), so a bulk action never
//!   interleaves with a scan.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use mc_core::{Port, Status};

use super::header::ConnectionHeader;

/// Port-keyed header store with per-port and bulk locking
pub struct HeaderRegistry {
    headers: DashMap<Port, ConnectionHeader>,
    port_locks: DashMap<Port, Arc<Mutex<()>>>,
    bulk: RwLock<()>,
}

impl HeaderRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            headers: DashMap::new(),
            port_locks: DashMap::new(),
            bulk: RwLock::new(()),
        }
    }

    /// Acquire the shared bulk lock (scans)
    pub async fn read(&self) -> RwLockReadGuard<'_, ()> {
        self.bulk.read().await
    }

    /// Acquire the exclusive bulk lock (bulk actions)
    pub async fn write(&self) -> RwLockWriteGuard<'_, ()> {
        self.bulk.write().await
    }

    /// Acquire the guard for one port
    pub async fn lock_port(&self, port: Port) -> OwnedMutexGuard<()> {
        let lock = self
            .port_locks
            .entry(port)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Snapshot of the header on `port`
    pub fn get(&self, port: Port) -> Option<ConnectionHeader> {
        self.headers.get(&port).map(|r| r.value().clone())
    }

    /// Insert or replace the header on its port
    pub fn insert(&self, header: ConnectionHeader) {
        self.headers.insert(header.port(), header);
    }

    /// Remove and return the header on `port`
    pub fn remove(&self, port: Port) -> Option<ConnectionHeader> {
        self.headers.remove(&port).map(|(_, header)| header)
    }

    /// Whether a header is registered on `port`
    pub fn contains(&self, port: Port) -> bool {
        self.headers.contains_key(&port)
    }

    /// Registered ports in ascending order
    pub fn ports(&self) -> Vec<Port> {
        let mut ports: Vec<Port> = self.headers.iter().map(|r| *r.key()).collect();
        ports.sort_unstable();
        ports
    }

    /// Snapshot of every header in port order
    pub fn snapshot(&self) -> Vec<ConnectionHeader> {
        let mut headers: Vec<ConnectionHeader> =
            self.headers.iter().map(|r| r.value().clone()).collect();
        headers.sort_by_key(ConnectionHeader::port);
        headers
    }

    /// Headers with the given status, keyed by port
    pub fn with_status(&self, status: Status) -> BTreeMap<Port, ConnectionHeader> {
        self.headers
            .iter()
            .filter(|r| r.value().status() == status)
            .map(|r| (*r.key(), r.value().clone()))
            .collect()
    }

    /// Lowest port whose header equals `header`
    pub fn find(&self, header: &ConnectionHeader) -> Option<Port> {
        self.headers
            .iter()
            .filter(|r| r.value() == header)
            .map(|r| *r.key())
            .min()
    }

    /// Number of registered headers
    pub fn len(&self) -> usize {
        self.headers.len()
    }

    /// Whether no header is registered
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

impl Default for HeaderRegistry {
    fn default() -> Self {
        Self::new()
    }
}
