//
// Copyright 2025-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Registry of active connections
//!
//! The registry is the only way the application reaches a connection: it
//! maps connection IDs to the outbound channel of their session. Sessions
//! themselves are owned by their tasks.

use crate::error::NetworkError;
use portcullis_common::{ClientCapabilities, ConnectionInfo, OutboundEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc, watch};
use uuid::Uuid;

/// Source of candidate connection IDs
pub type IdGenerator = Box<dyn Fn() -> Uuid + Send + Sync>;

/// Registry entry for one connection
#[derive(Clone)]
pub struct ConnectionHandle {
    info: ConnectionInfo,
    capabilities: watch::Receiver<ClientCapabilities>,
    sender: mpsc::Sender<OutboundEvent>,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(
        info: ConnectionInfo,
        capabilities: watch::Receiver<ClientCapabilities>,
        sender: mpsc::Sender<OutboundEvent>,
    ) -> Self {
        Self {
            info,
            capabilities,
            sender,
        }
    }

    /// Get connection ID
    pub fn id(&self) -> Uuid {
        self.info.id
    }

    /// Snapshot with the latest negotiated capabilities
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            capabilities: self.capabilities.borrow().clone(),
            ..self.info.clone()
        }
    }

    /// Queue an event, waiting while the session's queue is full
    pub async fn send(&self, event: OutboundEvent) -> Result<(), NetworkError> {
        self.sender
            .send(event)
            .await
            .map_err(|_| NetworkError::ConnectionClosed(self.info.id))
    }

    /// Queue an event only if the session has room for it now
    pub fn try_send(&self, event: OutboundEvent) -> Result<(), NetworkError> {
        self.sender.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => NetworkError::QueueFull(self.info.id),
            TrySendError::Closed(_) => NetworkError::ConnectionClosed(self.info.id),
        })
    }
}

/// Active connections keyed by ID
pub struct ConnectionRegistry {
    connections: RwLock<HashMap<Uuid, ConnectionHandle>>,
    active: Arc<AtomicUsize>,
    generate_id: IdGenerator,
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionRegistry {
    /// Create a registry that allocates random v4 UUIDs
    pub fn new() -> Self {
        Self::with_id_generator(Box::new(Uuid::new_v4))
    }

    /// Create a registry with a custom ID source
    pub fn with_id_generator(generate_id: IdGenerator) -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            active: Arc::new(AtomicUsize::new(0)),
            generate_id,
        }
    }

    /// Live connection counter, shared with status reporting
    pub fn counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.active)
    }

    /// Allocate a unique ID and insert the handle built for it
    ///
    /// Candidate IDs are drawn until one is unused; the check and the insert
    /// happen under the same write lock. `build` returns the handle plus any
    /// value the caller wants back for the same ID.
    pub async fn register<T, F>(&self, build: F) -> T
    where
        F: FnOnce(Uuid) -> (ConnectionHandle, T),
    {
        let mut connections = self.connections.write().await;
        let mut id = (self.generate_id)();
        while connections.contains_key(&id) {
            tracing::debug!(connection = %id, "Connection ID collision, retrying");
            id = (self.generate_id)();
        }
        let (handle, value) = build(id);
        connections.insert(id, handle);
        self.active.store(connections.len(), Ordering::Relaxed);
        value
    }

    /// Remove a connection; removing an unknown ID is a no-op
    pub async fn unregister(&self, id: Uuid) -> bool {
        let mut connections = self.connections.write().await;
        let removed = connections.remove(&id).is_some();
        self.active.store(connections.len(), Ordering::Relaxed);
        removed
    }

    /// Send an event to a specific connection
    ///
    /// Waits while the connection's queue is full. The registry lock is
    /// released before waiting.
    pub async fn send(&self, id: Uuid, event: OutboundEvent) -> Result<(), NetworkError> {
        let handle = self
            .connections
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(NetworkError::UnknownConnection(id))?;
        handle.send(event).await
    }

    /// Send an event to every connection; returns how many accepted it
    ///
    /// Connections whose queue is full are skipped rather than waited on.
    pub async fn broadcast(&self, event: OutboundEvent) -> usize {
        let connections = self.connections.read().await;
        deliver(connections.values(), &event)
    }

    /// Send an event to the listed connections; returns how many accepted it
    pub async fn broadcast_to(&self, ids: &[Uuid], event: OutboundEvent) -> usize {
        let connections = self.connections.read().await;
        deliver(ids.iter().filter_map(|id| connections.get(id)), &event)
    }

    pub async fn contains(&self, id: Uuid) -> bool {
        self.connections.read().await.contains_key(&id)
    }

    /// Get the number of active connections
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Get all active connection IDs
    pub async fn ids(&self) -> Vec<Uuid> {
        self.connections.read().await.keys().copied().collect()
    }

    /// Snapshot of one connection
    pub async fn get(&self, id: Uuid) -> Option<ConnectionInfo> {
        self.connections.read().await.get(&id).map(ConnectionHandle::info)
    }

    /// Snapshots of every connection, oldest first
    pub async fn connections(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .connections
            .read()
            .await
            .values()
            .map(ConnectionHandle::info)
            .collect();
        infos.sort_by_key(|info| info.created_at);
        infos
    }
}

fn deliver<'a>(handles: impl Iterator<Item = &'a ConnectionHandle>, event: &OutboundEvent) -> usize {
    let mut delivered = 0;
    let mut skipped = 0;
    for handle in handles {
        match handle.try_send(event.clone()) {
            Ok(()) => delivered += 1,
            Err(NetworkError::QueueFull(_)) => skipped += 1,
            Err(_) => {}
        }
    }
    if skipped > 0 {
        tracing::debug!(delivered, skipped, "Broadcast skipped connections with full queues");
    }
    delivered
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use portcullis_common::ProtocolType;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    fn info(id: Uuid) -> ConnectionInfo {
        ConnectionInfo {
            id,
            listener: "telnet".to_string(),
            protocol: ProtocolType::Telnet,
            remote_addr: "127.0.0.1:50000".parse().unwrap(),
            tls: false,
            created_at: Utc::now(),
            capabilities: ClientCapabilities::default(),
        }
    }

    async fn register(
        registry: &ConnectionRegistry,
    ) -> (Uuid, mpsc::Receiver<OutboundEvent>, watch::Sender<ClientCapabilities>) {
        register_with_capacity(registry, 8).await
    }

    async fn register_with_capacity(
        registry: &ConnectionRegistry,
        capacity: usize,
    ) -> (Uuid, mpsc::Receiver<OutboundEvent>, watch::Sender<ClientCapabilities>) {
        let (tx, rx) = mpsc::channel(capacity);
        let (caps_tx, caps_rx) = watch::channel(ClientCapabilities::default());
        let id = registry
            .register(|id| (ConnectionHandle::new(info(id), caps_rx, tx), id))
            .await;
        (id, rx, caps_tx)
    }

    #[tokio::test]
    async fn test_register_and_send() {
        let registry = ConnectionRegistry::new();
        let (id, mut rx, _caps) = register(&registry).await;

        assert_eq!(registry.connection_count().await, 1);
        assert!(registry.contains(id).await);

        let event = OutboundEvent::Line {
            text: "hello".to_string(),
        };
        registry.send(id, event.clone()).await.unwrap();
        assert_eq!(rx.recv().await, Some(event));
    }

    #[tokio::test]
    async fn test_send_unknown_connection() {
        let registry = ConnectionRegistry::new();
        let id = Uuid::new_v4();
        let result = registry
            .send(id, OutboundEvent::Text { text: "x".to_string() })
            .await;
        assert!(matches!(result, Err(NetworkError::UnknownConnection(found)) if found == id));
    }

    #[tokio::test]
    async fn test_send_to_closed_session() {
        let registry = ConnectionRegistry::new();
        let (id, rx, _caps) = register(&registry).await;
        drop(rx);

        let result = registry
            .send(id, OutboundEvent::Text { text: "x".to_string() })
            .await;
        assert!(matches!(result, Err(NetworkError::ConnectionClosed(_))));
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let registry = ConnectionRegistry::new();
        let counter = registry.counter();
        let (id, _rx, _caps) = register(&registry).await;
        assert_eq!(counter.load(Ordering::Relaxed), 1);

        assert!(registry.unregister(id).await);
        assert!(!registry.unregister(id).await);
        assert_eq!(registry.connection_count().await, 0);
        assert_eq!(counter.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_broadcast() {
        let registry = ConnectionRegistry::new();
        let (first, mut rx1, _c1) = register(&registry).await;
        let (_second, mut rx2, _c2) = register(&registry).await;
        let (_third, rx3, _c3) = register(&registry).await;
        drop(rx3);

        let event = OutboundEvent::Line {
            text: "The server is rebooting.".to_string(),
        };
        assert_eq!(registry.broadcast(event.clone()).await, 2);
        assert_eq!(rx1.recv().await, Some(event.clone()));
        assert_eq!(rx2.recv().await, Some(event.clone()));

        assert_eq!(registry.broadcast_to(&[first, Uuid::new_v4()], event).await, 1);
    }

    #[tokio::test]
    async fn test_send_waits_for_full_queue() {
        let registry = Arc::new(ConnectionRegistry::new());
        let (id, mut rx, _caps) = register_with_capacity(&registry, 1).await;
        let first = OutboundEvent::Text { text: "1".to_string() };
        let second = OutboundEvent::Text { text: "2".to_string() };

        registry.send(id, first.clone()).await.unwrap();
        let pending = {
            let registry = Arc::clone(&registry);
            let second = second.clone();
            tokio::spawn(async move { registry.send(id, second).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        // A waiting sender must not block registration
        let (_other, _rx2, _c2) = register(&registry).await;
        assert_eq!(registry.connection_count().await, 2);

        assert_eq!(rx.recv().await, Some(first));
        pending.await.unwrap().unwrap();
        assert_eq!(rx.recv().await, Some(second));
    }

    #[tokio::test]
    async fn test_broadcast_skips_full_queues() {
        let registry = ConnectionRegistry::new();
        let (full, mut rx1, _c1) = register_with_capacity(&registry, 1).await;
        let (_open, mut rx2, _c2) = register_with_capacity(&registry, 4).await;

        let filler = OutboundEvent::Text { text: "filler".to_string() };
        registry.send(full, filler.clone()).await.unwrap();

        let event = OutboundEvent::Line {
            text: "The server is rebooting.".to_string(),
        };
        assert_eq!(registry.broadcast(event.clone()).await, 1);
        assert_eq!(rx2.recv().await, Some(event));
        assert_eq!(rx1.recv().await, Some(filler));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_info_tracks_capabilities() {
        let registry = ConnectionRegistry::new();
        let (id, _rx, caps_tx) = register(&registry).await;

        caps_tx.send_replace(ClientCapabilities {
            screen_width: 132,
            ..Default::default()
        });

        let info = registry.get(id).await.unwrap();
        assert_eq!(info.capabilities.screen_width, 132);
        assert_eq!(registry.connections().await.len(), 1);
    }

    #[tokio::test]
    async fn test_forced_collision_is_retried() {
        let fixed = Uuid::from_u128(1);
        let fresh = Uuid::from_u128(2);
        let sequence = Mutex::new(vec![fresh, fixed, fixed, fixed]);
        let registry = ConnectionRegistry::with_id_generator(Box::new(move || {
            sequence.lock().unwrap().pop().unwrap_or_else(Uuid::new_v4)
        }));

        let (first, _rx1, _c1) = register(&registry).await;
        let (second, _rx2, _c2) = register(&registry).await;

        assert_eq!(first, fixed);
        assert_eq!(second, fresh);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_registrations_are_unique() {
        let registry = Arc::new(ConnectionRegistry::new());
        let mut tasks = Vec::new();
        for _ in 0..64 {
            let registry = Arc::clone(&registry);
            tasks.push(tokio::spawn(async move {
                let (id, rx, caps) = register(&registry).await;
                // Keep the receiving ends alive until the count is checked
                (id, rx, caps)
            }));
        }

        let mut ids = HashSet::new();
        let mut keep = Vec::new();
        for task in tasks {
            let (id, rx, caps) = task.await.unwrap();
            ids.insert(id);
            keep.push((rx, caps));
        }
        assert_eq!(ids.len(), 64);
        assert_eq!(registry.connection_count().await, 64);
    }
}
