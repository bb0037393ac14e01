//! Peer registry.
//!
//! Maps a peer id to its live connection. The original implementation kept
//! a parallel "id set" alongside the map to answer the peer-list query;
//! here the key set of the single `HashMap` already is that set, so there
//! is nothing to keep in sync.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A concurrent map from peer id to the connection value `T` (typically
/// `Arc<Connection<...>>`).
#[derive(Debug)]
pub struct Registry<T> {
    peers: RwLock<HashMap<u64, T>>,
}

impl<T: Clone> Registry<T> {
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    pub async fn insert(&self, id: u64, value: T) {
        self.peers.write().await.insert(id, value);
    }

    pub async fn remove(&self, id: u64) -> Option<T> {
        self.peers.write().await.remove(&id)
    }

    pub async fn get(&self, id: u64) -> Option<T> {
        self.peers.read().await.get(&id).cloned()
    }

    pub async fn len(&self) -> usize {
        self.peers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.peers.read().await.is_empty()
    }

    /// Snapshot of every currently registered id, in arbitrary order.
    pub async fn ids(&self) -> Vec<u64> {
        self.peers.read().await.keys().copied().collect()
    }

    /// Snapshot of every currently registered value, in arbitrary order.
    pub async fn values(&self) -> Vec<T> {
        self.peers.read().await.values().cloned().collect()
    }
}

impl<T: Clone> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub type SharedRegistry<T> = Arc<Registry<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn insert_get_remove_round_trip() {
        let reg: Registry<u32> = Registry::new();
        reg.insert(1, 100).await;
        reg.insert(2, 200).await;
        assert_eq!(reg.get(1).await, Some(100));
        assert_eq!(reg.len().await, 2);

        assert_eq!(reg.remove(1).await, Some(100));
        assert_eq!(reg.get(1).await, None);
        assert_eq!(reg.len().await, 1);
    }

    #[tokio::test]
    async fn ids_reflects_exact_key_set() {
        let reg: Registry<&str> = Registry::new();
        reg.insert(5, "a").await;
        reg.insert(9, "b").await;
        let mut ids = reg.ids().await;
        ids.sort();
        assert_eq!(ids, vec![5, 9]);
    }

    #[tokio::test]
    async fn empty_registry_reports_empty() {
        let reg: Registry<u32> = Registry::new();
        assert!(reg.is_empty().await);
        reg.insert(1, 1).await;
        assert!(!reg.is_empty().await);
    }
}
