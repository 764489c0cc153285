//! Connection pool: one [`McpClient`] per distinct server configuration,
//! reference-counted and reused across callers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use genflow_types::ConnectionError;
use tokio::sync::{Mutex, RwLock};

use crate::client::McpClient;
use crate::config::McpServerConfig;

struct Entry {
    client: Arc<McpClient>,
    ref_count: AtomicI64,
}

/// A snapshot of the pool's current state, for diagnostics.
#[derive(Debug, Clone)]
pub struct PoolInfo {
    /// Number of distinct server configurations with an active connection.
    pub active_connections: usize,
    /// Reference count per server fingerprint.
    pub connection_counts: HashMap<String, i64>,
    /// Fingerprints of servers currently pooled.
    pub servers: Vec<String>,
}

/// Pools [`McpClient`] connections keyed by [`McpServerConfig::fingerprint`].
///
/// Releasing a client back to the pool only decrements its reference count;
/// it does not disconnect the underlying process. Connections are reused
/// for the lifetime of the pool and torn down explicitly via
/// [`shutdown`](Self::shutdown).
#[derive(Default)]
pub struct ConnectionPool {
    entries: RwLock<HashMap<String, Entry>>,
    /// Per-fingerprint creation locks, held across `connect()` so concurrent
    /// first-acquirers for the same key share one connect attempt instead of
    /// each locking a freshly allocated mutex.
    creation_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ConnectionPool {
    /// Build an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a connected client for `config`, creating and connecting one if
    /// none exists yet for this fingerprint. Increments the reference count.
    pub async fn acquire(&self, config: &McpServerConfig) -> Result<Arc<McpClient>, ConnectionError> {
        let key = config.fingerprint();

        if let Some(client) = self.try_reuse(&key).await {
            return Ok(client);
        }

        let creation_lock = self.creation_lock_for(&key).await;
        let _guard = creation_lock.lock().await;

        // Another caller may have created the client while we waited for
        // the creation lock.
        if let Some(client) = self.try_reuse(&key).await {
            return Ok(client);
        }

        let client = Arc::new(McpClient::new(config.clone()));
        client.connect().await?;

        let mut entries = self.entries.write().await;
        entries.insert(key, Entry { client: Arc::clone(&client), ref_count: AtomicI64::new(1) });
        Ok(client)
    }

    /// Release a previously acquired client, decrementing its reference
    /// count. The connection is kept alive for reuse regardless of whether
    /// the count reaches zero.
    pub async fn release(&self, config: &McpServerConfig) {
        let key = config.fingerprint();
        let entries = self.entries.read().await;
        if let Some(entry) = entries.get(&key) {
            entry.ref_count.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Disconnect and remove every pooled connection.
    pub async fn shutdown(&self) {
        let mut entries = self.entries.write().await;
        for (_, entry) in entries.drain() {
            entry.client.disconnect().await;
        }
        self.creation_locks.lock().await.clear();
    }

    /// A snapshot of pool occupancy, for diagnostics.
    pub async fn info(&self) -> PoolInfo {
        let entries = self.entries.read().await;
        PoolInfo {
            active_connections: entries.len(),
            connection_counts: entries.iter().map(|(k, e)| (k.clone(), e.ref_count.load(Ordering::SeqCst))).collect(),
            servers: entries.keys().cloned().collect(),
        }
    }

    async fn try_reuse(&self, key: &str) -> Option<Arc<McpClient>> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if !entry.client.is_connected().await {
            return None;
        }
        entry.ref_count.fetch_add(1, Ordering::SeqCst);
        Some(Arc::clone(&entry.client))
    }

    async fn creation_lock_for(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.creation_locks.lock().await;
        Arc::clone(locks.entry(key.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn acquire_reuses_connection_for_identical_config() {
        let pool = ConnectionPool::new();
        let config = McpServerConfig::new("cat");

        let a = pool.acquire(&config).await.unwrap();
        let b = pool.acquire(&config).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));

        let info = pool.info().await;
        assert_eq!(info.active_connections, 1);
        assert_eq!(info.connection_counts[&config.fingerprint()], 2);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn acquire_creates_distinct_connections_for_distinct_fingerprints() {
        let pool = ConnectionPool::new();
        let a_config = McpServerConfig::new("cat").with_args(["-u"]);
        let b_config = McpServerConfig::new("cat").with_env("DISTINCT", "b");

        let a = pool.acquire(&a_config).await.unwrap();
        let b = pool.acquire(&b_config).await.unwrap();
        assert!(!Arc::ptr_eq(&a, &b));

        assert_eq!(pool.info().await.active_connections, 2);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn release_does_not_disconnect_at_zero_references() {
        let pool = ConnectionPool::new();
        let config = McpServerConfig::new("cat");

        let client = pool.acquire(&config).await.unwrap();
        pool.release(&config).await;
        assert!(client.is_connected().await);

        pool.shutdown().await;
    }

    #[tokio::test]
    async fn concurrent_first_acquirers_for_the_same_key_share_one_connection() {
        let pool = Arc::new(ConnectionPool::new());
        let config = McpServerConfig::new("cat");

        let (a, b) = tokio::join!(pool.acquire(&config), pool.acquire(&config));
        let (a, b) = (a.unwrap(), b.unwrap());
        assert!(Arc::ptr_eq(&a, &b));

        let info = pool.info().await;
        assert_eq!(info.active_connections, 1);
        assert_eq!(info.connection_counts[&config.fingerprint()], 2);

        pool.shutdown().await;
    }
}
