use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::Instant;
use super::{Broker, BrokerResult};

/// A value in the key space together with its expiry deadline.
#[derive(Debug, Clone)]
struct Expiring {
    value: Vec<u8>,
    expires_at: Instant,
}

impl Expiring {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

#[derive(Debug, Default)]
struct State {
    lists: HashMap<String, VecDeque<Vec<u8>>>,
    keys: HashMap<String, Expiring>,
}

impl State {
    /// Returns the live entry for `key`, evicting it first if it has expired.
    fn live_entry(&mut self, key: &str, now: Instant) -> Option<&Expiring> {
        let expired = self.keys.get(key).is_some_and(|entry| !entry.is_live(now));
        if expired {
            self.keys.remove(key);
        }
        self.keys.get(key)
    }
}

/// # MemoryBroker
///
/// An in-process [`Broker`] holding lists and expiring keys behind a single
/// async mutex. Every trait method takes the lock once, so each call is atomic
/// with respect to every other call, which is exactly what the trait asks of
/// [`Broker::pop_head`] and [`Broker::take`].
///
/// Expiry is measured with [`tokio::time::Instant`], so tests running with a
/// paused clock can advance past a TTL deterministically. An expired key is
/// evicted when it is next touched, and every write sweeps out all expired
/// keys, so orphaned values do not accumulate.
///
/// Cloning is cheap and clones share state, so one instance can stand in for
/// a broker shared by several producers and workers.
#[derive(Debug, Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently stored, expired or not.
    ///
    /// Used by tests to observe lazy eviction.
    pub async fn key_count(&self) -> usize {
        self.state.lock().await.keys.len()
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn push_tail(&self, list: &str, value: Vec<u8>) -> BrokerResult<()> {
        let mut state = self.state.lock().await;
        state.lists.entry(list.to_string()).or_default().push_back(value);
        Ok(())
    }

    async fn pop_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>> {
        let mut state = self.state.lock().await;
        let Some(entries) = state.lists.get_mut(list) else {
            return Ok(vec![]);
        };
        let take = count.min(entries.len());
        let popped = entries.drain(..take).collect::<Vec<_>>();
        if entries.is_empty() {
            state.lists.remove(list);
        }
        Ok(popped)
    }

    async fn range_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>> {
        let state = self.state.lock().await;
        Ok(state
            .lists
            .get(list)
            .map(|entries| entries.iter().take(count).cloned().collect())
            .unwrap_or_default())
    }

    async fn trim_head(&self, list: &str, count: usize) -> BrokerResult<()> {
        let mut state = self.state.lock().await;
        if let Some(entries) = state.lists.get_mut(list) {
            let take = count.min(entries.len());
            entries.drain(..take);
            if entries.is_empty() {
                state.lists.remove(list);
            }
        }
        Ok(())
    }

    async fn range_trim_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>> {
        // same effect as a pop while the lock is held
        self.pop_head(list, count).await
    }

    async fn list_len(&self, list: &str) -> BrokerResult<usize> {
        let state = self.state.lock().await;
        Ok(state.lists.get(list).map(VecDeque::len).unwrap_or(0))
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BrokerResult<()> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        // results nobody reads are never touched again; reclaim them here
        state.keys.retain(|_, entry| entry.is_live(now));
        state.keys.insert(key.to_string(), Expiring { value, expires_at: now + ttl });
        Ok(())
    }

    async fn get(&self, key: &str) -> BrokerResult<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        Ok(state.live_entry(key, Instant::now()).map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> BrokerResult<bool> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        Ok(state.keys.remove(key).is_some_and(|entry| entry.is_live(now)))
    }

    async fn take(&self, key: &str) -> BrokerResult<Option<Vec<u8>>> {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        Ok(state
            .keys
            .remove(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(s: &str) -> Vec<u8> {
        s.as_bytes().to_vec()
    }

    #[tokio::test]
    async fn test_push_and_pop_preserve_fifo_order() {
        let broker = MemoryBroker::new();
        for v in ["a", "b", "c", "d"] {
            broker.push_tail("q", bytes(v)).await.unwrap();
        }

        let first = broker.pop_head("q", 3).await.unwrap();
        assert_eq!(first, vec![bytes("a"), bytes("b"), bytes("c")]);

        let rest = broker.pop_head("q", 3).await.unwrap();
        assert_eq!(rest, vec![bytes("d")]);
        assert_eq!(broker.list_len("q").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_pop_missing_list_is_empty() {
        let broker = MemoryBroker::new();
        assert!(broker.pop_head("missing", 10).await.unwrap().is_empty());
        assert!(broker.range_head("missing", 10).await.unwrap().is_empty());
        broker.trim_head("missing", 10).await.unwrap();
    }

    #[tokio::test]
    async fn test_range_then_trim() {
        let broker = MemoryBroker::new();
        for v in ["a", "b", "c"] {
            broker.push_tail("q", bytes(v)).await.unwrap();
        }

        let head = broker.range_head("q", 2).await.unwrap();
        assert_eq!(head, vec![bytes("a"), bytes("b")]);
        assert_eq!(broker.list_len("q").await.unwrap(), 3);

        broker.trim_head("q", 2).await.unwrap();
        assert_eq!(broker.range_head("q", 5).await.unwrap(), vec![bytes("c")]);
    }

    #[tokio::test]
    async fn test_lists_are_independent() {
        let broker = MemoryBroker::new();
        broker.push_tail("one", bytes("x")).await.unwrap();
        broker.push_tail("two", bytes("y")).await.unwrap();

        assert_eq!(broker.pop_head("one", 5).await.unwrap(), vec![bytes("x")]);
        assert_eq!(broker.list_len("two").await.unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_keys_expire_after_ttl() {
        let broker = MemoryBroker::new();
        broker.set_with_ttl("k", bytes("v"), Duration::from_secs(5)).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(broker.get("k").await.unwrap(), Some(bytes("v")));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(broker.get("k").await.unwrap(), None);
        assert_eq!(broker.take("k").await.unwrap(), None);

        // the expired key was evicted on access
        assert_eq!(broker.key_count().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_overwrites_and_refreshes_ttl() {
        let broker = MemoryBroker::new();
        broker.set_with_ttl("k", bytes("old"), Duration::from_secs(2)).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        broker.set_with_ttl("k", bytes("new"), Duration::from_secs(2)).await.unwrap();
        tokio::time::advance(Duration::from_millis(1500)).await;

        assert_eq!(broker.get("k").await.unwrap(), Some(bytes("new")));
    }

    #[tokio::test]
    async fn test_take_is_destructive() {
        let broker = MemoryBroker::new();
        broker.set_with_ttl("k", bytes("v"), Duration::from_secs(60)).await.unwrap();

        assert_eq!(broker.take("k").await.unwrap(), Some(bytes("v")));
        assert_eq!(broker.take("k").await.unwrap(), None);
        assert_eq!(broker.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_reports_removal() {
        let broker = MemoryBroker::new();
        broker.set_with_ttl("k", bytes("v"), Duration::from_secs(60)).await.unwrap();

        assert!(broker.delete("k").await.unwrap());
        assert!(!broker.delete("k").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_take_delivers_once() {
        let broker = MemoryBroker::new();
        broker.set_with_ttl("k", bytes("v"), Duration::from_secs(60)).await.unwrap();

        let handles = (0..16)
            .map(|_| {
                let broker = broker.clone();
                tokio::spawn(async move { broker.take("k").await.unwrap() })
            })
            .collect::<Vec<_>>();

        let mut delivered = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                delivered += 1;
            }
        }
        assert_eq!(delivered, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_orphaned_keys_are_swept_by_later_writes() {
        let broker = MemoryBroker::new();
        for i in 0..1000 {
            broker.set_with_ttl(&format!("orphan-{i}"), bytes("r"), Duration::from_secs(1)).await.unwrap();
        }
        assert_eq!(broker.key_count().await, 1000);

        tokio::time::advance(Duration::from_secs(3600)).await;
        broker.set_with_ttl("fresh", bytes("r"), Duration::from_secs(60)).await.unwrap();
        assert!(broker.take("unrelated").await.unwrap().is_none());

        assert_eq!(broker.key_count().await, 1);
        assert_eq!(broker.get("fresh").await.unwrap(), Some(bytes("r")));
    }
}
