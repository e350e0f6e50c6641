//! Redis-backed broker.
//!
//! Command mapping:
//!
//! | Broker operation   | Redis                              |
//! |--------------------|------------------------------------|
//! | `push_tail`        | `RPUSH list value`                 |
//! | `pop_head`         | `LPOP list count` (Redis >= 6.2)   |
//! | `range_head`       | `LRANGE list 0 count-1`            |
//! | `trim_head`        | `LTRIM list count -1`              |
//! | `list_len`         | `LLEN list`                        |
//! | `set_with_ttl`     | `SET key value PX ttl_ms`          |
//! | `get` / `delete`   | `GET key` / `DEL key`              |
//! | `take`             | `MULTI; GET key; DEL key; EXEC`    |

use std::time::Duration;
use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::{Client, RedisError};
use tracing::debug;
use super::{Broker, BrokerError, BrokerResult};

fn command_error(op: &'static str) -> impl FnOnce(RedisError) -> BrokerError {
    move |e| BrokerError::Command(format!("{op} failed: {e}"))
}

/// A [`Broker`] backed by a Redis server.
///
/// Holds a single multiplexed [`ConnectionManager`], which reconnects on its own
/// after a dropped connection. Cloning shares the connection.
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    /// Connect to the Redis server at `redis_url` (e.g. `redis://localhost:6379`).
    pub async fn connect(redis_url: impl AsRef<str>) -> BrokerResult<Self> {
        let client = Client::open(redis_url.as_ref())
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| BrokerError::Connection(e.to_string()))?;
        debug!("connected to redis");
        Ok(Self { conn })
    }
}

impl std::fmt::Debug for RedisBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisBroker").finish_non_exhaustive()
    }
}

#[async_trait]
impl Broker for RedisBroker {
    async fn push_tail(&self, list: &str, value: Vec<u8>) -> BrokerResult<()> {
        let mut conn = self.conn.clone();
        let _: i64 = ::redis::cmd("RPUSH")
            .arg(list)
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(command_error("RPUSH"))?;
        Ok(())
    }

    async fn pop_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>> {
        if count == 0 {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        // nil when the list is missing
        let popped: Option<Vec<Vec<u8>>> = ::redis::cmd("LPOP")
            .arg(list)
            .arg(count)
            .query_async(&mut conn)
            .await
            .map_err(command_error("LPOP"))?;
        Ok(popped.unwrap_or_default())
    }

    async fn range_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>> {
        if count == 0 {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        let stop = count as i64 - 1;
        let values: Vec<Vec<u8>> = ::redis::cmd("LRANGE")
            .arg(list)
            .arg(0)
            .arg(stop)
            .query_async(&mut conn)
            .await
            .map_err(command_error("LRANGE"))?;
        Ok(values)
    }

    async fn trim_head(&self, list: &str, count: usize) -> BrokerResult<()> {
        if count == 0 {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let _: () = ::redis::cmd("LTRIM")
            .arg(list)
            .arg(count)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(command_error("LTRIM"))?;
        Ok(())
    }

    async fn range_trim_head(&self, list: &str, count: usize) -> BrokerResult<Vec<Vec<u8>>> {
        if count == 0 {
            return Ok(vec![]);
        }
        let mut conn = self.conn.clone();
        let (values, ()): (Vec<Vec<u8>>, ()) = ::redis::pipe()
            .atomic()
            .cmd("LRANGE")
            .arg(list)
            .arg(0)
            .arg(count as i64 - 1)
            .cmd("LTRIM")
            .arg(list)
            .arg(count)
            .arg(-1)
            .query_async(&mut conn)
            .await
            .map_err(command_error("LRANGE/LTRIM"))?;
        Ok(values)
    }

    async fn list_len(&self, list: &str) -> BrokerResult<usize> {
        let mut conn = self.conn.clone();
        let len: usize = ::redis::cmd("LLEN")
            .arg(list)
            .query_async(&mut conn)
            .await
            .map_err(command_error("LLEN"))?;
        Ok(len)
    }

    async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> BrokerResult<()> {
        // PX 0 is rejected by redis
        let ttl_ms = ttl.as_millis().max(1) as u64;
        let mut conn = self.conn.clone();
        let _: () = ::redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("PX")
            .arg(ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(command_error("SET"))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> BrokerResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = ::redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(command_error("GET"))?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> BrokerResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = ::redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(command_error("DEL"))?;
        Ok(removed > 0)
    }

    async fn take(&self, key: &str) -> BrokerResult<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let (value, _removed): (Option<Vec<u8>>, i64) = ::redis::pipe()
            .atomic()
            .cmd("GET")
            .arg(key)
            .cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(command_error("GET/DEL"))?;
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn broker() -> RedisBroker {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        RedisBroker::connect(url).await.expect("redis reachable")
    }

    fn unique(prefix: &str) -> String {
        format!("skewer:test:{prefix}:{}", uuid::Uuid::new_v4())
    }

    #[tokio::test]
    #[ignore = "requires a running redis server (REDIS_URL)"]
    async fn test_pop_head_is_fifo() {
        let broker = broker().await;
        let list = unique("list");
        for v in [b"a", b"b", b"c"] {
            broker.push_tail(&list, v.to_vec()).await.unwrap();
        }

        assert_eq!(broker.pop_head(&list, 2).await.unwrap(), vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(broker.pop_head(&list, 2).await.unwrap(), vec![b"c".to_vec()]);
        assert!(broker.pop_head(&list, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a running redis server (REDIS_URL)"]
    async fn test_range_then_trim() {
        let broker = broker().await;
        let list = unique("list");
        for v in [b"a", b"b", b"c"] {
            broker.push_tail(&list, v.to_vec()).await.unwrap();
        }

        assert_eq!(broker.range_head(&list, 2).await.unwrap().len(), 2);
        broker.trim_head(&list, 2).await.unwrap();
        assert_eq!(broker.list_len(&list).await.unwrap(), 1);
        broker.trim_head(&list, 1).await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires a running redis server (REDIS_URL)"]
    async fn test_range_trim_head_in_one_transaction() {
        let broker = broker().await;
        let list = unique("list");
        for v in [b"a", b"b", b"c"] {
            broker.push_tail(&list, v.to_vec()).await.unwrap();
        }

        let head = broker.range_trim_head(&list, 2).await.unwrap();
        assert_eq!(head, vec![b"a".to_vec(), b"b".to_vec()]);
        assert_eq!(broker.list_len(&list).await.unwrap(), 1);
        assert_eq!(broker.range_trim_head(&list, 2).await.unwrap(), vec![b"c".to_vec()]);
        assert!(broker.range_trim_head(&list, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires a running redis server (REDIS_URL)"]
    async fn test_take_is_destructive() {
        let broker = broker().await;
        let key = unique("key");
        broker.set_with_ttl(&key, b"v".to_vec(), Duration::from_secs(30)).await.unwrap();

        assert_eq!(broker.take(&key).await.unwrap(), Some(b"v".to_vec()));
        assert_eq!(broker.take(&key).await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires a running redis server (REDIS_URL)"]
    async fn test_value_expires() {
        let broker = broker().await;
        let key = unique("key");
        broker.set_with_ttl(&key, b"v".to_vec(), Duration::from_millis(50)).await.unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(broker.get(&key).await.unwrap(), None);
    }
}
