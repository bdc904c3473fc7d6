//! Redis adapter for the cache client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};

use crate::cache::{CacheConnection, CacheConnector, CacheError};

/// Opens multiplexed connections to one Redis endpoint.
#[derive(Clone)]
pub struct RedisConnector {
    client: Client,
}

impl RedisConnector {
    pub fn new(url: &str) -> Result<Self, CacheError> {
        let client = Client::open(url)
            .map_err(|err| CacheError::connection(format!("invalid redis url: {err}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CacheConnector for RedisConnector {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn connect(&self) -> Result<Arc<dyn CacheConnection>, CacheError> {
        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|err| CacheError::connection(err.to_string()))?;
        Ok(Arc::new(RedisConnection { connection }))
    }
}

pub struct RedisConnection {
    connection: MultiplexedConnection,
}

impl RedisConnection {
    fn handle(&self) -> MultiplexedConnection {
        self.connection.clone()
    }
}

fn map_redis_error(op: &'static str, err: RedisError) -> CacheError {
    if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        CacheError::connection(err.to_string())
    } else {
        CacheError::command(op, err.to_string())
    }
}

/// Redis expiries have second granularity; never send `EX 0`.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl CacheConnection for RedisConnection {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.handle();
        let value: Option<String> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("get", err))?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.handle();
        let _: () = redis::cmd("SETEX")
            .arg(key)
            .arg(ttl_secs(ttl))
            .arg(value)
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("setex", err))?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.handle();
        let removed: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("del", err))?;
        Ok(removed > 0)
    }

    async fn increment(&self, key: &str, amount: i64) -> Result<i64, CacheError> {
        let mut conn = self.handle();
        let value: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(amount)
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("incrby", err))?;
        Ok(value)
    }

    async fn exists(&self, key: &str) -> Result<bool, CacheError> {
        let mut conn = self.handle();
        let count: i64 = redis::cmd("EXISTS")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("exists", err))?;
        Ok(count > 0)
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<String>>, CacheError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.handle();
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("mget", err))?;
        Ok(values)
    }

    async fn multi_set(
        &self,
        entries: &[(String, String)],
        ttl: Duration,
    ) -> Result<(), CacheError> {
        if entries.is_empty() {
            return Ok(());
        }
        let seconds = ttl_secs(ttl);
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in entries {
            pipe.cmd("SETEX").arg(key).arg(seconds).arg(value).ignore();
        }

        let mut conn = self.handle();
        let _: () = pipe
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("pipeline_setex", err))?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        let mut conn = self.handle();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("ping", err))?;
        Ok(())
    }

    async fn flush(&self) -> Result<(), CacheError> {
        let mut conn = self.handle();
        let _: () = redis::cmd("FLUSHDB")
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("flushdb", err))?;
        Ok(())
    }

    async fn key_count(&self) -> Result<u64, CacheError> {
        let mut conn = self.handle();
        let count: u64 = redis::cmd("DBSIZE")
            .query_async(&mut conn)
            .await
            .map_err(|err| map_redis_error("dbsize", err))?;
        Ok(count)
    }
}
