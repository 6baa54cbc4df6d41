use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::debug;

use marquee_core::error::BookingError;
use marquee_core::lease::LeaseStore;

// DEL only when the stored holder matches, so a caller whose TTL already
// lapsed cannot delete somebody else's lease.
const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

// EXPIRE to current TTL + requested extension, owner-checked. A key without
// a positive TTL is either gone or unowned; report no extension.
const EXTEND_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    local ttl = redis.call('TTL', KEYS[1])
    if ttl > 0 then
        return redis.call('EXPIRE', KEYS[1], ttl + tonumber(ARGV[2]))
    end
end
return 0
"#;

/// Redis-backed lease store. `SET NX EX` makes acquisition a single atomic
/// operation; there is no separate check-then-set anywhere.
///
/// Fails closed: any Redis error surfaces as `Infrastructure`, which
/// correctness-critical callers treat as "could not acquire".
pub struct RedisLeaseStore {
    client: redis::Client,
}

impl RedisLeaseStore {
    pub fn new(connection_string: &str) -> Result<Self, BookingError> {
        let client =
            redis::Client::open(connection_string).map_err(BookingError::infrastructure)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> Result<MultiplexedConnection, BookingError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(BookingError::infrastructure)
    }
}

#[async_trait]
impl LeaseStore for RedisLeaseStore {
    async fn acquire(&self, key: &str, holder: &str, ttl: Duration) -> Result<bool, BookingError> {
        let mut con = self.conn().await?;
        let ttl_seconds = ttl.as_secs().max(1);

        let outcome: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(holder)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut con)
            .await
            .map_err(BookingError::infrastructure)?;

        let acquired = outcome.is_some();
        debug!(key, holder, acquired, "lease acquire");
        Ok(acquired)
    }

    async fn release(&self, key: &str, holder: &str) -> Result<bool, BookingError> {
        let mut con = self.conn().await?;
        let deleted: i64 = redis::Script::new(RELEASE_SCRIPT)
            .key(key)
            .arg(holder)
            .invoke_async(&mut con)
            .await
            .map_err(BookingError::infrastructure)?;
        Ok(deleted == 1)
    }

    async fn force_release(&self, key: &str) -> Result<(), BookingError> {
        let mut con = self.conn().await?;
        con.del::<_, ()>(key)
            .await
            .map_err(BookingError::infrastructure)?;
        debug!(key, "lease force-released");
        Ok(())
    }

    async fn extend(
        &self,
        key: &str,
        holder: &str,
        additional: Duration,
    ) -> Result<bool, BookingError> {
        let mut con = self.conn().await?;
        let extended: i64 = redis::Script::new(EXTEND_SCRIPT)
            .key(key)
            .arg(holder)
            .arg(additional.as_secs())
            .invoke_async(&mut con)
            .await
            .map_err(BookingError::infrastructure)?;
        Ok(extended == 1)
    }
}
