use std::time::Instant;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tokio::sync::OnceCell;

use super::{Store, StoreCheck, StoreStatus};
use crate::error::RateLimitError;

/// Lua script implementing the atomic check-and-admit sequence from §4.5:
/// evict expired members, count the remainder, and either admit (adding a
/// new member and refreshing the TTL) or reject.
///
/// `redis::Script` caches the script's SHA1 and issues `EVALSHA`, falling
/// back to a full `EVAL` transparently on a `NOSCRIPT` miss — this is the
/// "client caches the hash, falls back to full script on cache miss"
/// requirement from §9, already handled by the crate rather than
/// reimplemented here.
const CHECK_SCRIPT: &str = r#"
local key = KEYS[1]
local now_ms = tonumber(ARGV[1])
local window_ms = tonumber(ARGV[2])
local capacity = tonumber(ARGV[3])
local member = ARGV[4]

redis.call('ZREMRANGEBYSCORE', key, '-inf', now_ms - window_ms)
local n = redis.call('ZCARD', key)

if n < capacity then
    redis.call('ZADD', key, now_ms, member)
    redis.call('PEXPIRE', key, window_ms)
    return {1, capacity - n - 1, n + 1}
else
    return {0, 0, n}
end
"#;

/// Redis-backed implementation of [`Store`] using a sorted set per client,
/// scored by admission time in milliseconds (§6.3).
///
/// Uses `redis::aio::ConnectionManager` rather than a raw
/// `MultiplexedConnection` so a dropped connection reconnects
/// transparently — callers of the distributed limiter should never need
/// to retry a `decide()` call themselves because the underlying TCP
/// connection blinked.
///
/// The connection itself is established lazily, on first use, behind a
/// `tokio::sync::OnceCell`. `connect()` only parses the URL: a Redis
/// endpoint that's unreachable at policy-construction time must not fail
/// `Factory::create` (§7's fail-open contract applies from the first
/// `decide()` call onward, not only once a connection has succeeded), so
/// the actual dial — and any failure to complete it — happens inside
/// `check`/`reset`/`inspect`, where it surfaces as a `Store` error the
/// distributed limiter already handles by admitting and logging.
pub struct RedisStore {
    client: redis::Client,
    conn: OnceCell<ConnectionManager>,
    script: Script,
    key_prefix: String,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl RedisStore {
    /// Parse `redis_url` and prepare the check script. No network I/O
    /// happens here; the first `ConnectionManager` dial is deferred to the
    /// first call that actually needs a connection.
    pub fn connect(redis_url: &str) -> Result<Self, RateLimitError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| RateLimitError::Store(format!("invalid redis url: {e}")))?;
        Ok(Self {
            client,
            conn: OnceCell::new(),
            script: Script::new(CHECK_SCRIPT),
            key_prefix: "rate_limit:".to_string(),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, RateLimitError> {
        self.conn
            .get_or_try_init(|| async {
                ConnectionManager::new(self.client.clone())
                    .await
                    .map_err(|e| RateLimitError::Store(format!("redis connect failed: {e}")))
            })
            .await
            .cloned()
    }

    fn key(&self, client_id: &str) -> String {
        format!("{}{}", self.key_prefix, client_id)
    }
}

#[async_trait]
impl Store for RedisStore {
    async fn check(
        &self,
        client_id: &str,
        now_ms: i64,
        window_ms: i64,
        capacity: u64,
    ) -> Result<StoreCheck, RateLimitError> {
        let member = format!("{now_ms}-{}", rand::random::<u32>());
        let mut conn = self.connection().await?;

        let started = Instant::now();
        let result: Result<Vec<i64>, _> = self
            .script
            .key(self.key(client_id))
            .arg(now_ms)
            .arg(window_ms)
            .arg(capacity)
            .arg(member)
            .invoke_async(&mut conn)
            .await;
        metrics::histogram!("ratelimit_engine_store_latency_seconds").record(started.elapsed().as_secs_f64());
        let result = result.map_err(|e| RateLimitError::Store(format!("script invocation failed: {e}")))?;

        let [admitted, remaining, in_window] = <[i64; 3]>::try_from(result).map_err(|_| {
            RateLimitError::Store("unexpected script return shape".to_string())
        })?;

        Ok(StoreCheck {
            admitted: admitted == 1,
            remaining: remaining.max(0) as u64,
            in_window: in_window.max(0) as u64,
        })
    }

    async fn reset(&self, client_id: &str) -> Result<(), RateLimitError> {
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(self.key(client_id))
            .await
            .map_err(|e| RateLimitError::Store(format!("redis DEL failed: {e}")))
    }

    async fn inspect(&self, client_id: &str) -> Result<StoreStatus, RateLimitError> {
        let mut conn = self.connection().await?;
        let key = self.key(client_id);
        let in_window: u64 = conn
            .zcard(&key)
            .await
            .map_err(|e| RateLimitError::Store(format!("redis ZCARD failed: {e}")))?;
        let ttl: i64 = conn
            .ttl(&key)
            .await
            .map_err(|e| RateLimitError::Store(format!("redis TTL failed: {e}")))?;
        Ok(StoreStatus {
            in_window,
            ttl_secs: if ttl >= 0 { Some(ttl) } else { None },
        })
    }
}
