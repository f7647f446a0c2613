use std::{sync::Mutex, time::Duration};

use ::redis::Commands;

use crate::{
    foundation::error::{DerivaError, DerivaResult},
    store::kv::KeyValueCache,
};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// [`KeyValueCache`] backed by a Redis-compatible server.
///
/// One connection is shared by all workers. It is opened lazily and dropped after any command
/// error, so the next call reconnects.
pub struct RedisCache {
    client: ::redis::Client,
    conn: Mutex<Option<::redis::Connection>>,
    timeout: Duration,
}

impl RedisCache {
    /// Client for `host:port`. No connection is made until the first command.
    pub fn connect(host: &str, port: u16) -> DerivaResult<Self> {
        let url = format!("redis://{host}:{port}/");
        let client = ::redis::Client::open(url.as_str())
            .map_err(|e| DerivaError::config_fatal(format!("invalid store address {url}: {e}")))?;
        Ok(Self {
            client,
            conn: Mutex::new(None),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    /// Override the connect and IO timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn with_conn<T>(
        &self,
        op: &str,
        f: impl FnOnce(&mut ::redis::Connection) -> ::redis::RedisResult<T>,
    ) -> DerivaResult<T> {
        let mut slot = self
            .conn
            .lock()
            .map_err(|_| DerivaError::store_unavailable("store connection lock poisoned"))?;

        if slot.is_none() {
            let conn = self
                .client
                .get_connection_with_timeout(self.timeout)
                .map_err(|e| DerivaError::store_unavailable(format!("connect: {e}")))?;
            conn.set_read_timeout(Some(self.timeout))
                .and_then(|_| conn.set_write_timeout(Some(self.timeout)))
                .map_err(|e| DerivaError::store_unavailable(format!("connect: {e}")))?;
            tracing::debug!("store connection established");
            *slot = Some(conn);
        }

        let Some(conn) = slot.as_mut() else {
            return Err(DerivaError::store_unavailable("no connection"));
        };
        match f(conn) {
            Ok(v) => Ok(v),
            Err(e) => {
                *slot = None;
                Err(DerivaError::store_unavailable(format!("{op}: {e}")))
            }
        }
    }
}

impl KeyValueCache for RedisCache {
    fn get(&self, key: &str) -> DerivaResult<Option<Vec<u8>>> {
        self.with_conn("GET", |c| c.get::<_, Option<Vec<u8>>>(key))
    }

    fn set(&self, key: &str, value: &[u8]) -> DerivaResult<()> {
        self.with_conn("SET", |c| c.set::<_, _, ()>(key, value))
    }

    fn expire(&self, key: &str, ttl: Duration) -> DerivaResult<()> {
        let secs = i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX).max(1);
        self.with_conn("EXPIRE", |c| c.expire::<_, ()>(key, secs))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/store/redis.rs"]
mod tests;
