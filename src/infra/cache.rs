use anyhow::Result;
use redis::{AsyncCommands, Client};
use tracing::warn;

#[derive(Clone)]
pub struct RedisCache {
    client: Client,
}

impl RedisCache {
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)?;
        let mut conn = client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<_, String>(&mut conn).await?;
        Ok(())
    }

    /// Reads a cached page fragment. Connection or decode failures count as a miss.
    pub async fn get_fragment(&self, name: &str, vary_on: &str) -> Option<String> {
        let key = fragment_key(name, vary_on);
        let mut conn = self.client.get_multiplexed_async_connection().await.ok()?;
        match conn.get::<_, Option<String>>(&key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(error = ?err, key = %key, "failed to read fragment cache");
                None
            }
        }
    }

    pub async fn set_fragment(&self, name: &str, vary_on: &str, payload: &str, ttl_seconds: u64) {
        if ttl_seconds == 0 {
            return;
        }
        let key = fragment_key(name, vary_on);
        match self.client.get_multiplexed_async_connection().await {
            Ok(mut conn) => {
                if let Err(err) = conn.set_ex::<_, _, ()>(&key, payload, ttl_seconds).await {
                    warn!(error = ?err, key = %key, "failed to write fragment cache");
                }
            }
            Err(err) => warn!(error = ?err, "failed to connect to fragment cache"),
        }
    }
}

pub fn fragment_key(name: &str, vary_on: &str) -> String {
    format!("fragment:{}:{}", name, vary_on)
}
