use crate::listing::PublishResponse;
use redis::AsyncCommands;
use std::{collections::HashMap, sync::Arc, time::Duration};
use tokio::{sync::Mutex, time::Instant};

/// Replays publish results keyed by `Idempotency-Key`. Redis when configured,
/// otherwise a process-local map. Both forget a key after `ttl_secs`.
#[derive(Clone)]
pub struct IdempotencyStore {
    redis: Option<redis::Client>,
    local: Arc<Mutex<HashMap<String, (Instant, PublishResponse)>>>,
    ttl_secs: u64,
}

impl IdempotencyStore {
    pub fn new(redis: Option<redis::Client>, ttl_secs: u64) -> Self {
        Self {
            redis,
            local: Arc::new(Mutex::new(HashMap::new())),
            ttl_secs,
        }
    }

    pub fn from_env() -> Self {
        let redis = std::env::var("REDIS_URL")
            .ok()
            .and_then(|u| redis::Client::open(u).ok());
        let ttl = std::env::var("IDEMPOTENCY_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(3600);
        Self::new(redis, ttl)
    }

    pub async fn get(&self, key: &str) -> Option<PublishResponse> {
        match &self.redis {
            Some(client) => redis_get(client, key).await,
            None => {
                let mut local = self.local.lock().await;
                prune(&mut local, self.ttl());
                local.get(key).map(|(_, response)| response.clone())
            }
        }
    }

    pub async fn put(&self, key: String, value: &PublishResponse) {
        match &self.redis {
            Some(client) => redis_set(client, &key, value, self.ttl_secs).await,
            None => {
                let mut local = self.local.lock().await;
                prune(&mut local, self.ttl());
                local.insert(key, (Instant::now(), value.clone()));
            }
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

fn prune(local: &mut HashMap<String, (Instant, PublishResponse)>, ttl: Duration) {
    local.retain(|_, (stored, _)| stored.elapsed() < ttl);
}

async fn redis_get(client: &redis::Client, key: &str) -> Option<PublishResponse> {
    let mut conn = match client.get_multiplexed_async_connection().await {
        Ok(c) => c,
        Err(_) => return None,
    };
    let s: Option<String> = conn.get(key).await.ok();
    s.and_then(|v| serde_json::from_str(&v).ok())
}

async fn redis_set(client: &redis::Client, key: &str, value: &PublishResponse, ttl_secs: u64) {
    if let Ok(mut conn) = client.get_multiplexed_async_connection().await
        && let Ok(json) = serde_json::to_string(value)
    {
        let _: Result<(), _> = conn.set_ex(key, json, ttl_secs).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response() -> PublishResponse {
        PublishResponse {
            product_id: 7,
            product_url: "https://store/admin/products/7".into(),
            price: 2500.0,
            variants: 2,
            sheet_rows_logged: 2,
            sheet_rows_failed: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn local_keys_expire_after_ttl() {
        let store = IdempotencyStore::new(None, 60);
        store.put("old".into(), &response()).await;
        tokio::time::advance(Duration::from_secs(59)).await;
        assert!(store.get("old").await.is_some());

        store.put("new".into(), &response()).await;
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get("old").await.is_none());
        assert!(store.get("new").await.is_some());
        assert_eq!(store.local.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn local_store_replays_by_key() {
        let store = IdempotencyStore::new(None, 60);
        let response = response();
        assert!(store.get("k1").await.is_none());
        store.put("k1".into(), &response).await;
        assert_eq!(store.get("k1").await, Some(response));
        assert!(store.get("k2").await.is_none());
    }
}
