//! Read-through view cache
//!
//! Caches rendered list views keyed by project/zone. Writers invalidate by
//! key prefix after committing, so a whole project's views drop together
//! after a batch commit, rollback, or cleanup.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use uuid::Uuid;

struct CacheEntry {
    inserted_at: Instant,
    value: serde_json::Value,
}

#[derive(Clone)]
pub struct ViewCache {
    ttl: Duration,
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl ViewCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, key: &str) -> Option<serde_json::Value> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.inserted_at.elapsed() > self.ttl {
            return None;
        }
        Some(entry.value.clone())
    }

    pub async fn put(&self, key: String, value: serde_json::Value) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                value,
            },
        );
    }

    /// Drop every entry whose key starts with the prefix; returns how many
    /// were removed
    pub async fn invalidate_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        before - entries.len()
    }
}

/// Cache key for one project's element list view
pub fn elements_key(project_id: Uuid, zone_id: Option<Uuid>) -> String {
    match zone_id {
        Some(zone_id) => format!("elements:{}:{}", project_id, zone_id),
        None => format!("elements:{}:all", project_id),
    }
}

/// Invalidation prefix covering every view of one project
pub fn project_prefix(project_id: Uuid) -> String {
    format!("elements:{}:", project_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn prefix_invalidation_drops_only_matching_keys() {
        let cache = ViewCache::new(Duration::from_secs(60));
        let p1 = Uuid::new_v4();
        let p2 = Uuid::new_v4();

        cache.put(elements_key(p1, None), json!([1])).await;
        cache.put(elements_key(p1, Some(Uuid::new_v4())), json!([2])).await;
        cache.put(elements_key(p2, None), json!([3])).await;

        let removed = cache.invalidate_prefix(&project_prefix(p1)).await;
        assert_eq!(removed, 2);
        assert!(cache.get(&elements_key(p1, None)).await.is_none());
        assert!(cache.get(&elements_key(p2, None)).await.is_some());
    }

    #[tokio::test]
    async fn entries_expire_after_ttl() {
        let cache = ViewCache::new(Duration::from_millis(5));
        cache.put("elements:x:all".to_string(), json!([])).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("elements:x:all").await.is_none());
    }
}
