//! In-memory implementation of the shared store.
//!
//! Mirrors the store semantics the cache and rate limiter rely on: lazy
//! key expiry, sorted sets ordered by score with inclusive range bounds,
//! and glob-style key listing. Used by tests and by single-process
//! deployments that want shared-store behavior without a server.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};
use crate::timing::unix_now;

use super::SharedStore;

/// Shared store held entirely in process memory.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    strings: HashMap<String, StringEntry>,
    zsets: HashMap<String, ZSet>,
}

struct StringEntry {
    value: String,
    expires_at: f64,
}

#[derive(Default)]
struct ZSet {
    /// (member, score) pairs kept sorted by ascending score.
    members: Vec<(String, f64)>,
    expires_at: Option<f64>,
}

impl Inner {
    /// Drops the sorted set at `key` if its lifetime has lapsed.
    fn expire_zset(&mut self, key: &str, now: f64) {
        let lapsed = self
            .zsets
            .get(key)
            .and_then(|z| z.expires_at)
            .is_some_and(|deadline| now >= deadline);
        if lapsed {
            self.zsets.remove(key);
        }
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Command("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = unix_now();
        let mut inner = self.lock()?;
        if let Some(entry) = inner.strings.get(key) {
            if now < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
        }
        // Removes the entry when it exists but has expired
        inner.strings.remove(key);
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let now = unix_now();
        let mut inner = self.lock()?;
        inner.strings.insert(
            key.to_string(),
            StringEntry {
                value: value.to_string(),
                expires_at: now + ttl.as_secs_f64(),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let from_strings = inner.strings.remove(key).is_some();
        let from_zsets = inner.zsets.remove(key).is_some();
        Ok(u64::from(from_strings || from_zsets))
    }

    async fn keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let now = unix_now();
        let mut inner = self.lock()?;
        inner.strings.retain(|_, entry| now < entry.expires_at);
        inner
            .zsets
            .retain(|_, zset| zset.expires_at.map_or(true, |deadline| now < deadline));

        let mut matched: Vec<String> = inner
            .strings
            .keys()
            .chain(inner.zsets.keys())
            .filter(|key| glob_match(pattern.as_bytes(), key.as_bytes()))
            .cloned()
            .collect();
        matched.sort();
        Ok(matched)
    }

    async fn delete_many(&self, keys: &[String]) -> StoreResult<u64> {
        let mut inner = self.lock()?;
        let mut removed = 0;
        for key in keys {
            if inner.strings.remove(key).is_some() || inner.zsets.remove(key).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> StoreResult<()> {
        let now = unix_now();
        let mut inner = self.lock()?;
        inner.expire_zset(key, now);
        let zset = inner.zsets.entry(key.to_string()).or_default();
        match zset.members.iter_mut().find(|(m, _)| m.as_str() == member) {
            Some(slot) => slot.1 = score,
            None => zset.members.push((member.to_string(), score)),
        }
        zset.members.sort_by(|a, b| a.1.total_cmp(&b.1));
        Ok(())
    }

    async fn zcard(&self, key: &str) -> StoreResult<u64> {
        let now = unix_now();
        let mut inner = self.lock()?;
        inner.expire_zset(key, now);
        Ok(inner.zsets.get(key).map_or(0, |z| z.members.len() as u64))
    }

    async fn zrange_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<Vec<String>> {
        let now = unix_now();
        let mut inner = self.lock()?;
        inner.expire_zset(key, now);
        let members = inner.zsets.get(key).map_or_else(Vec::new, |zset| {
            zset.members
                .iter()
                .filter(|(_, score)| min <= *score && *score <= max)
                .map(|(member, _)| member.clone())
                .collect()
        });
        Ok(members)
    }

    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64) -> StoreResult<u64> {
        let now = unix_now();
        let mut inner = self.lock()?;
        inner.expire_zset(key, now);
        let Some(zset) = inner.zsets.get_mut(key) else {
            return Ok(0);
        };
        let before = zset.members.len();
        zset.members
            .retain(|(_, score)| *score < min || *score > max);
        let removed = (before - zset.members.len()) as u64;
        let now_empty = zset.members.is_empty();
        if now_empty {
            // Empty sorted sets do not exist as keys
            inner.zsets.remove(key);
        }
        Ok(removed)
    }

    async fn expire(&self, key: &str, ttl: Duration) -> StoreResult<()> {
        let now = unix_now();
        let deadline = now + ttl.as_secs_f64();
        let mut inner = self.lock()?;
        if let Some(entry) = inner.strings.get_mut(key) {
            entry.expires_at = deadline;
        } else if let Some(zset) = inner.zsets.get_mut(key) {
            zset.expires_at = Some(deadline);
        }
        Ok(())
    }
}

// == Glob Matching ==
/// Matches `text` against a glob `pattern` supporting `*` and `?`.
///
/// Character classes are not supported; the cache only ever builds
/// prefix patterns like `cache:market_data:*`.
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    let mut p = 0;
    let mut t = 0;
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star = Some(p);
            mark = t;
            p += 1;
        } else if let Some(star_pos) = star {
            // Retry the last `*` against one more character
            p = star_pos + 1;
            mark += 1;
            t = mark;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> MemoryStore {
        MemoryStore::new()
    }

    #[test]
    fn test_glob_match_literal() {
        assert!(glob_match(b"cache:a:1", b"cache:a:1"));
        assert!(!glob_match(b"cache:a:1", b"cache:a:2"));
    }

    #[test]
    fn test_glob_match_star() {
        assert!(glob_match(b"cache:foo:*", b"cache:foo:1"));
        assert!(glob_match(b"cache:foo:*", b"cache:foo:"));
        assert!(!glob_match(b"cache:foo:*", b"cache:bar:1"));
        assert!(glob_match(b"*", b"anything"));
    }

    #[test]
    fn test_glob_match_question_mark() {
        assert!(glob_match(b"cache:?", b"cache:a"));
        assert!(!glob_match(b"cache:?", b"cache:ab"));
    }

    #[test]
    fn test_glob_match_star_backtracking() {
        assert!(glob_match(b"a*b*c", b"a_x_b_y_c"));
        assert!(!glob_match(b"a*b*c", b"a_x_c_y_b"));
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let store = store();
        store
            .set_ex("key1", "value1", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.get("key1").await.unwrap(), Some("value1".to_string()));
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let store = store();
        assert_eq!(store.get("nope").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entry_expires() {
        let store = store();
        store
            .set_ex("short", "v", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete() {
        let store = store();
        store
            .set_ex("key1", "v", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(store.delete("key1").await.unwrap(), 1);
        assert_eq!(store.get("key1").await.unwrap(), None);
        assert_eq!(store.delete("key1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_matches_pattern() {
        let store = store();
        for key in ["cache:a:1", "cache:a:2", "cache:b:1"] {
            store
                .set_ex(key, "v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        let matched = store.keys("cache:a:*").await.unwrap();
        assert_eq!(matched, vec!["cache:a:1".to_string(), "cache:a:2".to_string()]);
        assert_eq!(store.keys("*").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_delete_many() {
        let store = store();
        for key in ["k1", "k2", "k3"] {
            store
                .set_ex(key, "v", Duration::from_secs(60))
                .await
                .unwrap();
        }
        let keys = vec!["k1".to_string(), "k2".to_string(), "missing".to_string()];
        assert_eq!(store.delete_many(&keys).await.unwrap(), 2);
        assert_eq!(store.get("k3").await.unwrap(), Some("v".to_string()));
    }

    #[tokio::test]
    async fn test_zadd_and_zcard() {
        let store = store();
        store.zadd("zs", "a", 1.0).await.unwrap();
        store.zadd("zs", "b", 2.0).await.unwrap();
        assert_eq!(store.zcard("zs").await.unwrap(), 2);

        // Re-adding an existing member updates its score, not the count
        store.zadd("zs", "a", 3.0).await.unwrap();
        assert_eq!(store.zcard("zs").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_zrange_by_score_inclusive_and_ordered() {
        let store = store();
        store.zadd("zs", "late", 30.0).await.unwrap();
        store.zadd("zs", "early", 10.0).await.unwrap();
        store.zadd("zs", "mid", 20.0).await.unwrap();

        let members = store.zrange_by_score("zs", 10.0, 20.0).await.unwrap();
        assert_eq!(members, vec!["early".to_string(), "mid".to_string()]);
    }

    #[tokio::test]
    async fn test_zrem_range_by_score() {
        let store = store();
        store.zadd("zs", "a", 1.0).await.unwrap();
        store.zadd("zs", "b", 2.0).await.unwrap();
        store.zadd("zs", "c", 3.0).await.unwrap();

        assert_eq!(store.zrem_range_by_score("zs", 0.0, 2.0).await.unwrap(), 2);
        assert_eq!(store.zcard("zs").await.unwrap(), 1);

        // Removing the rest makes the key disappear
        assert_eq!(store.zrem_range_by_score("zs", 0.0, 10.0).await.unwrap(), 1);
        assert!(store.keys("zs").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_expire_shortens_lifetime() {
        let store = store();
        store
            .set_ex("key1", "v", Duration::from_secs(60))
            .await
            .unwrap();
        store
            .expire("key1", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.get("key1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zset_expires_as_a_whole() {
        let store = store();
        store.zadd("zs", "a", 1.0).await.unwrap();
        store
            .expire("zs", Duration::from_millis(50))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.zcard("zs").await.unwrap(), 0);
    }
}
