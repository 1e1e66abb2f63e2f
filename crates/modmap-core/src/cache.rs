//! Time-bounded cache shared by resolution and export map lookups.
//!
//! Freshness is decided at lookup time against a lifetime supplied by the
//! caller's current settings, so two configurations sharing one cache can
//! use different lifetimes. There is no background sweep.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::Hash;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Default resolution cache lifetime in seconds.
pub const DEFAULT_LIFETIME_SECS: f64 = 30.0;

/// How long a cache entry stays fresh.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LifetimeRepr", into = "LifetimeRepr")]
pub enum CacheLifetime {
    /// Fresh for this many seconds. Zero disables caching.
    Seconds(f64),
    /// Never expires.
    Infinite,
}

impl Default for CacheLifetime {
    fn default() -> Self {
        Self::Seconds(DEFAULT_LIFETIME_SECS)
    }
}

impl CacheLifetime {
    /// Whether an entry observed `elapsed` ago is still fresh.
    #[must_use]
    pub fn is_fresh(&self, elapsed: Duration) -> bool {
        match self {
            Self::Infinite => true,
            Self::Seconds(secs) => *secs > 0.0 && elapsed.as_secs_f64() < *secs,
        }
    }
}

impl fmt::Display for CacheLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(secs) => write!(f, "{secs}s"),
            Self::Infinite => f.write_str("∞"),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum LifetimeRepr {
    Seconds(f64),
    Text(String),
}

impl TryFrom<LifetimeRepr> for CacheLifetime {
    type Error = String;

    fn try_from(repr: LifetimeRepr) -> Result<Self, Self::Error> {
        match repr {
            LifetimeRepr::Seconds(secs) if secs.is_infinite() && secs > 0.0 => Ok(Self::Infinite),
            LifetimeRepr::Seconds(secs) if secs >= 0.0 => Ok(Self::Seconds(secs)),
            LifetimeRepr::Seconds(secs) => Err(format!("cache lifetime must not be negative: {secs}")),
            LifetimeRepr::Text(text) => match text.as_str() {
                "Infinity" | "∞" => Ok(Self::Infinite),
                other => Err(format!(
                    "cache lifetime must be a number of seconds, \"Infinity\" or \"∞\", got {other:?}"
                )),
            },
        }
    }
}

impl From<CacheLifetime> for LifetimeRepr {
    fn from(lifetime: CacheLifetime) -> Self {
        match lifetime {
            CacheLifetime::Seconds(secs) => Self::Seconds(secs),
            CacheLifetime::Infinite => Self::Text("Infinity".to_string()),
        }
    }
}

/// A cached value with the time it was stored.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub observed_at: Instant,
}

/// Thread-safe map whose entries go stale after a caller-supplied lifetime.
#[derive(Debug)]
pub struct TtlCache<K, V> {
    entries: RwLock<FxHashMap<K, CacheEntry<V>>>,
}

impl<K, V> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
        }
    }
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a fresh entry.
    pub fn get(&self, key: &K, lifetime: CacheLifetime) -> Option<V> {
        self.get_at(key, lifetime, Instant::now())
    }

    /// Look up an entry as if the current time were `now`.
    pub fn get_at(&self, key: &K, lifetime: CacheLifetime, now: Instant) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let entry = entries.get(key)?;
        let elapsed = now.saturating_duration_since(entry.observed_at);
        lifetime.is_fresh(elapsed).then(|| entry.value.clone())
    }

    /// Look up an entry regardless of age.
    pub fn peek(&self, key: &K) -> Option<V> {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        entries.get(key).map(|entry| entry.value.clone())
    }

    /// Store a value and hand it back for inline use.
    pub fn set(&self, key: K, value: V) -> V {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key,
            CacheEntry {
                value: value.clone(),
                observed_at: Instant::now(),
            },
        );
        value
    }

    /// Number of stored entries, fresh or stale.
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_returns_value() {
        let cache: TtlCache<String, u32> = TtlCache::new();
        assert_eq!(cache.set("a".to_string(), 7), 7);
        assert_eq!(cache.get(&"a".to_string(), CacheLifetime::default()), Some(7));
    }

    #[test]
    fn test_zero_lifetime_always_misses() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.set("a", 1);
        assert_eq!(cache.get(&"a", CacheLifetime::Seconds(0.0)), None);
        // the entry is still there, only stale
        assert_eq!(cache.peek(&"a"), Some(1));
    }

    #[test]
    fn test_entries_expire_after_lifetime() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.set("a", 1);
        let later = Instant::now() + Duration::from_secs(31);

        assert_eq!(cache.get_at(&"a", CacheLifetime::Seconds(30.0), later), None);
        assert_eq!(
            cache.get_at(&"a", CacheLifetime::Seconds(60.0), later),
            Some(1)
        );
    }

    #[test]
    fn test_infinite_lifetime_never_expires() {
        let cache: TtlCache<&str, u32> = TtlCache::new();
        cache.set("a", 1);
        let much_later = Instant::now() + Duration::from_secs(60 * 60 * 24 * 365);
        assert_eq!(
            cache.get_at(&"a", CacheLifetime::Infinite, much_later),
            Some(1)
        );
    }

    #[test]
    fn test_lifetime_parsing() {
        let parse = |json: &str| serde_json::from_str::<CacheLifetime>(json);

        assert_eq!(parse("5").unwrap(), CacheLifetime::Seconds(5.0));
        assert_eq!(parse("0").unwrap(), CacheLifetime::Seconds(0.0));
        assert_eq!(parse("\"Infinity\"").unwrap(), CacheLifetime::Infinite);
        assert_eq!(parse("\"∞\"").unwrap(), CacheLifetime::Infinite);
        assert!(parse("\"forever\"").is_err());
        assert!(parse("-1").is_err());
    }

    #[test]
    fn test_clear() {
        let cache: TtlCache<u8, u8> = TtlCache::new();
        cache.set(1, 1);
        cache.set(2, 2);
        assert_eq!(cache.len(), 2);
        cache.clear();
        assert!(cache.is_empty());
    }
}
