// ============================================================================
// OFFLINE ASSET CACHE - versioned cache with cache-first fetch
// ============================================================================
//
// Filesystem analog of a service worker cache: a named, versioned cache
// directory seeded with the bundled assets. fetch() serves cached entries
// first, passes misses through to the network, and falls back to the
// designated offline page when the network is unreachable. Dynamic
// responses are never written back into the cache.
// ============================================================================

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

const CACHE_VERSION: &str = "mealmap-cache-v4";
pub const DATASET_KEY: &str = "data/recipes.json";
const OFFLINE_PAGE_KEY: &str = "offline.html";

const BUNDLED_RECIPES: &str = include_str!("../data/recipes.json");

const OFFLINE_PAGE: &str = "<!doctype html>\n<html>\n<head><title>MealMap - offline</title></head>\n<body>\n<h1>You are offline</h1>\n<p>MealMap could not reach the network. Cached recipes are still available.</p>\n</body>\n</html>\n";

const NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("cache io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("network unreachable: {0}")]
    Network(String),
}

/// Where a fetched response came from. Consumers must not assume a fetch
/// hit the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    OfflineFallback,
}

#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub body: String,
    pub source: ResponseSource,
}

impl CachedResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

pub struct AssetCache {
    dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl AssetCache {
    /// Opens the current cache version under `<base>/caches/` and removes
    /// the cache directories of older versions.
    pub fn open(base: &Path) -> Result<Self, FetchError> {
        let caches_root = base.join("caches");
        let dir = caches_root.join(CACHE_VERSION);
        fs::create_dir_all(&dir)?;

        // Activation cleanup: drop every sibling cache version.
        if let Ok(entries) = fs::read_dir(&caches_root) {
            for entry in entries.flatten() {
                let name = entry.file_name();
                if name != CACHE_VERSION && entry.path().is_dir() {
                    info!(stale = %name.to_string_lossy(), "removing stale cache version");
                    if let Err(err) = fs::remove_dir_all(entry.path()) {
                        warn!(error = %err, "failed to remove stale cache version");
                    }
                }
            }
        }

        let client = reqwest::blocking::Client::builder()
            .timeout(NETWORK_TIMEOUT)
            .build()?;
        Ok(Self { dir, client })
    }

    /// Pre-caches the bundled assets. Entries already present are left
    /// untouched.
    pub fn seed(&self) {
        self.seed_entry(DATASET_KEY, BUNDLED_RECIPES);
        self.seed_entry(OFFLINE_PAGE_KEY, OFFLINE_PAGE);
    }

    fn seed_entry(&self, key: &str, body: &str) {
        if self.entry(key).is_some() {
            return;
        }
        if let Err(err) = self.put_entry(key, body) {
            warn!(key, error = %err, "failed to seed cache entry");
        }
    }

    /// Cache-first GET. Cached entries win; misses go to the network and
    /// the response is passed through without being stored. When the
    /// network is unreachable the offline page is served instead.
    pub fn fetch(&self, url: &str) -> Result<CachedResponse, FetchError> {
        if let Some(body) = self.entry(url) {
            debug!(url, "serving from cache");
            return Ok(CachedResponse {
                status: 200,
                body,
                source: ResponseSource::Cache,
            });
        }

        let network = self.client.get(url).send().and_then(|resp| {
            let status = resp.status().as_u16();
            resp.text().map(|body| (status, body))
        });
        match network {
            Ok((status, body)) => Ok(CachedResponse {
                status,
                body,
                source: ResponseSource::Network,
            }),
            Err(err) => {
                warn!(url, error = %err, "network fetch failed");
                match self.entry(OFFLINE_PAGE_KEY) {
                    Some(body) => Ok(CachedResponse {
                        status: 200,
                        body,
                        source: ResponseSource::OfflineFallback,
                    }),
                    None => Err(FetchError::Network(err.to_string())),
                }
            }
        }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(cache_key(key))
    }

    fn entry(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        if !path.exists() {
            return None;
        }
        match fs::read_to_string(&path) {
            Ok(body) => Some(body),
            Err(err) => {
                warn!(key, error = %err, "failed to read cache entry");
                None
            }
        }
    }

    fn put_entry(&self, key: &str, body: &str) -> Result<(), FetchError> {
        fs::write(self.entry_path(key), body)?;
        Ok(())
    }
}

/// Turns an arbitrary URL into a flat file name: sanitized prefix for
/// readability plus a hash suffix so distinct URLs never collide.
fn cache_key(url: &str) -> String {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    let digest = hasher.finish();

    let sanitized: String = url
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' { c } else { '_' })
        .take(80)
        .collect();
    format!("{sanitized}-{digest:016x}")
}
