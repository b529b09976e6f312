//! Catalog lookup: where candidate parts come from.
//!
//! The configurator never talks to a product database directly. It asks a
//! [`CatalogLookup`] for every part in a category and applies stock and
//! compatibility filtering itself.

use crate::cart::CartItem;
use crate::lookup_executor::{LookupRequest, LookupWorker};
use crate::money::Price;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use thiserror::Error;

/// A catalog item that can be placed into a build slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub id: String,
    pub name: String,
    pub price: Price,
    #[serde(default)]
    pub image_url: String,
    /// Units available; a missing field means out of stock
    #[serde(default, rename = "stock")]
    pub stock_count: u32,
    /// Socket name used to match CPUs and motherboards
    #[serde(default, rename = "socket", skip_serializing_if = "Option::is_none")]
    pub compatibility_key: Option<String>,
}

impl Part {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        price: Price,
        stock_count: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            image_url: String::new(),
            stock_count,
            compatibility_key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.compatibility_key = Some(key.into());
        self
    }

    pub fn with_image(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    #[inline]
    pub fn in_stock(&self) -> bool {
        self.stock_count > 0
    }

    /// The compatibility key with surrounding whitespace removed, or `None`
    /// when it is absent or blank.
    pub fn compatibility_key(&self) -> Option<&str> {
        self.compatibility_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Key used for equality checks: trimmed and lowercased.
    pub fn normalized_key(&self) -> Option<String> {
        self.compatibility_key().map(str::to_lowercase)
    }

    /// True when this part's key matches `key` (trimmed, case-insensitive).
    /// A part without a key never matches.
    pub fn matches_key(&self, key: &str) -> bool {
        self.normalized_key()
            .is_some_and(|own| own == key.trim().to_lowercase())
    }

    pub fn to_cart_item(&self) -> CartItem {
        CartItem {
            id: self.id.clone(),
            name: self.name.clone(),
            price: self.price,
            image_url: self.image_url.clone(),
            stock_count: self.stock_count,
        }
    }
}

/// Failure reported by a catalog backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("catalog unavailable: {0}")]
    Unavailable(String),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),
}

impl LookupError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

/// Source of parts by category.
///
/// Implementations return every part in the category, in stock or not, in
/// whatever order the backend yields them. The configurator preserves that
/// order.
pub trait CatalogLookup {
    fn query(&self, category: &str) -> std::result::Result<Vec<Part>, LookupError>;
}

/// One record of a catalog file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub category: String,
    #[serde(flatten)]
    pub part: Part,
}

/// Catalog backed by a JSON array of product records
#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    by_category: HashMap<String, Vec<Part>>,
}

impl JsonCatalog {
    pub fn from_entries(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        let mut by_category: HashMap<String, Vec<Part>> = HashMap::new();
        for entry in entries {
            by_category.entry(entry.category).or_default().push(entry.part);
        }
        Self { by_category }
    }

    /// Load a catalog file: a JSON array of records with `id`, `name`,
    /// `price`, `category` and optional `stock`, `socket`, `image_url`.
    ///
    /// A record that does not describe a valid part (bad price, negative
    /// stock, missing field) is logged and skipped. Only a file that cannot
    /// be read or is not a JSON array fails the load.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read catalog from {:?}", path.as_ref()))?;

        let records: Vec<serde_json::Value> =
            serde_json::from_str(&content).context("Failed to parse catalog JSON")?;
        let total = records.len();

        let entries: Vec<CatalogEntry> = records
            .into_iter()
            .enumerate()
            .filter_map(|(index, record)| {
                match serde_json::from_value::<CatalogEntry>(record) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        tracing::warn!("Skipping catalog record {}: {}", index, e);
                        None
                    }
                }
            })
            .collect();

        tracing::debug!(
            "Loaded {} of {} catalog entries from {:?}",
            entries.len(),
            total,
            path.as_ref()
        );
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.by_category.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.by_category.keys().map(String::as_str)
    }
}

impl CatalogLookup for JsonCatalog {
    fn query(&self, category: &str) -> std::result::Result<Vec<Part>, LookupError> {
        Ok(self.by_category.get(category).cloned().unwrap_or_default())
    }
}

/// Bounds the time spent waiting on a slow catalog.
///
/// Queries run on one [`LookupWorker`] thread owned by this value, one at a
/// time. When the timeout elapses the caller gets [`LookupError::TimedOut`]
/// and the late answer is discarded when it arrives. A backend that hangs
/// ties up that single thread: later queries queue behind it and time out
/// too, but no further threads are spawned. The thread exits once the
/// `TimedLookup` is dropped and its current query returns.
#[derive(Debug)]
pub struct TimedLookup {
    worker: Mutex<LookupWorker>,
    next_request: AtomicU64,
    timeout: Duration,
}

impl TimedLookup {
    pub fn new<L>(inner: L, timeout: Duration) -> Self
    where
        L: CatalogLookup + Send + 'static,
    {
        Self {
            worker: Mutex::new(LookupWorker::spawn(inner)),
            next_request: AtomicU64::new(1),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl CatalogLookup for TimedLookup {
    fn query(&self, category: &str) -> std::result::Result<Vec<Part>, LookupError> {
        let worker = self
            .worker
            .lock()
            .map_err(|_| LookupError::unavailable("lookup worker lock poisoned"))?;

        let id = self.next_request.fetch_add(1, Ordering::Relaxed);
        if !worker.submit(LookupRequest::for_category(id, category)) {
            return Err(LookupError::unavailable("lookup worker has stopped"));
        }

        let deadline = Instant::now() + self.timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match worker.recv_timeout(remaining) {
                Some(response) if response.id == id => return response.result,
                Some(response) => {
                    tracing::debug!("Dropping late catalog result for request {}", response.id);
                }
                None if Instant::now() < deadline => {
                    return Err(LookupError::unavailable("lookup worker exited without a result"));
                }
                None => {
                    tracing::warn!(
                        "Catalog lookup for '{}' timed out after {:?}",
                        category,
                        self.timeout
                    );
                    return Err(LookupError::TimedOut(self.timeout));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::io::Write;
    use std::sync::Arc;
    use std::thread::{self, ThreadId};
    use tempfile::NamedTempFile;

    /// Answers "slow" after `delay`, anything else at once, and records
    /// which thread served each query.
    struct SlowLookup {
        delay: Duration,
        threads: Arc<Mutex<HashSet<ThreadId>>>,
    }

    impl SlowLookup {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                threads: Arc::default(),
            }
        }
    }

    impl CatalogLookup for SlowLookup {
        fn query(&self, category: &str) -> std::result::Result<Vec<Part>, LookupError> {
            self.threads.lock().unwrap().insert(thread::current().id());
            if category == "slow" {
                thread::sleep(self.delay);
            }
            Ok(vec![Part::new(category, "Part", Price::from_cents(100), 1)])
        }
    }

    fn catalog_file(records: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(records.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_key_normalization() {
        let part = Part::new("mb", "Board", Price::ZERO, 1).with_key("  AM5 ");
        assert_eq!(part.compatibility_key(), Some("AM5"));
        assert_eq!(part.normalized_key(), Some("am5".to_string()));
        assert!(part.matches_key("am5"));
        assert!(part.matches_key(" Am5"));
        assert!(!part.matches_key("LGA1700"));
    }

    #[test]
    fn test_blank_key_is_absent() {
        let part = Part::new("mb", "Board", Price::ZERO, 1).with_key("   ");
        assert_eq!(part.compatibility_key(), None);
        assert!(!part.matches_key("AM5"));
    }

    #[test]
    fn test_part_deserialize_defaults() {
        let part: Part =
            serde_json::from_str(r#"{"id": "p1", "name": "Case", "price": 59.9}"#).unwrap();
        assert_eq!(part.stock_count, 0);
        assert!(!part.in_stock());
        assert_eq!(part.compatibility_key, None);
        assert_eq!(part.price, Price::from_cents(5990));
    }

    #[test]
    fn test_json_catalog_groups_by_category_in_file_order() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(
            br#"[
                {"id": "c1", "name": "Ryzen 7", "price": 299.99, "category": "cpu", "stock": 4, "socket": "AM5"},
                {"id": "g1", "name": "RTX", "price": 599, "category": "gpu", "stock": 1},
                {"id": "c2", "name": "Core i5", "price": 199.5, "category": "cpu", "stock": 0, "socket": "LGA1700"}
            ]"#,
        )
        .unwrap();
        file.flush().unwrap();

        let catalog = JsonCatalog::load_from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 3);

        let cpus = catalog.query("cpu").unwrap();
        let ids: Vec<&str> = cpus.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        assert_eq!(cpus[0].compatibility_key(), Some("AM5"));

        assert!(catalog.query("psu").unwrap().is_empty());
    }

    #[test]
    fn test_json_catalog_rejects_malformed_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"{ not an array }").unwrap();
        file.flush().unwrap();
        assert!(JsonCatalog::load_from_file(file.path()).is_err());
    }

    #[test]
    fn test_json_catalog_skips_invalid_records() {
        let file = catalog_file(
            r#"[
                {"id": "c1", "name": "Ryzen 7", "price": 299.99, "category": "cpu", "stock": 4, "socket": "AM5"},
                {"id": "c2", "name": "Typo", "price": 9.999, "category": "cpu", "stock": 2, "socket": "AM5"},
                {"id": "m1", "name": "B650", "price": "219.99", "category": "motherboard", "stock": 3, "socket": "AM5"},
                {"id": "m2", "name": "Restock", "price": 149.99, "category": "motherboard", "stock": -1, "socket": "AM5"},
                {"name": "No id", "price": 10, "category": "case"}
            ]"#,
        );

        let catalog = JsonCatalog::load_from_file(file.path()).unwrap();
        assert_eq!(catalog.len(), 2);

        let cpus = catalog.query("cpu").unwrap();
        assert_eq!(cpus.len(), 1);
        assert_eq!(cpus[0].id, "c1");
        let boards = catalog.query("motherboard").unwrap();
        assert_eq!(boards.len(), 1);
        assert_eq!(boards[0].id, "m1");

        let mut categories: Vec<&str> = catalog.categories().collect();
        categories.sort_unstable();
        assert_eq!(categories, vec!["cpu", "motherboard"]);
    }

    #[test]
    fn test_cart_item_carries_image() {
        let part = Part::new("g1", "RTX", Price::from_cents(59900), 2).with_image("/img/rtx.png");
        let item = part.to_cart_item();
        assert_eq!(item.image_url, "/img/rtx.png");
        assert_eq!(item.stock_count, 2);
    }

    #[test]
    fn test_timed_lookup_passes_through_fast_results() {
        let lookup = TimedLookup::new(SlowLookup::new(Duration::ZERO), Duration::from_secs(5));
        let parts = lookup.query("cpu").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(lookup.timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_timed_lookup_times_out() {
        let lookup = TimedLookup::new(
            SlowLookup::new(Duration::from_millis(500)),
            Duration::from_millis(20),
        );
        let err = lookup.query("slow").unwrap_err();
        assert_eq!(err, LookupError::TimedOut(Duration::from_millis(20)));
    }

    #[test]
    fn test_timed_lookup_drops_late_results() {
        let lookup = TimedLookup::new(
            SlowLookup::new(Duration::from_millis(400)),
            Duration::from_millis(300),
        );
        assert!(matches!(lookup.query("slow"), Err(LookupError::TimedOut(_))));

        // The late "slow" answer arrives first and must not be returned here
        let parts = lookup.query("fast").unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].id, "fast");
    }

    #[test]
    fn test_timed_lookup_reuses_one_thread() {
        let inner = SlowLookup::new(Duration::ZERO);
        let threads = Arc::clone(&inner.threads);
        let lookup = TimedLookup::new(inner, Duration::from_secs(5));

        for category in ["cpu", "gpu", "ram"] {
            lookup.query(category).unwrap();
        }

        let threads = threads.lock().unwrap();
        assert_eq!(threads.len(), 1);
        assert!(!threads.contains(&thread::current().id()));
    }
}
