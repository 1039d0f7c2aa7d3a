use crate::analysis::generator::TextGenerator;
use crate::model::{Analysis, CacheEntry, Generation, GenerationError};
use crate::utils::now_millis;
use chrono::Duration as ChronoDuration;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

/// Bump when the prompt or payload shape changes; older entries are then ignored.
pub const CACHE_VERSION: u32 = 1;

pub const DEFAULT_CACHE_DIR: &str = ".cache/llm";

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(180);

pub fn cache_ttl() -> ChronoDuration {
    ChronoDuration::hours(24)
}

/// One JSON file per item under `dir`, valid for 24 hours.
pub struct AnalysisCache {
    dir: PathBuf,
    generation_timeout: Duration,
}

impl AnalysisCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            generation_timeout: DEFAULT_GENERATION_TIMEOUT,
        }
    }

    pub fn with_generation_timeout(mut self, generation_timeout: Duration) -> Self {
        self.generation_timeout = generation_timeout;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `None` when the key cannot be used as a file name.
    fn entry_path(&self, item_key: &str) -> Option<PathBuf> {
        let unsafe_key = item_key.is_empty()
            || item_key.contains(['/', '\\'])
            || item_key.contains("..");
        if unsafe_key {
            return None;
        }
        Some(self.dir.join(format!("{}.json", item_key)))
    }

    /// Returns the stored entry unless it is missing, unreadable, older than 24h or
    /// written by an older cache version.
    pub async fn get(&self, item_key: &str) -> Option<CacheEntry> {
        self.get_at(item_key, now_millis()).await
    }

    async fn get_at(&self, item_key: &str, now_ms: i64) -> Option<CacheEntry> {
        let path = self.entry_path(item_key)?;
        let content = fs::read_to_string(&path).await.ok()?;
        let entry: CacheEntry = match serde_json::from_str(&content) {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Ignoring malformed cache file {}: {}", path.display(), e);
                return None;
            }
        };

        let expired = now_ms
            .checked_sub(entry.timestamp)
            .is_none_or(|age| age > cache_ttl().num_milliseconds());
        if expired {
            debug!("Cache entry for '{}' expired", item_key);
            return None;
        }
        if entry.version < CACHE_VERSION {
            debug!("Cache entry for '{}' has stale version {}", item_key, entry.version);
            return None;
        }

        Some(entry)
    }

    /// Writes a fresh entry, replacing any previous one. Write failures are logged only;
    /// the entry is returned either way.
    pub async fn put(&self, item_key: &str, generation: &Generation, prompt: &str, provider: &str) -> CacheEntry {
        let entry = CacheEntry {
            timestamp: now_millis(),
            data: generation.markdown.clone(),
            citations: generation.citations.clone(),
            prompt: prompt.to_string(),
            provider: provider.to_string(),
            version: CACHE_VERSION,
        };

        if let Err(e) = self.write_entry(item_key, &entry).await {
            error!("Error writing to cache for '{}': {}", item_key, e);
        }

        entry
    }

    async fn write_entry(&self, item_key: &str, entry: &CacheEntry) -> std::io::Result<()> {
        let Some(path) = self.entry_path(item_key) else {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("item key '{}' is not a valid file name", item_key),
            ));
        };

        fs::create_dir_all(&self.dir).await?;
        let json = serde_json::to_string_pretty(entry)?;
        fs::write(&path, json).await
    }

    /// Cached analysis for `item_key`, generating and storing a new one on a miss.
    ///
    /// The prompt is only built on a miss. Generation errors and timeouts are returned
    /// to the caller and leave the cache untouched.
    pub async fn get_or_create<P, Fut>(
        &self,
        item_key: &str,
        prompt_builder: P,
        generator: &dyn TextGenerator,
    ) -> Result<Analysis, GenerationError>
    where
        P: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, GenerationError>>,
    {
        if let Some(entry) = self.get(item_key).await {
            info!("Using cached analysis for '{}'", item_key);
            return Ok(entry.into());
        }

        info!("Generating analysis for '{}' via {}", item_key, generator.provider());
        let prompt = prompt_builder().await?;

        let generation = match timeout(self.generation_timeout, generator.generate(&prompt)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("⏳ Analysis generation for '{}' timed out", item_key);
                return Err(GenerationError::Timeout(self.generation_timeout.as_secs()));
            }
        };

        let entry = self.put(item_key, &generation, &prompt, generator.provider()).await;
        Ok(entry.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Citation;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    struct CountingGenerator {
        calls: AtomicUsize,
        delay: Option<Duration>,
        fail: bool,
    }

    impl CountingGenerator {
        fn new() -> Self {
            Self { calls: AtomicUsize::new(0), delay: None, fail: false }
        }
    }

    #[async_trait::async_trait]
    impl TextGenerator for CountingGenerator {
        fn provider(&self) -> &str {
            "mock"
        }

        async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail {
                return Err(GenerationError::Api { status: 500, body: "boom".into() });
            }
            Ok(Generation {
                markdown: format!("## Analysis\n{}", prompt),
                citations: vec![sample_citation()],
            })
        }
    }

    fn sample_citation() -> Citation {
        Citation {
            id: 1,
            url: "https://www.bls.gov/cpi/".into(),
            title: "bls.gov".into(),
            text: String::new(),
        }
    }

    fn sample_generation() -> Generation {
        Generation {
            markdown: "Egg prices eased in November.".into(),
            citations: vec![sample_citation()],
        }
    }

    async fn write_raw(dir: &Path, key: &str, entry: &CacheEntry) {
        fs::create_dir_all(dir).await.unwrap();
        let json = serde_json::to_string(entry).unwrap();
        fs::write(dir.join(format!("{}.json", key)), json).await.unwrap();
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path().join("llm"));

        let written = cache.put("eggs", &sample_generation(), "prompt text", "perplexity").await;
        let read = cache.get("eggs").await.expect("fresh entry");

        assert_eq!(read, written);
        assert_eq!(read.data, "Egg prices eased in November.");
        assert_eq!(read.citations, vec![sample_citation()]);
        assert_eq!(read.provider, "perplexity");
        assert_eq!(read.version, CACHE_VERSION);
    }

    #[tokio::test]
    async fn missing_or_malformed_file_is_absent() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        assert!(cache.get("milk").await.is_none());

        fs::write(dir.path().join("milk.json"), "{not json").await.unwrap();
        assert!(cache.get("milk").await.is_none());
    }

    #[tokio::test]
    async fn entry_older_than_a_day_is_absent() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let entry = CacheEntry {
            timestamp: now_millis() - ChronoDuration::hours(25).num_milliseconds(),
            data: "stale".into(),
            citations: vec![],
            prompt: String::new(),
            provider: "perplexity".into(),
            version: CACHE_VERSION,
        };
        write_raw(dir.path(), "bread", &entry).await;

        assert!(cache.get("bread").await.is_none());
        assert!(dir.path().join("bread.json").exists());
    }

    #[tokio::test]
    async fn out_of_range_timestamp_is_absent() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let entry = CacheEntry {
            timestamp: i64::MIN,
            data: "corrupt".into(),
            citations: vec![],
            prompt: String::new(),
            provider: "perplexity".into(),
            version: CACHE_VERSION,
        };
        write_raw(dir.path(), "eggs", &entry).await;

        assert!(cache.get("eggs").await.is_none());
    }

    #[tokio::test]
    async fn expiry_boundary_is_exclusive() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let written = cache.put("gas", &sample_generation(), "p", "mock").await;

        let at_limit = written.timestamp + cache_ttl().num_milliseconds();
        assert!(cache.get_at("gas", at_limit).await.is_some());
        assert!(cache.get_at("gas", at_limit + 1).await.is_none());
    }

    #[tokio::test]
    async fn older_version_is_absent() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let entry = CacheEntry {
            timestamp: now_millis(),
            data: "old format".into(),
            citations: vec![],
            prompt: String::new(),
            provider: "anthropic".into(),
            version: CACHE_VERSION - 1,
        };
        write_raw(dir.path(), "coffee", &entry).await;
        assert!(cache.get("coffee").await.is_none());

        // Files from before versioning carry no version field at all.
        let legacy = format!(r#"{{"timestamp": {}, "data": "x", "prompt": "", "provider": "perplexity"}}"#, now_millis());
        fs::write(dir.path().join("bacon.json"), legacy).await.unwrap();
        assert!(cache.get("bacon").await.is_none());
    }

    #[tokio::test]
    async fn put_overwrites_previous_entry() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        cache.put("milk", &sample_generation(), "first", "mock").await;
        let second = Generation { markdown: "second".into(), citations: vec![] };
        cache.put("milk", &second, "second prompt", "mock").await;

        let read = cache.get("milk").await.unwrap();
        assert_eq!(read.data, "second");
        assert!(read.citations.is_empty());
        assert_eq!(read.prompt, "second prompt");
    }

    #[tokio::test]
    async fn unsafe_keys_are_never_cached() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path().join("llm"));
        cache.put("../escape", &sample_generation(), "p", "mock").await;

        assert!(!dir.path().join("escape.json").exists());
        assert!(cache.get("../escape").await.is_none());
        assert!(cache.get("").await.is_none());
    }

    #[tokio::test]
    async fn get_or_create_generates_once() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let generator = CountingGenerator::new();

        let first = cache
            .get_or_create("eggs", || async { Ok("eggs prompt".to_string()) }, &generator)
            .await
            .unwrap();
        let second = cache
            .get_or_create("eggs", || async { Err(GenerationError::EmptyResponse) }, &generator)
            .await
            .unwrap();

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
        assert_eq!(first.data, "## Analysis\neggs prompt");
        assert_eq!(first.provider, "mock");
        assert_eq!(cache.get("eggs").await.unwrap().prompt, "eggs prompt");
    }

    #[tokio::test]
    async fn generation_failure_propagates_without_writing() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path());
        let generator = CountingGenerator { fail: true, ..CountingGenerator::new() };

        let result = cache
            .get_or_create("milk", || async { Ok("p".to_string()) }, &generator)
            .await;

        assert!(matches!(result, Err(GenerationError::Api { status: 500, .. })));
        assert!(!dir.path().join("milk.json").exists());
    }

    #[tokio::test]
    async fn generation_timeout_writes_nothing() {
        let dir = tempdir().unwrap();
        let cache = AnalysisCache::new(dir.path()).with_generation_timeout(Duration::from_millis(20));
        let generator = CountingGenerator {
            delay: Some(Duration::from_secs(5)),
            ..CountingGenerator::new()
        };

        let result = cache
            .get_or_create("gas", || async { Ok("p".to_string()) }, &generator)
            .await;

        assert!(matches!(result, Err(GenerationError::Timeout(_))));
        assert!(!dir.path().join("gas.json").exists());
    }

    #[tokio::test]
    async fn unwritable_cache_still_serves_generation() {
        let dir = tempdir().unwrap();
        // A regular file where the cache directory should be.
        let blocked = dir.path().join("blocked");
        fs::write(&blocked, "").await.unwrap();
        let cache = AnalysisCache::new(blocked.clone());
        let generator = CountingGenerator::new();

        let analysis = cache
            .get_or_create("oranges", || async { Ok("p".to_string()) }, &generator)
            .await
            .unwrap();

        assert_eq!(analysis.data, "## Analysis\np");
        assert!(cache.get("oranges").await.is_none());
    }
}
