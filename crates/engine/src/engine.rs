use crate::config::EngineConfig;
use crate::error::Result;
use crate::orchestrator::{analyze_document, AnalysisResult, AnalyzeOptions};
use crate::provider::CompletionProvider;
use crate::structural::{MetadataMemo, StructuralQueries};
use nucleus_snapshot::{DocumentCache, SnapshotDocument, SnapshotError, SnapshotWatcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Shared entry point: one document cache serving any number of concurrent
/// analysis sessions and structural queries.
#[derive(Clone)]
pub struct Engine {
    cache: Arc<DocumentCache>,
    metadata: Arc<MetadataMemo>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let cache = Arc::new(DocumentCache::new(config.cache_capacity));
        Self::with_cache(cache, config)
    }

    pub fn with_cache(cache: Arc<DocumentCache>, config: EngineConfig) -> Self {
        let metadata = Arc::new(MetadataMemo::new(config.cache_capacity));
        Self {
            cache,
            metadata,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<DocumentCache> {
        &self.cache
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Load a snapshot through the cache off the async executor.
    pub async fn load(&self, path: impl AsRef<Path>) -> Result<Arc<SnapshotDocument>> {
        let cache = self.cache.clone();
        let path: PathBuf = path.as_ref().to_path_buf();
        let document = tokio::task::spawn_blocking(move || cache.load(&path))
            .await
            .map_err(|err| SnapshotError::Other(format!("snapshot load task failed: {err}")))??;
        Ok(document)
    }

    /// Answer `query` about the snapshot at `path`.
    ///
    /// The document handle is taken once up front; the session keeps using it
    /// even if the cache entry is invalidated mid-analysis.
    pub async fn analyze(
        &self,
        provider: &dyn CompletionProvider,
        path: impl AsRef<Path>,
        query: &str,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisResult> {
        let document = self.load(path).await?;
        Ok(analyze_document(provider, &document, query, options).await?)
    }

    /// Structural queries over the snapshot at `path`. Import and export
    /// maps are extracted once per parsed document and shared afterwards.
    pub async fn structural(&self, path: impl AsRef<Path>) -> Result<StructuralQueries> {
        let document = self.load(path).await?;
        let memo = self.metadata.clone();
        let handle = document.clone();
        let metadata = tokio::task::spawn_blocking(move || memo.get_or_build(&handle))
            .await
            .map_err(|err| SnapshotError::Other(format!("metadata task failed: {err}")))?;
        Ok(StructuralQueries::with_metadata(document, metadata))
    }

    /// Watcher that evicts this engine's cache entries when snapshot files
    /// change on disk. Register paths with [`SnapshotWatcher::watch`].
    pub fn watch(&self, poll_interval: Duration) -> Result<SnapshotWatcher> {
        Ok(SnapshotWatcher::start(self.cache.clone(), poll_interval)?)
    }

    /// Default session options derived from this engine's configuration.
    pub fn analyze_options(&self) -> AnalyzeOptions {
        AnalyzeOptions::from_config(&self.config)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
