use crate::config::{debounce_duration, IndexerConfig};
use crate::coordinator::{ReindexReport, ReindexScope};
use crate::error::Result;
use crate::project::{canonical_root, ProjectIndex};
use crate::registry::WatcherRegistry;
use crate::watcher::WatcherStatus;
use semindex_embeddings::{AnyEmbeddingClient, EmbeddingClient};
use semindex_vector_store::{QueryFilter, SearchHit, StoreStats};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

/// Host-facing entry point: project engines plus the watcher registry.
///
/// Engines are opened lazily, one per (project, provider), and shared by
/// direct calls and the project's watcher.
pub struct SemanticIndex {
    config: IndexerConfig,
    client: Arc<dyn EmbeddingClient>,
    projects: Mutex<HashMap<(PathBuf, String), Arc<ProjectIndex>>>,
    watchers: WatcherRegistry,
}

impl std::fmt::Debug for SemanticIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SemanticIndex")
            .field("data_dir", &self.config.data_dir)
            .field("provider", &self.client.name())
            .finish_non_exhaustive()
    }
}

impl SemanticIndex {
    /// Build with the provider selected in `config.provider`
    pub fn new(config: IndexerConfig) -> Result<Self> {
        config.validate()?;
        let client = AnyEmbeddingClient::from_config(&config.provider)?;
        Ok(Self::with_client(config, Arc::new(client)))
    }

    /// Build around a caller-supplied embedding client
    #[must_use]
    pub fn with_client(config: IndexerConfig, client: Arc<dyn EmbeddingClient>) -> Self {
        Self {
            config,
            client,
            projects: Mutex::new(HashMap::new()),
            watchers: WatcherRegistry::new(),
        }
    }

    #[must_use]
    pub const fn config(&self) -> &IndexerConfig {
        &self.config
    }

    #[must_use]
    pub const fn watchers(&self) -> &WatcherRegistry {
        &self.watchers
    }

    /// Engine for `project_path` with the default client
    pub async fn project(&self, project_path: &Path) -> Result<Arc<ProjectIndex>> {
        self.open_project_with_client(project_path, Arc::clone(&self.client))
            .await
    }

    /// Engine for `project_path` embedding through `client`.
    ///
    /// Each provider gets its own store; an engine already open for the same
    /// (project, provider) pair is reused.
    pub async fn open_project_with_client(
        &self,
        project_path: &Path,
        client: Arc<dyn EmbeddingClient>,
    ) -> Result<Arc<ProjectIndex>> {
        let root = canonical_root(project_path)?;
        let key = (root.clone(), client.name().to_string());
        let mut projects = self.projects.lock().await;
        if let Some(project) = projects.get(&key) {
            return Ok(Arc::clone(project));
        }
        let project = Arc::new(ProjectIndex::open(&root, &self.config, client).await?);
        projects.insert(key, Arc::clone(&project));
        Ok(project)
    }

    pub async fn reindex(
        &self,
        project_path: &Path,
        scope: ReindexScope,
        force: bool,
    ) -> Result<ReindexReport> {
        self.project(project_path).await?.reindex(scope, force).await
    }

    pub async fn query(
        &self,
        project_path: &Path,
        text: &str,
        top_k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.project(project_path).await?.query(text, top_k).await
    }

    pub async fn query_filtered(
        &self,
        project_path: &Path,
        text: &str,
        top_k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<SearchHit>> {
        self.project(project_path)
            .await?
            .query_filtered(text, top_k, filter)
            .await
    }

    pub async fn stats(&self, project_path: &Path) -> Result<StoreStats> {
        self.project(project_path).await?.stats().await
    }

    /// Start the project's watcher; `None` uses the configured debounce
    pub async fn start_watcher(
        &self,
        project_path: &Path,
        debounce_seconds: Option<f64>,
    ) -> Result<WatcherStatus> {
        let debounce = match debounce_seconds {
            Some(seconds) => debounce_duration(seconds)?,
            None => self.config.debounce()?,
        };
        let project = self.project(project_path).await?;
        self.watchers.start(project, debounce).await
    }

    /// False when the project had no watcher
    pub async fn stop_watcher(&self, project_path: &Path) -> Result<bool> {
        let root = canonical_root(project_path)?;
        Ok(self.watchers.stop(&root).await)
    }

    pub async fn watcher_status(&self, project_path: &Path) -> Result<Option<WatcherStatus>> {
        let root = canonical_root(project_path)?;
        Ok(self.watchers.status(&root).await)
    }

    pub async fn subscribe_watcher(
        &self,
        project_path: &Path,
    ) -> Result<Option<watch::Receiver<WatcherStatus>>> {
        let root = canonical_root(project_path)?;
        Ok(self.watchers.subscribe(&root).await)
    }

    /// Push changed paths to a running watcher; false when none runs
    pub async fn notify_paths(&self, project_path: &Path, paths: Vec<PathBuf>) -> Result<bool> {
        let root = canonical_root(project_path)?;
        self.watchers.notify_paths(&root, paths).await
    }

    /// Run the project's watcher pass now; false when none runs
    pub async fn trigger_watcher(&self, project_path: &Path) -> Result<bool> {
        let root = canonical_root(project_path)?;
        self.watchers.trigger(&root).await
    }

    pub async fn list_watchers(&self) -> Vec<WatcherStatus> {
        self.watchers.list_active().await
    }

    /// Probe the default embedding provider
    pub async fn health(&self) -> Result<()> {
        Ok(self.client.health_check().await?)
    }

    /// Stop all watchers; in-flight passes finish first
    pub async fn shutdown(&self) -> usize {
        self.watchers.stop_all().await
    }
}
