use crate::config::IndexerConfig;
use crate::coordinator::{IndexCoordinator, ReindexReport, ReindexScope};
use crate::error::{IndexerError, Result};
use crate::filter::PathFilter;
use semindex_code_chunker::Chunker;
use semindex_embeddings::EmbeddingClient;
use semindex_vector_store::{
    DocumentTemplate, QueryFilter, SearchHit, StoreDescriptor, StoreLayout, StoreStats, VectorStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Canonical form of a project root; must be an existing directory
pub fn canonical_root(path: &Path) -> Result<PathBuf> {
    let canonical = path
        .canonicalize()
        .map_err(|err| IndexerError::InvalidPath(format!("{}: {err}", path.display())))?;
    if !canonical.is_dir() {
        return Err(IndexerError::InvalidPath(format!(
            "{}: not a directory",
            path.display()
        )));
    }
    Ok(canonical)
}

/// Index of one project for one embedding provider
pub struct ProjectIndex {
    root: PathBuf,
    store: Arc<VectorStore>,
    client: Arc<dyn EmbeddingClient>,
    template: DocumentTemplate,
    coordinator: IndexCoordinator,
}

impl std::fmt::Debug for ProjectIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectIndex")
            .field("root", &self.root)
            .field("provider", &self.client.name())
            .field("store", &self.store.layout().root())
            .finish_non_exhaustive()
    }
}

impl ProjectIndex {
    /// Open (or create) the store for `root` under `config.data_dir`.
    ///
    /// The store directory is chosen by the client's provider name, so each
    /// provider keeps its own vectors.
    pub async fn open(
        root: impl AsRef<Path>,
        config: &IndexerConfig,
        client: Arc<dyn EmbeddingClient>,
    ) -> Result<Self> {
        let root = canonical_root(root.as_ref())?;
        let chunker = Chunker::new(config.chunker.clone())?;
        let filter = PathFilter::new(&config.filter)?;
        let template = config.template.clone();

        let layout = StoreLayout::for_project(&config.data_dir, &root, client.name())?;
        let descriptor = StoreDescriptor {
            provider: client.name().to_string(),
            model: client.model().to_string(),
            dimension: client.dimension(),
            template_hash: template.fingerprint(),
        };
        let store = Arc::new(VectorStore::open(layout, descriptor, config.lock_timeout()).await?);
        log::info!(
            "Opened index for {} ({} / {}, {} chunks)",
            root.display(),
            client.name(),
            client.model(),
            store.count().await
        );

        let coordinator = IndexCoordinator::new(
            root.clone(),
            Arc::clone(&store),
            Arc::clone(&client),
            chunker,
            filter,
            template.clone(),
            config.embed_batch_size,
        );
        Ok(Self {
            root,
            store,
            client,
            template,
            coordinator,
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn provider(&self) -> &str {
        self.client.name()
    }

    #[must_use]
    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    #[must_use]
    pub const fn filter(&self) -> &PathFilter {
        self.coordinator.filter()
    }

    /// Whether a reindex pass is currently running
    #[must_use]
    pub fn is_reindexing(&self) -> bool {
        self.coordinator.is_running()
    }

    pub async fn reindex(&self, scope: ReindexScope, force: bool) -> Result<ReindexReport> {
        self.coordinator.reindex(scope, force).await
    }

    /// Rank stored chunks against `text`
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        self.query_filtered(text, top_k, &QueryFilter::default())
            .await
    }

    /// Rank only the chunks that pass `filter`
    pub async fn query_filtered(
        &self,
        text: &str,
        top_k: usize,
        filter: &QueryFilter,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 || text.trim().is_empty() {
            return Ok(Vec::new());
        }
        let input = self.template.render_query(text)?;
        let embedding = self.client.embed(&input).await?;
        Ok(self.store.query_filtered(&embedding, top_k, filter).await?)
    }

    pub async fn stats(&self) -> Result<StoreStats> {
        Ok(self.store.stats().await?)
    }

    /// Probe the embedding provider
    pub async fn health(&self) -> Result<()> {
        Ok(self.client.health_check().await?)
    }
}
