use crate::config::Config;
use crate::embedding::{self, Embedder};
use crate::error::{AppError, Result};
use crate::index::{DocumentIndexService, InMemoryIndex};
use crate::ingestion::Ingestor;
use crate::persistence;
use crate::tools::ToolRegistry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

/// Application state shared across all request handlers.
pub struct AppState {
    pub index: Arc<InMemoryIndex>,
    pub ingestor: Arc<Ingestor>,
    pub tools: Arc<ToolRegistry>,
    /// Embedding permits shared by searches and ingestion, one per
    /// concurrent call the embedder supports.
    pub embed_permits: Arc<Semaphore>,
    /// Flag indicating the service is ready (embedder warmed up, index restored)
    pub ready: AtomicBool,
    pub config: Arc<Config>,
    /// Serializes snapshot writes; they share one temporary file.
    snapshot_lock: Mutex<()>,
}

impl AppState {
    /// Initialize application state with the embedder selected by the config.
    pub fn new(config: Config) -> Result<Self> {
        let embedder = embedding::from_config(&config)?;
        Self::with_embedder(config, embedder)
    }

    /// Initialize application state around an already built embedder.
    ///
    /// # Startup order
    /// 1. Warm up the embedder so the first query pays no lazy-init cost.
    /// 2. Restore the snapshot at `SNAPSHOT_PATH`, if any.
    /// 3. Apply the seed file at `SEED_PATH` when the index is still empty.
    pub fn with_embedder(config: Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        tracing::info!(
            embedder = %embedder.fingerprint(),
            dim = embedder.dim(),
            "Embedder initialized"
        );
        warmup(embedder.as_ref())?;
        let embed_permits = Arc::new(Semaphore::new(embedder.max_concurrency().max(1)));

        let index = Arc::new(InMemoryIndex::new(embedder));
        if let Some(path) = &config.snapshot_path {
            let restored = persistence::load_index(path, &index)?;
            tracing::info!(path = %path.display(), restored, "Index snapshot restored");
        }

        let ingestor = Arc::new(
            Ingestor::new(Arc::clone(&index), config.chunk_size, config.chunk_overlap)
                .with_metadata_enrichment(config.enable_metadata_enrichment),
        );

        let service = Arc::new(DocumentIndexService::with_permits(
            index.clone(),
            Arc::clone(&embed_permits),
        ));
        let tools = Arc::new(ToolRegistry::with_document_tools(service));

        let state = Self {
            index,
            ingestor,
            tools,
            embed_permits,
            ready: AtomicBool::new(false),
            config: Arc::new(config),
            snapshot_lock: Mutex::new(()),
        };

        if let Some(path) = &state.config.seed_path {
            if state.index.document_count() == 0 {
                let reports = state
                    .ingestor
                    .ingest_seed_file(path, &state.config.default_tenant)?;
                if !reports.is_empty() {
                    state.persist()?;
                }
            } else {
                tracing::info!("Index already populated, skipping seed file");
            }
        }

        state.ready.store(true, Ordering::SeqCst);
        Ok(state)
    }

    /// Check if the service is ready to handle requests.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Write the index snapshot, if one is configured. Blocking.
    pub fn persist(&self) -> Result<()> {
        let Some(path) = &self.config.snapshot_path else {
            return Ok(());
        };
        let _guard = self
            .snapshot_lock
            .lock()
            .map_err(|_| AppError::PersistenceError("Snapshot lock poisoned".to_string()))?;
        persistence::save_index(path, &self.index)
    }
}

fn warmup(embedder: &dyn Embedder) -> Result<()> {
    tracing::info!("Running embedder warmup...");
    let _ = embedder.embed("warmup query")?;
    tracing::info!("Embedder warmup completed successfully");
    Ok(())
}
