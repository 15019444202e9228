//! Shared application state and its construction from configuration

use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tunetrace_core::service_config::{SessionConfig, StorageBackend};
use tunetrace_core::{
    ChannelQueue, FilesystemObjectStore, FingerprintIndex, IngestJob, IngestionWorker, JobQueue,
    Matcher, MemoryIndex, MemoryMetadataStore, MetadataStore, ObjectStore, PostgresIndex,
    PostgresMetadataStore, ServiceConfig, TuneTraceConfig,
};

/// State handed to every request handler
#[derive(Clone)]
pub struct AppState {
    pub metadata: Arc<dyn MetadataStore>,
    pub objects: Arc<dyn ObjectStore>,
    pub queue: Arc<dyn JobQueue>,
    pub matcher: Arc<Matcher>,
    pub config: TuneTraceConfig,
    pub session: SessionConfig,
}

/// Everything the server process runs: handler state plus the ingestion
/// worker and the receiving end of its queue
pub struct Services {
    pub state: AppState,
    pub worker: Arc<IngestionWorker>,
    pub jobs: mpsc::UnboundedReceiver<IngestJob>,
}

impl Services {
    pub fn new(
        index: Arc<dyn FingerprintIndex>,
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        service: &ServiceConfig,
    ) -> Self {
        let config = TuneTraceConfig::default();
        let (queue, jobs) = ChannelQueue::new();
        let matcher = Arc::new(Matcher::new(
            index.clone(),
            metadata.clone(),
            service.matching.clone(),
        ));
        let worker = Arc::new(IngestionWorker::new(
            index,
            metadata.clone(),
            objects.clone(),
            config.clone(),
        ));

        Self {
            state: AppState {
                metadata,
                objects,
                queue: Arc::new(queue),
                matcher,
                config,
                session: service.session.clone(),
            },
            worker,
            jobs,
        }
    }

    /// In-memory index and metadata over the given object store
    pub fn in_memory(objects: Arc<dyn ObjectStore>, service: &ServiceConfig) -> Self {
        Self::new(
            Arc::new(MemoryIndex::new()),
            Arc::new(MemoryMetadataStore::new()),
            objects,
            service,
        )
    }

    /// Build the backends selected in the configuration
    pub async fn from_config(service: &ServiceConfig) -> anyhow::Result<Self> {
        let objects_dir = &service.storage.objects.base_directory;
        let objects: Arc<dyn ObjectStore> = Arc::new(FilesystemObjectStore::new(objects_dir));
        log::info!("Storing uploads under {}", objects_dir);

        match service.storage.backend {
            StorageBackend::Memory => {
                log::warn!("Using in-memory index: indexed tracks are lost on restart");
                Ok(Self::in_memory(objects, service))
            }
            StorageBackend::Postgresql => {
                let pg = &service.storage.postgresql;
                let pool = tunetrace_db::create_pool(
                    &pg.host,
                    pg.port,
                    &pg.database,
                    &pg.user,
                    &pg.password,
                    pg.max_connections,
                )?;
                tunetrace_db::test_connection(&pool).await.with_context(|| {
                    format!(
                        "Cannot reach {}",
                        service.connection_string().unwrap_or_default()
                    )
                })?;
                tunetrace_db::init_schema(&pool).await?;
                log::info!("Connected to PostgreSQL at {}:{}", pg.host, pg.port);

                Ok(Self::new(
                    Arc::new(PostgresIndex::new(pool.clone())),
                    Arc::new(PostgresMetadataStore::new(pool)),
                    objects,
                    service,
                ))
            }
        }
    }
}

/// Wait up to `limit` for the ingestion worker to finish its queue
///
/// Open stream sockets keep a queue sender alive, so the worker may never see
/// the queue close on its own. Returns whether the worker finished in time.
pub async fn drain_worker(worker: JoinHandle<()>, limit: Duration) -> bool {
    match tokio::time::timeout(limit, worker).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            log::error!("Ingestion worker stopped abnormally: {}", e);
            true
        }
        Err(_) => {
            log::warn!(
                "Ingestion worker still busy after {:?}, abandoning pending jobs",
                limit
            );
            false
        }
    }
}
