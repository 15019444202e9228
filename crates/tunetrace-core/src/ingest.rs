//! Ingestion worker
//!
//! Fingerprints uploaded tracks and appends their postings to the index,
//! driving each track QUEUED -> FINGERPRINTING -> READY, or FAILED on error.

use crate::config::TuneTraceConfig;
use crate::error::{Result, TuneTraceError};
use crate::index::FingerprintIndex;
use crate::metadata::{MetadataStore, TrackStatus};
use crate::object_store::ObjectStore;
use crate::queue::IngestJob;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Semaphore};

pub struct IngestionWorker {
    index: Arc<dyn FingerprintIndex>,
    metadata: Arc<dyn MetadataStore>,
    objects: Arc<dyn ObjectStore>,
    config: TuneTraceConfig,
}

impl IngestionWorker {
    pub fn new(
        index: Arc<dyn FingerprintIndex>,
        metadata: Arc<dyn MetadataStore>,
        objects: Arc<dyn ObjectStore>,
        config: TuneTraceConfig,
    ) -> Self {
        Self {
            index,
            metadata,
            objects,
            config,
        }
    }

    /// Run one job to completion; returns the number of postings indexed
    ///
    /// Any failure marks the track FAILED and is returned to the caller.
    pub async fn process(&self, job: &IngestJob) -> Result<usize> {
        let start = Instant::now();
        self.metadata
            .update_status(&job.track_id, TrackStatus::Fingerprinting)
            .await?;

        match self.fingerprint_and_index(job).await {
            Ok(count) => {
                self.metadata
                    .update_status(&job.track_id, TrackStatus::Ready)
                    .await?;
                log::info!(
                    "Indexed track {}: {} postings in {:.2}s",
                    job.track_id,
                    count,
                    start.elapsed().as_secs_f64()
                );
                Ok(count)
            }
            Err(e) => {
                log::error!("Ingestion of track {} failed: {}", job.track_id, e);
                if let Err(status_err) = self
                    .metadata
                    .update_status(&job.track_id, TrackStatus::Failed)
                    .await
                {
                    log::error!(
                        "Could not mark track {} as failed: {}",
                        job.track_id,
                        status_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn fingerprint_and_index(&self, job: &IngestJob) -> Result<usize> {
        let bytes = self.objects.get(&job.storage_key).await?;
        log::debug!("Fetched {} bytes for track {}", bytes.len(), job.track_id);

        let config = self.config.clone();
        let postings =
            tokio::task::spawn_blocking(move || crate::fingerprint_audio(&bytes, &config))
                .await
                .map_err(|e| TuneTraceError::Task(e.to_string()))??;

        self.index.insert(&job.track_id, &postings).await?;
        Ok(postings.len())
    }

    /// Drain jobs until the sender side closes, with at most `concurrency`
    /// jobs in flight. Waits for running jobs before returning.
    pub async fn run(
        self: Arc<Self>,
        mut jobs: mpsc::UnboundedReceiver<IngestJob>,
        concurrency: usize,
    ) {
        let concurrency = concurrency.max(1);
        let permits = Arc::new(Semaphore::new(concurrency));
        log::info!("Ingestion worker started ({} concurrent jobs)", concurrency);

        while let Some(job) = jobs.recv().await {
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let worker = Arc::clone(&self);
            tokio::spawn(async move {
                // Failures are already recorded on the track
                let _ = worker.process(&job).await;
                drop(permit);
            });
        }

        let _ = permits.acquire_many(concurrency as u32).await;
        log::info!("Ingestion worker stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::encode_wav_pcm16;
    use crate::fingerprint::Posting;
    use crate::index::MemoryIndex;
    use crate::metadata::MemoryMetadataStore;
    use crate::object_store::MemoryObjectStore;
    use crate::queue::{ChannelQueue, JobQueue};
    use async_trait::async_trait;

    struct Stores {
        index: Arc<MemoryIndex>,
        metadata: Arc<MemoryMetadataStore>,
        objects: Arc<MemoryObjectStore>,
    }

    fn stores() -> Stores {
        Stores {
            index: Arc::new(MemoryIndex::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
            objects: Arc::new(MemoryObjectStore::new()),
        }
    }

    fn worker(s: &Stores) -> IngestionWorker {
        IngestionWorker::new(
            s.index.clone(),
            s.metadata.clone(),
            s.objects.clone(),
            TuneTraceConfig::default(),
        )
    }

    /// Hann-shaped tone bursts at a few bins, eight frames apart
    fn bursts() -> Vec<f32> {
        let mut samples = vec![0.0f32; 44100];
        for (k, bin) in [60usize, 140, 95, 210, 75, 180, 120, 250].iter().enumerate() {
            let freq = *bin as f32 * 44100.0 / 2048.0;
            let start = k * 4096;
            for n in 0..2048 {
                let env = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * n as f32 / 2047.0).cos());
                samples[start + n] +=
                    0.5 * env * (2.0 * std::f32::consts::PI * freq * n as f32 / 44100.0).sin();
            }
        }
        samples
    }

    #[tokio::test]
    async fn test_successful_job_marks_ready() {
        let s = stores();
        let track = s.metadata.create_track("T", "A", "t.wav").await.unwrap();
        s.objects
            .put("t.wav", encode_wav_pcm16(&bursts(), 44100).unwrap())
            .await
            .unwrap();

        let job = IngestJob {
            track_id: track.id.clone(),
            storage_key: "t.wav".into(),
        };
        let count = worker(&s).process(&job).await.unwrap();

        assert!(count > 0);
        assert_eq!(s.index.entry_count().await, count);
        let loaded = s.metadata.get_track(&track.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TrackStatus::Ready);
    }

    #[tokio::test]
    async fn test_undecodable_audio_marks_failed() {
        let s = stores();
        let track = s.metadata.create_track("T", "A", "bad.wav").await.unwrap();
        s.objects.put("bad.wav", b"not audio".to_vec()).await.unwrap();

        let job = IngestJob {
            track_id: track.id.clone(),
            storage_key: "bad.wav".into(),
        };
        let err = worker(&s).process(&job).await.unwrap_err();

        assert_eq!(err.code(), "decode_error");
        let loaded = s.metadata.get_track(&track.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TrackStatus::Failed);
        assert_eq!(s.index.entry_count().await, 0);
    }

    #[tokio::test]
    async fn test_missing_object_marks_failed() {
        let s = stores();
        let track = s.metadata.create_track("T", "A", "gone.wav").await.unwrap();
        let job = IngestJob {
            track_id: track.id.clone(),
            storage_key: "gone.wav".into(),
        };
        assert!(worker(&s).process(&job).await.is_err());
        let loaded = s.metadata.get_track(&track.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TrackStatus::Failed);
    }

    struct RejectingIndex;

    #[async_trait]
    impl FingerprintIndex for RejectingIndex {
        async fn insert(&self, _track_id: &str, _postings: &[Posting]) -> Result<()> {
            Err(TuneTraceError::Index("read-only replica".into()))
        }

        async fn fetch(&self, _key: &str, _limit: usize) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_index_write_failure_marks_failed() {
        let s = stores();
        let track = s.metadata.create_track("T", "A", "t.wav").await.unwrap();
        s.objects
            .put("t.wav", encode_wav_pcm16(&bursts(), 44100).unwrap())
            .await
            .unwrap();

        let worker = IngestionWorker::new(
            Arc::new(RejectingIndex),
            s.metadata.clone(),
            s.objects.clone(),
            TuneTraceConfig::default(),
        );
        let job = IngestJob {
            track_id: track.id.clone(),
            storage_key: "t.wav".into(),
        };
        let err = worker.process(&job).await.unwrap_err();
        assert_eq!(err.code(), "index_unavailable");
        let loaded = s.metadata.get_track(&track.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, TrackStatus::Failed);
    }

    #[tokio::test]
    async fn test_run_drains_queue() {
        let s = stores();
        let (queue, rx) = ChannelQueue::new();
        s.objects
            .put("t.wav", encode_wav_pcm16(&bursts(), 44100).unwrap())
            .await
            .unwrap();

        let mut ids = Vec::new();
        for i in 0..3 {
            let track = s
                .metadata
                .create_track(&format!("T{}", i), "A", "t.wav")
                .await
                .unwrap();
            queue
                .enqueue(IngestJob {
                    track_id: track.id.clone(),
                    storage_key: "t.wav".into(),
                })
                .await
                .unwrap();
            ids.push(track.id);
        }
        drop(queue);

        Arc::new(worker(&s)).run(rx, 2).await;

        for id in &ids {
            let loaded = s.metadata.get_track(id).await.unwrap().unwrap();
            assert_eq!(loaded.status, TrackStatus::Ready);
        }
        // Identical audio for every track, so every hash list holds all three
        let entries = s.index.entry_count().await;
        assert!(entries > 0);
        assert_eq!(entries % 3, 0);
    }
}
