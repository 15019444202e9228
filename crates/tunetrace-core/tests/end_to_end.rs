//! Ingest a synthetic recording, then identify clips of it

use std::f32::consts::PI;
use std::sync::Arc;
use tunetrace_core::chunking::{encode_wav_pcm16, split_chunks};
use tunetrace_core::service_config::SessionConfig;
use tunetrace_core::{
    fingerprint_audio, ClientMessage, IngestJob, IngestionWorker, MatchingConfig, Matcher,
    MemoryIndex, MemoryMetadataStore, MemoryObjectStore, MetadataStore, ObjectStore, Posting,
    ServerMessage, StreamingSession, TrackStatus, TuneTraceConfig,
};

const RATE: u32 = 44100;
const HOP: usize = 512;

/// Hann-shaped tone bursts, one every eight hops, at pseudo-random
/// bin-centred frequencies drawn from `bins`
fn tone_bursts(seed: u32, seconds: f32, bins: std::ops::Range<usize>) -> Vec<f32> {
    let len = (RATE as f32 * seconds) as usize;
    let mut samples = vec![0.0f32; len];
    let mut state = seed;
    let mut start = 0;
    while start + 2048 <= len {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let bin = bins.start + (state >> 16) as usize % bins.len();
        let freq = bin as f32 * RATE as f32 / 2048.0;
        for n in 0..2048 {
            let env = 0.5 * (1.0 - (2.0 * PI * n as f32 / 2047.0).cos());
            samples[start + n] = 0.5 * env * (2.0 * PI * freq * n as f32 / RATE as f32).sin();
        }
        start += 8 * HOP;
    }
    samples
}

struct Service {
    index: Arc<MemoryIndex>,
    metadata: Arc<MemoryMetadataStore>,
    objects: Arc<MemoryObjectStore>,
    config: TuneTraceConfig,
}

impl Service {
    fn new() -> Self {
        Self {
            index: Arc::new(MemoryIndex::new()),
            metadata: Arc::new(MemoryMetadataStore::new()),
            objects: Arc::new(MemoryObjectStore::new()),
            config: TuneTraceConfig::default(),
        }
    }

    async fn ingest(&self, title: &str, samples: &[f32]) -> String {
        let key = format!("uploads/{}.wav", title);
        let track = self.metadata.create_track(title, "Synth", &key).await.unwrap();
        self.objects
            .put(&key, encode_wav_pcm16(samples, RATE).unwrap())
            .await
            .unwrap();

        let worker = IngestionWorker::new(
            self.index.clone(),
            self.metadata.clone(),
            self.objects.clone(),
            self.config.clone(),
        );
        worker
            .process(&IngestJob {
                track_id: track.id.clone(),
                storage_key: key,
            })
            .await
            .unwrap();
        track.id
    }

    fn matcher(&self) -> Arc<Matcher> {
        Arc::new(Matcher::new(
            self.index.clone(),
            self.metadata.clone(),
            MatchingConfig::default(),
        ))
    }
}

#[tokio::test]
async fn identifies_sub_clip_at_its_offset() {
    let service = Service::new();
    let recording = tone_bursts(42, 5.0, 20..400);
    let t1 = service.ingest("t1", &recording).await;

    let status = service.metadata.get_track(&t1).await.unwrap().unwrap().status;
    assert_eq!(status, TrackStatus::Ready);

    // 1.5 s clip starting on a hop boundary, 130 hops in (~1509.3 ms)
    let start = 130 * HOP;
    let clip = &recording[start..start + 66150];
    let query = fingerprint_audio(&encode_wav_pcm16(clip, RATE).unwrap(), &service.config).unwrap();
    assert!(!query.is_empty());

    let result = service.matcher().query(&query).await.unwrap().unwrap();
    assert_eq!(result.track_id, t1);
    assert_eq!(result.title, "t1");
    assert!((result.delta_ms - 1509).abs() <= 1, "delta {}", result.delta_ms);
    // Rounding splits aligned votes over two adjacent deltas at most
    assert!(result.confidence as usize * 2 >= query.len());
}

#[tokio::test]
async fn confidence_covers_every_shared_posting() {
    let service = Service::new();
    let recording = tone_bursts(5, 5.0, 20..400);
    let t1 = service.ingest("t1", &recording).await;
    service.ingest("other", &tone_bursts(6, 5.0, 20..400)).await;

    // Stored postings between 1 s and 2.5 s, re-timed to start at zero
    let wav = encode_wav_pcm16(&recording, RATE).unwrap();
    let stored = fingerprint_audio(&wav, &service.config).unwrap();
    let query: Vec<Posting> = stored
        .iter()
        .filter(|p| (1000..2500).contains(&p.offset_ms))
        .map(|p| Posting::new(p.hash, p.offset_ms - 1000))
        .collect();
    assert!(!query.is_empty());

    let result = service.matcher().query(&query).await.unwrap().unwrap();
    assert_eq!(result.track_id, t1);
    assert_eq!(result.delta_ms, 1000);
    assert!(result.confidence as usize >= query.len());
}

#[tokio::test]
async fn unrelated_audio_does_not_match() {
    let service = Service::new();
    service.ingest("low", &tone_bursts(42, 5.0, 20..400)).await;

    // Disjoint frequency range: no hash can coincide
    let other = tone_bursts(42, 1.5, 600..1000);
    let wav = encode_wav_pcm16(&other, RATE).unwrap();
    let query = fingerprint_audio(&wav, &service.config).unwrap();
    assert!(!query.is_empty());
    assert!(service.matcher().query(&query).await.unwrap().is_none());

    let silence = encode_wav_pcm16(&vec![0.0; 66150], RATE).unwrap();
    let query = fingerprint_audio(&silence, &service.config).unwrap();
    assert!(query.is_empty());
    assert!(service.matcher().query(&query).await.unwrap().is_none());
}

#[tokio::test]
async fn streaming_session_matches_client_chunks() {
    let service = Service::new();
    let recording = tone_bursts(42, 5.0, 20..400);
    let t1 = service.ingest("t1", &recording).await;

    let mut session = StreamingSession::new(
        service.matcher(),
        service.config.clone(),
        &SessionConfig::default(),
    );

    let chunks = split_chunks(&recording, RATE, 1.5);
    assert_eq!(chunks.len(), 3);

    let mut replies = Vec::new();
    for chunk in &chunks {
        replies.push(session.handle_text("ping").await);
        replies.push(session.handle(ClientMessage::Chunk(chunk.to_wav().unwrap())).await);
    }

    // The first chunk is frame-aligned with the recording
    match &replies[1] {
        Some(ServerMessage::Match {
            ok: true,
            result: Some(m),
        }) => {
            assert_eq!(m.track_id, t1);
            assert_eq!(m.delta_ms, 0);
        }
        other => panic!("unexpected reply {:?}", other),
    }
    for reply in replies.iter().skip(1).step_by(2) {
        assert!(matches!(reply, Some(ServerMessage::Match { ok: true, .. })));
    }
    for reply in replies.iter().step_by(2) {
        assert!(matches!(reply, Some(ServerMessage::Pong { ok: true, .. })));
    }
    assert_eq!(session.chunks_processed(), 3);
}
