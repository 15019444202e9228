//! Router and upload handlers

use super::error::ApiError;
use super::state::AppState;
use super::stream::stream_handler;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tunetrace_core::{IngestJob, Track, TrackStatus};

/// Build the application router
pub fn create_router(state: AppState, max_body_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/tracks", post(create_track))
        .route("/tracks/{id}", get(get_track))
        .route("/ws/stream", get(stream_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(cors)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

#[derive(Debug, Serialize)]
struct CreatedTrack {
    id: String,
    #[serde(rename = "storageKey")]
    storage_key: String,
    status: TrackStatus,
}

#[derive(Default)]
struct UploadForm {
    file: Option<(Vec<u8>, Option<String>)>,
    title: Option<String>,
    artist: Option<String>,
}

impl UploadForm {
    async fn parse(multipart: &mut Multipart) -> Result<Self, ApiError> {
        let mut form = UploadForm::default();
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(format!("malformed multipart body: {}", e)))?
        {
            let name = field.name().unwrap_or("").to_string();
            match name.as_str() {
                "file" => {
                    let file_name = field.file_name().map(|s| s.to_string());
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(format!("failed to read file: {}", e)))?;
                    form.file = Some((data.to_vec(), file_name));
                }
                "title" | "artist" => {
                    let value = field.text().await.map_err(|e| {
                        ApiError::bad_request(format!("failed to read {}: {}", name, e))
                    })?;
                    let value = value.trim().to_string();
                    if name == "title" {
                        form.title = Some(value);
                    } else {
                        form.artist = Some(value);
                    }
                }
                other => log::debug!("Ignoring multipart field {:?}", other),
            }
        }
        Ok(form)
    }
}

/// Keep only characters that are safe inside a storage key
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload.wav".to_string()
    } else {
        cleaned.to_string()
    }
}

async fn create_track(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedTrack>), ApiError> {
    let form = UploadForm::parse(&mut multipart).await?;
    let (Some((bytes, file_name)), Some(title), Some(artist)) = (form.file, form.title, form.artist)
    else {
        return Err(ApiError::bad_request("file, title, artist are required"));
    };
    if bytes.is_empty() || title.is_empty() || artist.is_empty() {
        return Err(ApiError::bad_request("file, title, artist are required"));
    }

    let storage_key = format!(
        "uploads/{}-{}",
        uuid::Uuid::new_v4(),
        sanitize_file_name(file_name.as_deref().unwrap_or_default())
    );
    let size = bytes.len();
    state.objects.put(&storage_key, bytes).await?;

    let track = state
        .metadata
        .create_track(&title, &artist, &storage_key)
        .await?;

    let job = IngestJob {
        track_id: track.id.clone(),
        storage_key: storage_key.clone(),
    };
    if let Err(e) = state.queue.enqueue(job).await {
        let _ = state
            .metadata
            .update_status(&track.id, TrackStatus::Failed)
            .await;
        return Err(e.into());
    }

    log::info!(
        "Accepted track {} ({:?} by {:?}, {} bytes)",
        track.id,
        title,
        artist,
        size
    );

    Ok((
        StatusCode::CREATED,
        Json(CreatedTrack {
            id: track.id,
            storage_key,
            status: track.status,
        }),
    ))
}

async fn get_track(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Track>, ApiError> {
    state
        .metadata
        .get_track(&id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("not found"))
}
