use anyhow::{Context, Result};
use deadpool_postgres::Pool;

use crate::models::*;

/// Tables backing the metadata store and the posting index
pub const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tracks (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    artist      TEXT NOT NULL,
    storage_key TEXT NOT NULL,
    status      TEXT NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE TABLE IF NOT EXISTS postings (
    id       BIGSERIAL PRIMARY KEY,
    hash_key TEXT NOT NULL,
    entry    TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS postings_hash_key_idx ON postings (hash_key, id);
";

/// Create tables and indexes if they do not exist yet
pub async fn init_schema(pool: &Pool) -> Result<()> {
    let client = pool.get().await?;

    client
        .batch_execute(SCHEMA)
        .await
        .context("Failed to initialise database schema")?;

    Ok(())
}

/// Insert a new track
pub async fn insert_track(pool: &Pool, track: &NewTrack) -> Result<TrackRow> {
    let client = pool.get().await?;

    let row = client
        .query_one(
            "INSERT INTO tracks (id, title, artist, storage_key, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, title, artist, storage_key, status, created_at",
            &[
                &track.id,
                &track.title,
                &track.artist,
                &track.storage_key,
                &track.status,
            ],
        )
        .await
        .context("Failed to insert track")?;

    Ok(track_from_row(&row))
}

/// Get track by ID
pub async fn get_track_by_id(pool: &Pool, id: &str) -> Result<Option<TrackRow>> {
    let client = pool.get().await?;

    let row = client
        .query_opt(
            "SELECT id, title, artist, storage_key, status, created_at
             FROM tracks
             WHERE id = $1",
            &[&id],
        )
        .await
        .context("Failed to get track")?;

    Ok(row.as_ref().map(track_from_row))
}

/// Update a track's lifecycle status. Returns false when the id is unknown.
pub async fn update_track_status(pool: &Pool, id: &str, status: &str) -> Result<bool> {
    let client = pool.get().await?;

    let updated = client
        .execute(
            "UPDATE tracks SET status = $2 WHERE id = $1",
            &[&id, &status],
        )
        .await
        .context("Failed to update track status")?;

    Ok(updated > 0)
}

/// Batch insert postings using JSONB, inside one transaction so a track's
/// postings land all at once or not at all
pub async fn insert_postings_batch(pool: &Pool, postings: &[NewPosting]) -> Result<()> {
    if postings.is_empty() {
        return Ok(());
    }

    let mut client = pool.get().await?;
    let transaction = client
        .transaction()
        .await
        .context("Failed to open posting transaction")?;

    // Build the JSONB array
    let json_array =
        serde_json::to_value(postings).context("Failed to serialize postings")?;

    transaction
        .execute(
            "INSERT INTO postings (hash_key, entry)
             SELECT
                 fp->>'hash_key',
                 fp->>'entry'
             FROM jsonb_array_elements($1::jsonb) WITH ORDINALITY AS t(fp, ord)
             ORDER BY ord",
            &[&json_array],
        )
        .await
        .context("Failed to batch insert postings")?;

    transaction
        .commit()
        .await
        .context("Failed to commit postings")?;

    log::debug!("Inserted {} postings", postings.len());

    Ok(())
}

/// Get the oldest `limit` entries stored under a hash key, in insertion order
pub async fn get_entries_by_hash_key(
    pool: &Pool,
    hash_key: &str,
    limit: i64,
) -> Result<Vec<String>> {
    let client = pool.get().await?;

    let rows = client
        .query(
            "SELECT entry
             FROM postings
             WHERE hash_key = $1
             ORDER BY id
             LIMIT $2",
            &[&hash_key, &limit],
        )
        .await
        .context("Failed to get postings by hash")?;

    Ok(rows.iter().map(|r| r.get(0)).collect())
}

fn track_from_row(r: &tokio_postgres::Row) -> TrackRow {
    TrackRow {
        id: r.get(0),
        title: r.get(1),
        artist: r.get(2),
        storage_key: r.get(3),
        status: r.get(4),
        created_at: r.get(5),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::create_pool;

    // These tests require a running PostgreSQL instance:
    // cargo test --package tunetrace-db -- --ignored

    async fn pool() -> Pool {
        let pool = create_pool(
            "localhost",
            5432,
            "tunetrace",
            "tunetrace_user",
            "tunetrace_pass",
            4,
        )
        .unwrap();
        init_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    #[ignore]
    async fn test_track_lifecycle() {
        let pool = pool().await;
        let id = format!("test-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));

        let row = insert_track(
            &pool,
            &NewTrack {
                id: id.clone(),
                title: "Song".to_string(),
                artist: "Artist".to_string(),
                storage_key: "song.wav".to_string(),
                status: "QUEUED".to_string(),
            },
        )
        .await
        .unwrap();
        assert_eq!(row.status, "QUEUED");

        assert!(update_track_status(&pool, &id, "READY").await.unwrap());
        let fetched = get_track_by_id(&pool, &id).await.unwrap().unwrap();
        assert_eq!(fetched.status, "READY");
        assert!(!update_track_status(&pool, "missing", "READY").await.unwrap());
    }

    #[tokio::test]
    #[ignore]
    async fn test_entries_keep_insertion_order() {
        let pool = pool().await;
        let key = format!("fp:test-{}", chrono::Utc::now().timestamp_nanos_opt().unwrap_or(0));
        let postings: Vec<NewPosting> = (0..3)
            .map(|i| NewPosting {
                hash_key: key.clone(),
                entry: format!("t1:{}", i * 10),
            })
            .collect();

        insert_postings_batch(&pool, &postings).await.unwrap();
        let entries = get_entries_by_hash_key(&pool, &key, 2).await.unwrap();
        assert_eq!(entries, vec!["t1:0".to_string(), "t1:10".to_string()]);
    }
}
