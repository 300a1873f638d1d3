use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    // Hierarchy columns use '' (not NULL) for absent levels: SQLite
    // treats NULLs as distinct in unique indexes, which would break the
    // (law_name, path) identity.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS law_segments (
            id TEXT PRIMARY KEY,
            law_name TEXT NOT NULL,
            book TEXT NOT NULL DEFAULT '',
            chapter TEXT NOT NULL DEFAULT '',
            section TEXT NOT NULL DEFAULT '',
            article TEXT NOT NULL DEFAULT '',
            paragraph TEXT NOT NULL DEFAULT '',
            item TEXT NOT NULL DEFAULT '',
            content TEXT NOT NULL,
            token_count INTEGER NOT NULL,
            key_concepts TEXT NOT NULL DEFAULT '[]',
            content_hash TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'segmented',
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(law_name, book, chapter, section, article, paragraph, item)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS law_segment_vectors (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            segment_id TEXT NOT NULL REFERENCES law_segments(id) ON DELETE CASCADE,
            vector BLOB NOT NULL,
            dims INTEGER NOT NULL,
            embedding_model TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            UNIQUE(segment_id, embedding_model)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_segments_law ON law_segments(law_name)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_segments_state ON law_segments(state)")
        .execute(&pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_vectors_model ON law_segment_vectors(embedding_model)",
    )
    .execute(&pool)
    .await?;

    pool.close().await;
    Ok(())
}
