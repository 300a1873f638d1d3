//! SQLite-backed [`SegmentStore`] implementation.
//!
//! Maps each [`SegmentStore`] operation to SQL against the
//! `law_segments` and `law_segment_vectors` tables. The variable-depth
//! citation path is flattened into the six hierarchy columns, with `''`
//! standing in for absent levels so the unique index holds.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use lexindex_core::embedding::{blob_to_vec, vec_to_blob};
use lexindex_core::error::Error;
use lexindex_core::models::{
    content_hash, HierarchyLevel, HierarchyPath, LawSegment, Scope, SegmentRecord, SegmentState,
    SegmentVector,
};
use lexindex_core::store::{
    GenerationStatus, SegmentStore, UpsertDisposition, UpsertOutcome, VectorEntry,
};

/// SQLite implementation of the [`SegmentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

/// The citation path flattened to the six hierarchy columns, coarsest
/// first, `''` for absent levels.
fn path_columns(path: &HierarchyPath) -> [String; 6] {
    let mut columns: [String; 6] = std::array::from_fn(|_| String::new());
    for (i, level) in HierarchyLevel::ALL.iter().enumerate() {
        if let Some(value) = path.get(*level) {
            columns[i] = value.to_string();
        }
    }
    columns
}

fn record_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<SegmentRecord> {
    let mut pairs = Vec::new();
    for level in HierarchyLevel::ALL {
        let value: String = row.get(level.as_str());
        if !value.is_empty() {
            pairs.push((level, value));
        }
    }
    let path = HierarchyPath::from_pairs(pairs)?;

    let key_concepts_json: String = row.get("key_concepts");
    let key_concepts: Vec<String> = serde_json::from_str(&key_concepts_json).unwrap_or_default();

    let state_str: String = row.get("state");
    let token_count: i64 = row.get("token_count");

    Ok(SegmentRecord {
        id: row.get("id"),
        segment: LawSegment {
            law_name: row.get("law_name"),
            path,
            content: row.get("content"),
            token_count: token_count as u32,
            key_concepts,
        },
        state: SegmentState::parse(&state_str)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    })
}

const SEGMENT_COLUMNS: &str = "s.id, s.law_name, s.book, s.chapter, s.section, s.article, \
     s.paragraph, s.item, s.content, s.token_count, s.key_concepts, s.state, \
     s.created_at, s.updated_at";

/// Extra `AND` conditions plus bind values for a scope filter.
fn scope_conditions(scope: &Scope) -> (String, Vec<String>) {
    let mut sql = String::new();
    let mut binds = Vec::new();
    if let Some(law) = &scope.law_name {
        sql.push_str(" AND s.law_name = ?");
        binds.push(law.clone());
    }
    for (level, value) in scope.path_filter.pairs() {
        sql.push_str(&format!(" AND s.{} = ?", level.as_str()));
        binds.push(value.clone());
    }
    (sql, binds)
}

#[async_trait]
impl SegmentStore for SqliteStore {
    async fn upsert_segments(&self, segments: &[LawSegment]) -> Result<Vec<UpsertOutcome>> {
        let mut tx = self.pool.begin().await?;
        let now = chrono::Utc::now().timestamp();
        let mut outcomes = Vec::with_capacity(segments.len());

        for segment in segments {
            let columns = path_columns(&segment.path);
            let existing = sqlx::query(
                r#"
                SELECT id, content FROM law_segments
                WHERE law_name = ? AND book = ? AND chapter = ? AND section = ?
                  AND article = ? AND paragraph = ? AND item = ?
                "#,
            )
            .bind(&segment.law_name)
            .bind(&columns[0])
            .bind(&columns[1])
            .bind(&columns[2])
            .bind(&columns[3])
            .bind(&columns[4])
            .bind(&columns[5])
            .fetch_optional(&mut *tx)
            .await?;

            let key_concepts_json = serde_json::to_string(&segment.key_concepts)?;
            let hash = content_hash(&segment.content);

            let outcome = match existing {
                Some(row) => {
                    let id: String = row.get("id");
                    let old_content: String = row.get("content");
                    if old_content == segment.content {
                        UpsertOutcome {
                            id,
                            disposition: UpsertDisposition::Unchanged,
                        }
                    } else {
                        sqlx::query(
                            r#"
                            UPDATE law_segments
                            SET content = ?, token_count = ?, key_concepts = ?,
                                content_hash = ?, state = 'segmented', updated_at = ?
                            WHERE id = ?
                            "#,
                        )
                        .bind(&segment.content)
                        .bind(segment.token_count as i64)
                        .bind(&key_concepts_json)
                        .bind(&hash)
                        .bind(now)
                        .bind(&id)
                        .execute(&mut *tx)
                        .await?;
                        UpsertOutcome {
                            id,
                            disposition: UpsertDisposition::Replaced,
                        }
                    }
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    sqlx::query(
                        r#"
                        INSERT INTO law_segments
                            (id, law_name, book, chapter, section, article, paragraph, item,
                             content, token_count, key_concepts, content_hash, state,
                             created_at, updated_at)
                        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 'segmented', ?, ?)
                        "#,
                    )
                    .bind(&id)
                    .bind(&segment.law_name)
                    .bind(&columns[0])
                    .bind(&columns[1])
                    .bind(&columns[2])
                    .bind(&columns[3])
                    .bind(&columns[4])
                    .bind(&columns[5])
                    .bind(&segment.content)
                    .bind(segment.token_count as i64)
                    .bind(&key_concepts_json)
                    .bind(&hash)
                    .bind(now)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                    UpsertOutcome {
                        id,
                        disposition: UpsertDisposition::Inserted,
                    }
                }
            };
            outcomes.push(outcome);
        }

        tx.commit().await?;
        Ok(outcomes)
    }

    async fn get_segment(&self, segment_id: &str) -> Result<Option<SegmentRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {SEGMENT_COLUMNS} FROM law_segments s WHERE s.id = ?"
        ))
        .bind(segment_id)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(record_from_row).transpose()
    }

    async fn list_segments(&self, scope: &Scope) -> Result<Vec<SegmentRecord>> {
        let (conditions, binds) = scope_conditions(scope);
        let sql = format!(
            "SELECT {SEGMENT_COLUMNS} FROM law_segments s WHERE 1 = 1{conditions} \
             ORDER BY s.law_name, s.id"
        );
        let mut query = sqlx::query(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn remove_law(&self, law_name: &str) -> Result<u64> {
        // Vectors go with their segments via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM law_segments WHERE law_name = ?")
            .bind(law_name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn claim_for_vectorization(&self, segment_id: &str) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE law_segments SET state = 'vectorizing', updated_at = ? \
             WHERE id = ? AND state != 'vectorizing'",
        )
        .bind(chrono::Utc::now().timestamp())
        .bind(segment_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_claims(&self) -> Result<u64> {
        let result =
            sqlx::query("UPDATE law_segments SET state = 'segmented' WHERE state = 'vectorizing'")
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn set_state(&self, segment_id: &str, state: SegmentState) -> Result<()> {
        let result = sqlx::query("UPDATE law_segments SET state = ?, updated_at = ? WHERE id = ?")
            .bind(state.as_str())
            .bind(chrono::Utc::now().timestamp())
            .bind(segment_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("segment '{segment_id}'")).into());
        }
        Ok(())
    }

    async fn upsert_vector(
        &self,
        segment_id: &str,
        vector: &[f32],
        embedding_model: &str,
        content_hash: &str,
    ) -> Result<()> {
        let blob = vec_to_blob(vector);
        sqlx::query(
            r#"
            INSERT INTO law_segment_vectors
                (segment_id, vector, dims, embedding_model, content_hash, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(segment_id, embedding_model) DO UPDATE SET
                vector = excluded.vector,
                dims = excluded.dims,
                content_hash = excluded.content_hash,
                created_at = excluded.created_at
            "#,
        )
        .bind(segment_id)
        .bind(&blob)
        .bind(vector.len() as i64)
        .bind(embedding_model)
        .bind(content_hash)
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn established_dims(&self, embedding_model: &str) -> Result<Option<usize>> {
        let dims: Option<i64> = sqlx::query_scalar(
            "SELECT dims FROM law_segment_vectors WHERE embedding_model = ? ORDER BY id LIMIT 1",
        )
        .bind(embedding_model)
        .fetch_optional(&self.pool)
        .await?;
        Ok(dims.map(|d| d as usize))
    }

    async fn vectors_for_model(
        &self,
        embedding_model: &str,
        scope: &Scope,
    ) -> Result<Vec<VectorEntry>> {
        let (conditions, binds) = scope_conditions(scope);
        let sql = format!(
            "SELECT {SEGMENT_COLUMNS}, v.vector, v.content_hash AS vector_hash, \
                    v.created_at AS vector_created_at \
             FROM law_segment_vectors v \
             JOIN law_segments s ON s.id = v.segment_id \
             WHERE v.embedding_model = ?{conditions} \
             ORDER BY s.id"
        );
        let mut query = sqlx::query(&sql).bind(embedding_model);
        for bind in &binds {
            query = query.bind(bind);
        }
        let rows = query.fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| {
                let record = record_from_row(row)?;
                let blob: Vec<u8> = row.get("vector");
                Ok(VectorEntry {
                    vector: SegmentVector {
                        segment_id: record.id.clone(),
                        vector: blob_to_vec(&blob),
                        embedding_model: embedding_model.to_string(),
                        content_hash: row.get("vector_hash"),
                        created_at: row.get("vector_created_at"),
                    },
                    record,
                })
            })
            .collect()
    }

    async fn pending_for_model(
        &self,
        embedding_model: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SegmentRecord>> {
        let limit_val = limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = sqlx::query(&format!(
            "SELECT {SEGMENT_COLUMNS} FROM law_segments s \
             LEFT JOIN law_segment_vectors v \
               ON v.segment_id = s.id AND v.embedding_model = ? \
             WHERE s.state != 'vectorizing' \
               AND (v.id IS NULL OR v.content_hash != s.content_hash \
                    OR s.state IN ('segmented', 'vectorization_failed')) \
             ORDER BY s.law_name, s.created_at, s.id \
             LIMIT ?"
        ))
        .bind(embedding_model)
        .bind(limit_val)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(record_from_row).collect()
    }

    async fn list_generations(&self) -> Result<Vec<GenerationStatus>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM law_segments")
            .fetch_one(&self.pool)
            .await?;

        let rows = sqlx::query(
            "SELECT embedding_model, MIN(dims) AS dims, COUNT(*) AS populated \
             FROM law_segment_vectors GROUP BY embedding_model ORDER BY embedding_model",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let dims: i64 = row.get("dims");
                let populated: i64 = row.get("populated");
                GenerationStatus {
                    embedding_model: row.get("embedding_model"),
                    dims: dims as usize,
                    populated: populated as u64,
                    total_segments: total as u64,
                }
            })
            .collect())
    }

    async fn retire_generation(&self, embedding_model: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM law_segment_vectors WHERE embedding_model = ?")
            .bind(embedding_model)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
