#![forbid(unsafe_code)]

use super::*;
use pl_core::ids::RootId;
use rusqlite::params;

impl SqliteStore {
    /// Semantic facts are append-only; recall never mutates them.
    pub fn add_fact(&mut self, root: &RootId, request: FactAddRequest) -> Result<FactRow, StoreError> {
        let FactAddRequest {
            content,
            embedding_json,
            metadata_json,
        } = request;
        if content.trim().is_empty() {
            return Err(StoreError::InvalidInput("fact content must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let seq = next_counter_tx(&tx, root.as_str(), "fact_seq")?;
        let id = format!("FACT-{seq:03}");
        tx.execute(
            r#"
            INSERT INTO semantic_facts(root, id, content, embedding_json, metadata_json, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![root.as_str(), id, content, embedding_json, metadata_json, now_ms],
        )?;
        tx.commit()?;

        Ok(FactRow {
            id,
            content,
            embedding_json,
            metadata_json,
            created_at_ms: now_ms,
        })
    }

    /// Newest facts first, capped. Similarity ranking happens in the engine
    /// over this bounded slice.
    pub fn recent_facts(&self, root: &RootId, limit: usize) -> Result<Vec<FactRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, content, embedding_json, metadata_json, created_at_ms
            FROM semantic_facts
            WHERE root = ?1
            ORDER BY created_at_ms DESC, id DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok(FactRow {
                id: row.get(0)?,
                content: row.get(1)?,
                embedding_json: row.get(2)?,
                metadata_json: row.get(3)?,
                created_at_ms: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}
