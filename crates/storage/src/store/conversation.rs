#![forbid(unsafe_code)]

use super::*;
use pl_core::ids::RootId;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    /// Append one turn to the rolling window and bump the per-root turn
    /// counter. Returns the turn's sequence number.
    pub fn append_turn(
        &mut self,
        root: &RootId,
        speaker: &str,
        content: &str,
    ) -> Result<i64, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let seq = next_counter_tx(&tx, root.as_str(), "turn_seq")?;
        tx.execute(
            r#"
            INSERT INTO conversation_turns(root, seq, speaker, content, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![root.as_str(), seq, speaker, content, now_ms],
        )?;
        tx.execute(
            r#"
            INSERT INTO conversation_state(root, rolling_summary, turn_count, updated_at_ms)
            VALUES (?1, '', 1, ?2)
            ON CONFLICT(root) DO UPDATE SET turn_count = turn_count + 1, updated_at_ms = ?2
            "#,
            params![root.as_str(), now_ms],
        )?;
        tx.commit()?;
        Ok(seq)
    }

    pub fn conversation_state(
        &self,
        root: &RootId,
    ) -> Result<Option<ConversationStateRow>, StoreError> {
        Ok(self
            .conn()
            .query_row(
                "SELECT rolling_summary, turn_count, updated_at_ms FROM conversation_state WHERE root = ?1",
                params![root.as_str()],
                |row| {
                    Ok(ConversationStateRow {
                        rolling_summary: row.get(0)?,
                        turn_count: row.get(1)?,
                        updated_at_ms: row.get(2)?,
                    })
                },
            )
            .optional()?)
    }

    /// Most recent turns, oldest first, at most `limit`.
    pub fn recent_turns(&self, root: &RootId, limit: usize) -> Result<Vec<TurnRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT seq, speaker, content, created_at_ms
            FROM conversation_turns
            WHERE root = ?1
            ORDER BY seq DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok(TurnRow {
                seq: row.get(0)?,
                speaker: row.get(1)?,
                content: row.get(2)?,
                created_at_ms: row.get(3)?,
            })
        })?;
        let mut out = rows.collect::<Result<Vec<_>, _>>()?;
        out.reverse();
        Ok(out)
    }

    pub fn window_len(&self, root: &RootId) -> Result<i64, StoreError> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*) FROM conversation_turns WHERE root = ?1",
            params![root.as_str()],
            |row| row.get(0),
        )?)
    }

    /// Collapse everything but the newest `keep_last` turns into the rolling
    /// summary. The summary overwrite and the window trim commit together,
    /// so the window never grows unbounded and a crash cannot lose turns
    /// without recording their summary.
    pub fn compact_turns(
        &mut self,
        root: &RootId,
        request: CompactTurnsRequest,
    ) -> Result<usize, StoreError> {
        let CompactTurnsRequest {
            keep_last,
            rolling_summary,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let max_seq: i64 = tx
            .query_row(
                "SELECT COALESCE(MAX(seq), 0) FROM conversation_turns WHERE root = ?1",
                params![root.as_str()],
                |row| row.get(0),
            )?;
        let cutoff = max_seq - keep_last as i64;
        let dropped = tx.execute(
            "DELETE FROM conversation_turns WHERE root = ?1 AND seq <= ?2",
            params![root.as_str(), cutoff],
        )?;
        tx.execute(
            r#"
            INSERT INTO conversation_state(root, rolling_summary, turn_count, updated_at_ms)
            VALUES (?1, ?2, 0, ?3)
            ON CONFLICT(root) DO UPDATE SET rolling_summary = excluded.rolling_summary, updated_at_ms = ?3
            "#,
            params![root.as_str(), rolling_summary, now_ms],
        )?;
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            None,
            "conversation.compacted",
            &format!("{{\"dropped\":{dropped}}}"),
        )?;
        tx.commit()?;
        Ok(dropped)
    }
}
