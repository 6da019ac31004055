#![forbid(unsafe_code)]

use super::*;
use pl_core::ids::RootId;
use rusqlite::params;

impl SqliteStore {
    pub fn list_events(
        &self,
        root: &RootId,
        since_event_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EventRow>, StoreError> {
        let since_seq = match since_event_id {
            None => 0i64,
            Some(event_id) => parse_event_id(event_id)
                .ok_or(StoreError::InvalidInput("since must be like evt_<16-digit-seq>"))?,
        };

        let mut stmt = self.conn().prepare(
            r#"
            SELECT seq, ts_ms, entity_id, type, payload_json
            FROM events
            WHERE root = ?1 AND seq > ?2
            ORDER BY seq ASC
            LIMIT ?3
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), since_seq, limit as i64], |row| {
            Ok(EventRow {
                seq: row.get(0)?,
                ts_ms: row.get(1)?,
                entity_id: row.get(2)?,
                event_type: row.get(3)?,
                payload_json: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn parse_event_id(event_id: &str) -> Option<i64> {
    let digits = event_id.strip_prefix("evt_")?;
    digits.parse::<i64>().ok()
}
