#![forbid(unsafe_code)]

use super::*;
use pl_core::ids::RootId;
use pl_core::model::{Role, RootStatus};
use rusqlite::{ErrorCode, OptionalExtension, params};

impl SqliteStore {
    pub fn create_root(&mut self, request: CreateRootRequest) -> Result<RootRow, StoreError> {
        let CreateRootRequest {
            display_name,
            target_date_ms,
            details_json,
        } = request;
        if display_name.trim().is_empty() {
            return Err(StoreError::InvalidInput("display_name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        let seq = next_global_counter_tx(&tx, "root_seq")?;
        let id = format!("ROOT-{seq:03}");

        tx.execute(
            r#"
            INSERT INTO roots(id, revision, display_name, target_date_ms, status, details_json, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
            params![
                id,
                0i64,
                display_name,
                target_date_ms,
                RootStatus::Onboarding.as_str(),
                details_json,
                now_ms,
                now_ms
            ],
        )?;
        insert_event_tx(&tx, &id, now_ms, Some(&id), "root.created", "{}")?;
        tx.commit()?;

        Ok(RootRow {
            id,
            revision: 0,
            display_name,
            target_date_ms,
            status: RootStatus::Onboarding,
            details_json,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn get_root(&self, root: &RootId) -> Result<Option<RootRow>, StoreError> {
        let row = self
            .conn()
            .query_row(
                r#"
                SELECT id, revision, display_name, target_date_ms, status, details_json, created_at_ms, updated_at_ms
                FROM roots
                WHERE id = ?1
                "#,
                params![root.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, Option<i64>>(3)?,
                        row.get::<_, String>(4)?,
                        row.get::<_, String>(5)?,
                        row.get::<_, i64>(6)?,
                        row.get::<_, i64>(7)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, revision, display_name, target_date_ms, status, details_json, created, updated)) =
            row
        else {
            return Ok(None);
        };
        Ok(Some(RootRow {
            id,
            revision,
            display_name,
            target_date_ms,
            status: parse_root_status(&status)?,
            details_json,
            created_at_ms: created,
            updated_at_ms: updated,
        }))
    }

    pub fn set_root_status(
        &mut self,
        root: &RootId,
        expected_revision: Option<i64>,
        status: RootStatus,
        event_payload_json: &str,
    ) -> Result<i64, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;

        let revision: i64 = tx
            .query_row(
                "SELECT revision FROM roots WHERE id = ?1",
                params![root.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownRoot)?;
        check_revision(expected_revision, revision)?;

        let new_revision = revision + 1;
        tx.execute(
            "UPDATE roots SET revision = ?2, status = ?3, updated_at_ms = ?4 WHERE id = ?1",
            params![root.as_str(), new_revision, status.as_str(), now_ms],
        )?;
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(root.as_str()),
            "root.status",
            event_payload_json,
        )?;
        tx.commit()?;
        Ok(new_revision)
    }

    pub fn set_root_details(
        &mut self,
        root: &RootId,
        expected_revision: Option<i64>,
        details_json: &str,
    ) -> Result<i64, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;

        let revision: i64 = tx
            .query_row(
                "SELECT revision FROM roots WHERE id = ?1",
                params![root.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownRoot)?;
        check_revision(expected_revision, revision)?;

        let new_revision = revision + 1;
        tx.execute(
            "UPDATE roots SET revision = ?2, details_json = ?3, updated_at_ms = ?4 WHERE id = ?1",
            params![root.as_str(), new_revision, details_json, now_ms],
        )?;
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(root.as_str()),
            "root.details",
            "{}",
        )?;
        tx.commit()?;
        Ok(new_revision)
    }

    /// Change the target date only. Task deadlines are untouched; rewriting
    /// them is an explicit, separate operation.
    pub fn set_root_target_date(
        &mut self,
        root: &RootId,
        expected_revision: Option<i64>,
        target_date_ms: Option<i64>,
    ) -> Result<i64, StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;

        let revision: i64 = tx
            .query_row(
                "SELECT revision FROM roots WHERE id = ?1",
                params![root.as_str()],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownRoot)?;
        check_revision(expected_revision, revision)?;

        let new_revision = revision + 1;
        tx.execute(
            "UPDATE roots SET revision = ?2, target_date_ms = ?3, updated_at_ms = ?4 WHERE id = ?1",
            params![root.as_str(), new_revision, target_date_ms, now_ms],
        )?;
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(root.as_str()),
            "root.target_date",
            "{}",
        )?;
        tx.commit()?;
        Ok(new_revision)
    }

    pub fn add_member(
        &mut self,
        root: &RootId,
        identity: &str,
        role: Role,
    ) -> Result<(), StoreError> {
        if identity.trim().is_empty() {
            return Err(StoreError::InvalidInput("identity must not be empty"));
        }
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let inserted = tx.execute(
            "INSERT INTO members(root, identity, role, created_at_ms) VALUES (?1, ?2, ?3, ?4)",
            params![root.as_str(), identity, role.as_str(), now_ms],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == ErrorCode::ConstraintViolation =>
            {
                return Err(StoreError::MemberExists);
            }
            Err(err) => return Err(err.into()),
        }
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(identity),
            "member.added",
            "{}",
        )?;
        tx.commit()?;
        Ok(())
    }

    pub fn list_members(&self, root: &RootId) -> Result<Vec<MemberRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT identity, role, created_at_ms
            FROM members
            WHERE root = ?1
            ORDER BY created_at_ms ASC, identity ASC
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str()], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (identity, role, created_at_ms) = row?;
            out.push(MemberRow {
                identity,
                role: parse_role(&role)?,
                created_at_ms,
            });
        }
        Ok(out)
    }

    pub fn member_role(&self, root: &RootId, identity: &str) -> Result<Option<Role>, StoreError> {
        let role = self
            .conn()
            .query_row(
                "SELECT role FROM members WHERE root = ?1 AND identity = ?2",
                params![root.as_str(), identity],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        match role {
            Some(role) => Ok(Some(parse_role(&role)?)),
            None => Ok(None),
        }
    }
}
