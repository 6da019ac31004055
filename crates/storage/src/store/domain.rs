#![forbid(unsafe_code)]

use super::*;
use pl_core::ids::RootId;
use rusqlite::{OptionalExtension, params};

impl SqliteStore {
    pub fn shortlist_add(
        &mut self,
        root: &RootId,
        request: ShortlistAddRequest,
    ) -> Result<ShortlistRow, StoreError> {
        let ShortlistAddRequest {
            vendor_name,
            category,
            estimated_cost_cents,
            notes,
        } = request;
        if vendor_name.trim().is_empty() {
            return Err(StoreError::InvalidInput("vendor_name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let seq = next_counter_tx(&tx, root.as_str(), "shortlist_seq")?;
        let id = format!("SL-{seq:03}");
        tx.execute(
            r#"
            INSERT INTO shortlist(root, id, vendor_name, category, status, estimated_cost_cents, notes, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, 'shortlisted', ?5, ?6, ?7, ?7)
            "#,
            params![root.as_str(), id, vendor_name, category, estimated_cost_cents, notes, now_ms],
        )?;
        insert_event_tx(&tx, root.as_str(), now_ms, Some(&id), "vendor.shortlisted", "{}")?;
        tx.commit()?;

        Ok(ShortlistRow {
            id,
            vendor_name,
            category,
            status: "shortlisted".to_string(),
            estimated_cost_cents,
            notes,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn shortlist_list(
        &self,
        root: &RootId,
        limit: usize,
    ) -> Result<Vec<ShortlistRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, vendor_name, category, status, estimated_cost_cents, notes, created_at_ms, updated_at_ms
            FROM shortlist
            WHERE root = ?1
            ORDER BY updated_at_ms DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok(ShortlistRow {
                id: row.get(0)?,
                vendor_name: row.get(1)?,
                category: row.get(2)?,
                status: row.get(3)?,
                estimated_cost_cents: row.get(4)?,
                notes: row.get(5)?,
                created_at_ms: row.get(6)?,
                updated_at_ms: row.get(7)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn booking_create(
        &mut self,
        root: &RootId,
        request: BookingCreateRequest,
    ) -> Result<BookingRow, StoreError> {
        let BookingCreateRequest {
            shortlist_id,
            vendor_name,
            event_date_ms,
            total_amount_cents,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;
        let row = insert_booking_tx(
            &tx,
            root,
            shortlist_id,
            vendor_name,
            event_date_ms,
            total_amount_cents,
            now_ms,
        )?;
        tx.commit()?;
        Ok(row)
    }

    pub fn bookings_list(&self, root: &RootId, limit: usize) -> Result<Vec<BookingRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, shortlist_id, vendor_name, event_date_ms, status, total_amount_cents, paid_amount_cents, created_at_ms, updated_at_ms
            FROM bookings
            WHERE root = ?1
            ORDER BY created_at_ms DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok(BookingRow {
                id: row.get(0)?,
                shortlist_id: row.get(1)?,
                vendor_name: row.get(2)?,
                event_date_ms: row.get(3)?,
                status: row.get(4)?,
                total_amount_cents: row.get(5)?,
                paid_amount_cents: row.get(6)?,
                created_at_ms: row.get(7)?,
                updated_at_ms: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    /// Confirm a booking from a shortlisted option and advance its task in
    /// one transaction. Either both land or neither does; a revision
    /// mismatch on the task rolls the booking back too.
    pub fn book_and_advance_task(
        &mut self,
        root: &RootId,
        request: BookAndAdvanceRequest,
    ) -> Result<(BookingRow, i64), StoreError> {
        let BookAndAdvanceRequest {
            shortlist_id,
            event_date_ms,
            total_amount_cents,
            task_id,
            expected_task_revision,
            task_status,
            event_payload_json,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;

        let vendor_name: String = tx
            .query_row(
                "SELECT vendor_name FROM shortlist WHERE root = ?1 AND id = ?2",
                params![root.as_str(), &shortlist_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownId)?;

        let revision: i64 = tx
            .query_row(
                "SELECT revision FROM tasks WHERE root = ?1 AND id = ?2",
                params![root.as_str(), &task_id],
                |row| row.get(0),
            )
            .optional()?
            .ok_or(StoreError::UnknownId)?;
        check_revision(expected_task_revision, revision)?;

        let booking = insert_booking_tx(
            &tx,
            root,
            Some(shortlist_id.clone()),
            vendor_name,
            event_date_ms,
            total_amount_cents,
            now_ms,
        )?;
        tx.execute(
            "UPDATE shortlist SET status = 'booked', updated_at_ms = ?3 WHERE root = ?1 AND id = ?2",
            params![root.as_str(), &shortlist_id, now_ms],
        )?;

        let new_revision = revision + 1;
        tx.execute(
            "UPDATE tasks SET revision = ?3, status = ?4, updated_at_ms = ?5 WHERE root = ?1 AND id = ?2",
            params![
                root.as_str(),
                &task_id,
                new_revision,
                task_status.as_str(),
                now_ms
            ],
        )?;
        insert_event_tx(
            &tx,
            root.as_str(),
            now_ms,
            Some(&task_id),
            "vendor.booked",
            &event_payload_json,
        )?;
        tx.commit()?;
        Ok((booking, new_revision))
    }

    pub fn budget_upsert_item(
        &mut self,
        root: &RootId,
        request: BudgetUpsertRequest,
    ) -> Result<BudgetItemRow, StoreError> {
        let BudgetUpsertRequest {
            item_name,
            category,
            amount_cents,
            vendor_name,
            status,
            contribution_by,
        } = request;
        if item_name.trim().is_empty() {
            return Err(StoreError::InvalidInput("item_name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM budget_items WHERE root = ?1 AND item_name = ?2 AND category = ?3",
                params![root.as_str(), &item_name, &category],
                |row| row.get(0),
            )
            .optional()?;

        let id = match existing {
            Some(id) => {
                tx.execute(
                    r#"
                    UPDATE budget_items
                    SET amount_cents = ?3, vendor_name = ?4, status = ?5, contribution_by = ?6, updated_at_ms = ?7
                    WHERE root = ?1 AND id = ?2
                    "#,
                    params![
                        root.as_str(),
                        &id,
                        amount_cents,
                        vendor_name,
                        status,
                        contribution_by.as_str(),
                        now_ms
                    ],
                )?;
                id
            }
            None => {
                let seq = next_counter_tx(&tx, root.as_str(), "budget_seq")?;
                let id = format!("BUD-{seq:03}");
                tx.execute(
                    r#"
                    INSERT INTO budget_items(root, id, item_name, category, amount_cents, vendor_name, status, contribution_by, created_at_ms, updated_at_ms)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
                    "#,
                    params![
                        root.as_str(),
                        id,
                        item_name,
                        category,
                        amount_cents,
                        vendor_name,
                        status,
                        contribution_by.as_str(),
                        now_ms
                    ],
                )?;
                id
            }
        };
        insert_event_tx(&tx, root.as_str(), now_ms, Some(&id), "budget.upserted", "{}")?;
        tx.commit()?;

        Ok(BudgetItemRow {
            id,
            item_name,
            category,
            amount_cents,
            vendor_name,
            status,
            contribution_by,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn budget_list(
        &self,
        root: &RootId,
        limit: usize,
    ) -> Result<Vec<BudgetItemRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, item_name, category, amount_cents, vendor_name, status, contribution_by, created_at_ms, updated_at_ms
            FROM budget_items
            WHERE root = ?1
            ORDER BY updated_at_ms DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, String>(6)?,
                row.get::<_, i64>(7)?,
                row.get::<_, i64>(8)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, item_name, category, amount_cents, vendor_name, status, contribution_by, created, updated) =
                row?;
            out.push(BudgetItemRow {
                id,
                item_name,
                category,
                amount_cents,
                vendor_name,
                status,
                contribution_by: parse_party(&contribution_by)?,
                created_at_ms: created,
                updated_at_ms: updated,
            });
        }
        Ok(out)
    }

    pub fn budget_summary(&self, root: &RootId) -> Result<BudgetSummary, StoreError> {
        Ok(self.conn().query_row(
            "SELECT COUNT(*), COALESCE(SUM(amount_cents), 0) FROM budget_items WHERE root = ?1",
            params![root.as_str()],
            |row| {
                Ok(BudgetSummary {
                    item_count: row.get(0)?,
                    total_cents: row.get(1)?,
                })
            },
        )?)
    }

    pub fn guest_add(&mut self, root: &RootId, request: GuestAddRequest) -> Result<GuestRow, StoreError> {
        let GuestAddRequest {
            name,
            contact,
            side,
            dietary,
        } = request;
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("guest name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let seq = next_counter_tx(&tx, root.as_str(), "guest_seq")?;
        let id = format!("GST-{seq:03}");
        tx.execute(
            r#"
            INSERT INTO guests(root, id, name, contact, side, status, dietary, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, 'invited', ?6, ?7, ?7)
            "#,
            params![
                root.as_str(),
                id,
                name,
                contact,
                side.map(|p| p.as_str()),
                dietary,
                now_ms
            ],
        )?;
        insert_event_tx(&tx, root.as_str(), now_ms, Some(&id), "guest.added", "{}")?;
        tx.commit()?;

        Ok(GuestRow {
            id,
            name,
            contact,
            side,
            status: "invited".to_string(),
            dietary,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn guest_set_status(
        &mut self,
        root: &RootId,
        id: &str,
        status: &str,
    ) -> Result<(), StoreError> {
        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        let changed = tx.execute(
            "UPDATE guests SET status = ?3, updated_at_ms = ?4 WHERE root = ?1 AND id = ?2",
            params![root.as_str(), id, status, now_ms],
        )?;
        if changed == 0 {
            return Err(StoreError::UnknownId);
        }
        insert_event_tx(&tx, root.as_str(), now_ms, Some(id), "guest.status", "{}")?;
        tx.commit()?;
        Ok(())
    }

    pub fn guest_list(&self, root: &RootId, limit: usize) -> Result<Vec<GuestRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, name, contact, side, status, dietary, created_at_ms, updated_at_ms
            FROM guests
            WHERE root = ?1
            ORDER BY created_at_ms ASC, id ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, name, contact, side, status, dietary, created, updated) = row?;
            let side = match side {
                Some(raw) => Some(parse_party(&raw)?),
                None => None,
            };
            out.push(GuestRow {
                id,
                name,
                contact,
                side,
                status,
                dietary,
                created_at_ms: created,
                updated_at_ms: updated,
            });
        }
        Ok(out)
    }

    pub fn timeline_add_event(
        &mut self,
        root: &RootId,
        request: TimelineAddRequest,
    ) -> Result<TimelineEventRow, StoreError> {
        let TimelineAddRequest {
            name,
            at_ms,
            location,
            description,
            relevant_party,
        } = request;
        if name.trim().is_empty() {
            return Err(StoreError::InvalidInput("event name must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let seq = next_counter_tx(&tx, root.as_str(), "timeline_seq")?;
        let id = format!("TL-{seq:03}");
        tx.execute(
            r#"
            INSERT INTO timeline_events(root, id, name, at_ms, location, description, relevant_party, created_at_ms, updated_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
            "#,
            params![
                root.as_str(),
                id,
                name,
                at_ms,
                location,
                description,
                relevant_party.map(|p| p.as_str()),
                now_ms
            ],
        )?;
        insert_event_tx(&tx, root.as_str(), now_ms, Some(&id), "timeline.added", "{}")?;
        tx.commit()?;

        Ok(TimelineEventRow {
            id,
            name,
            at_ms,
            location,
            description,
            relevant_party,
            created_at_ms: now_ms,
            updated_at_ms: now_ms,
        })
    }

    pub fn timeline_list(
        &self,
        root: &RootId,
        limit: usize,
    ) -> Result<Vec<TimelineEventRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, name, at_ms, location, description, relevant_party, created_at_ms, updated_at_ms
            FROM timeline_events
            WHERE root = ?1
            ORDER BY at_ms ASC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, Option<String>>(4)?,
                row.get::<_, Option<String>>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?;
        let mut out = Vec::new();
        for row in rows {
            let (id, name, at_ms, location, description, relevant_party, created, updated) = row?;
            let relevant_party = match relevant_party {
                Some(raw) => Some(parse_party(&raw)?),
                None => None,
            };
            out.push(TimelineEventRow {
                id,
                name,
                at_ms,
                location,
                description,
                relevant_party,
                created_at_ms: created,
                updated_at_ms: updated,
            });
        }
        Ok(out)
    }

    pub fn board_add_item(
        &mut self,
        root: &RootId,
        request: BoardAddRequest,
    ) -> Result<BoardItemRow, StoreError> {
        let BoardAddRequest {
            note,
            category,
            image_ref,
        } = request;

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let seq = next_counter_tx(&tx, root.as_str(), "board_seq")?;
        let id = format!("ART-{seq:03}");
        tx.execute(
            r#"
            INSERT INTO board_items(root, id, note, category, image_ref, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![root.as_str(), id, note, category, image_ref, now_ms],
        )?;
        insert_event_tx(&tx, root.as_str(), now_ms, Some(&id), "board.added", "{}")?;
        tx.commit()?;

        Ok(BoardItemRow {
            id,
            note,
            category,
            image_ref,
            created_at_ms: now_ms,
        })
    }

    pub fn board_list(&self, root: &RootId, limit: usize) -> Result<Vec<BoardItemRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, note, category, image_ref, created_at_ms
            FROM board_items
            WHERE root = ?1
            ORDER BY created_at_ms DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok(BoardItemRow {
                id: row.get(0)?,
                note: row.get(1)?,
                category: row.get(2)?,
                image_ref: row.get(3)?,
                created_at_ms: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn ritual_note_add(
        &mut self,
        root: &RootId,
        request: RitualNoteAddRequest,
    ) -> Result<RitualNoteRow, StoreError> {
        let RitualNoteAddRequest {
            tradition,
            topic,
            content,
        } = request;
        if content.trim().is_empty() {
            return Err(StoreError::InvalidInput("note content must not be empty"));
        }

        let now_ms = now_ms();
        let tx = self.conn_mut().transaction()?;
        require_root_tx(&tx, root)?;

        let seq = next_counter_tx(&tx, root.as_str(), "ritual_seq")?;
        let id = format!("RIT-{seq:03}");
        tx.execute(
            r#"
            INSERT INTO ritual_notes(root, id, tradition, topic, content, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![root.as_str(), id, tradition, topic, content, now_ms],
        )?;
        insert_event_tx(&tx, root.as_str(), now_ms, Some(&id), "ritual.noted", "{}")?;
        tx.commit()?;

        Ok(RitualNoteRow {
            id,
            tradition,
            topic,
            content,
            created_at_ms: now_ms,
        })
    }

    pub fn ritual_notes_list(
        &self,
        root: &RootId,
        limit: usize,
    ) -> Result<Vec<RitualNoteRow>, StoreError> {
        let mut stmt = self.conn().prepare(
            r#"
            SELECT id, tradition, topic, content, created_at_ms
            FROM ritual_notes
            WHERE root = ?1
            ORDER BY created_at_ms DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![root.as_str(), limit as i64], |row| {
            Ok(RitualNoteRow {
                id: row.get(0)?,
                tradition: row.get(1)?,
                topic: row.get(2)?,
                content: row.get(3)?,
                created_at_ms: row.get(4)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn insert_booking_tx(
    tx: &rusqlite::Transaction<'_>,
    root: &RootId,
    shortlist_id: Option<String>,
    vendor_name: String,
    event_date_ms: i64,
    total_amount_cents: Option<i64>,
    now_ms: i64,
) -> Result<BookingRow, StoreError> {
    let seq = next_counter_tx(tx, root.as_str(), "booking_seq")?;
    let id = format!("BK-{seq:03}");
    tx.execute(
        r#"
        INSERT INTO bookings(root, id, shortlist_id, vendor_name, event_date_ms, status, total_amount_cents, paid_amount_cents, created_at_ms, updated_at_ms)
        VALUES (?1, ?2, ?3, ?4, ?5, 'pending_confirmation', ?6, 0, ?7, ?7)
        "#,
        params![
            root.as_str(),
            id,
            shortlist_id,
            vendor_name,
            event_date_ms,
            total_amount_cents,
            now_ms
        ],
    )?;
    Ok(BookingRow {
        id,
        shortlist_id,
        vendor_name,
        event_date_ms,
        status: "pending_confirmation".to_string(),
        total_amount_cents,
        paid_amount_cents: 0,
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    })
}
