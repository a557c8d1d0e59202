pub mod phone;
pub mod tabular;

use crate::errors::{BulletinError, BulletinResult};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::MutexGuard;
use tracing::{debug, info, warn};

pub use phone::{normalize_phone, validate_email};
pub use tabular::{format_contact_rows, parse_contact_rows};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub id: String,
    pub name: String,
    /// E.164-normalized.
    pub phone_number: String,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub added_by: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewContact {
    pub name: String,
    pub phone_number: String,
    pub email: Option<String>,
    pub notes: Option<String>,
}

impl NewContact {
    pub fn new(name: impl Into<String>, phone_number: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phone_number: phone_number.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Partial edit of a contact. `None` leaves a field unchanged; an empty
/// email or notes string clears it.
#[derive(Debug, Clone, Default)]
pub struct ContactUpdate {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub member_contact_ids: BTreeSet<String>,
    /// Identifier of the matching group chat on the messaging transport.
    pub external_group_ref: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of a bulk import: `(name, phone, email?)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportRow {
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl ImportRow {
    pub fn new(name: &str, phone: &str, email: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            phone: phone.to_string(),
            email: email.map(str::to_string),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportFailure {
    /// 1-based position in the submitted rows.
    pub row: usize,
    pub name: String,
    pub phone: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub imported: Vec<Contact>,
    pub failed: Vec<ImportFailure>,
}

/// Contacts and groups picked by the operator for the next send.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    pub contact_ids: BTreeSet<String>,
    pub group_ids: BTreeSet<String>,
}

/// Contacts, groups and group membership, persisted in SQLite.
pub struct AddressBook {
    conn: std::sync::Mutex<Connection>,
    added_by: String,
    selection: std::sync::Mutex<Selection>,
}

const CONTACT_COLUMNS: &str = "id, name, phone_number, email, notes, added_by, created_at";

impl AddressBook {
    pub fn open(db_path: impl AsRef<Path>, added_by: &str) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!(
                    "Failed to create address book directory: {}",
                    parent.display()
                )
            })?;
        }
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open address book at: {}", db_path.display()))?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=3000;",
        )?;
        Self::with_connection(conn, added_by)
    }

    pub fn in_memory(added_by: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, added_by)
    }

    fn with_connection(conn: Connection, added_by: &str) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let book = Self {
            conn: std::sync::Mutex::new(conn),
            added_by: added_by.to_string(),
            selection: std::sync::Mutex::new(Selection::default()),
        };
        book.ensure_schema()
            .context("Failed to initialize address book schema")?;
        Ok(book)
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS contacts (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                name_key TEXT NOT NULL UNIQUE,
                phone_number TEXT NOT NULL UNIQUE,
                email TEXT,
                notes TEXT,
                added_by TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                external_group_ref TEXT,
                created_at TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS group_members (
                group_id TEXT NOT NULL REFERENCES groups(id) ON DELETE CASCADE,
                contact_id TEXT NOT NULL REFERENCES contacts(id) ON DELETE CASCADE,
                PRIMARY KEY (group_id, contact_id)
            );
            CREATE INDEX IF NOT EXISTS idx_group_members_contact ON group_members(contact_id);",
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| anyhow::anyhow!("address book lock poisoned: {}", e))
    }

    fn selection_guard(&self) -> MutexGuard<'_, Selection> {
        self.selection
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Contacts
    // -----------------------------------------------------------------------

    pub fn add_contact(&self, new: NewContact) -> BulletinResult<Contact> {
        let name = validate_name(&new.name, "contact")?;
        let phone_number = normalize_phone(&new.phone_number)?;
        let email = optional_email(new.email.as_deref())?;
        let notes = optional_text(new.notes.as_deref());

        let conn = self.conn()?;
        ensure_unique(&conn, &name, &phone_number, None)?;

        let contact = Contact {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            phone_number,
            email,
            notes,
            added_by: self.added_by.clone(),
            created_at: Utc::now(),
        };
        conn.execute(
            "INSERT INTO contacts (id, name, name_key, phone_number, email, notes, added_by, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                contact.id,
                contact.name,
                name_key(&contact.name),
                contact.phone_number,
                contact.email,
                contact.notes,
                contact.added_by,
                contact.created_at.to_rfc3339(),
            ],
        )
        .context("Failed to insert contact")?;

        debug!(
            "added contact {} ({})",
            contact.id, contact.phone_number
        );
        Ok(contact)
    }

    pub fn update_contact(&self, id: &str, update: ContactUpdate) -> BulletinResult<Contact> {
        let conn = self.conn()?;
        let mut contact = load_contact(&conn, id)?;

        if let Some(name) = update.name {
            contact.name = validate_name(&name, "contact")?;
        }
        if let Some(phone) = update.phone_number {
            contact.phone_number = normalize_phone(&phone)?;
        }
        if let Some(email) = update.email {
            contact.email = optional_email(Some(&email))?;
        }
        if let Some(notes) = update.notes {
            contact.notes = optional_text(Some(&notes));
        }

        ensure_unique(&conn, &contact.name, &contact.phone_number, Some(id))?;
        conn.execute(
            "UPDATE contacts SET name = ?2, name_key = ?3, phone_number = ?4, email = ?5, notes = ?6
             WHERE id = ?1",
            params![
                id,
                contact.name,
                name_key(&contact.name),
                contact.phone_number,
                contact.email,
                contact.notes,
            ],
        )
        .context("Failed to update contact")?;
        Ok(contact)
    }

    pub fn get_contact(&self, id: &str) -> BulletinResult<Contact> {
        let conn = self.conn()?;
        load_contact(&conn, id)
    }

    /// All contacts ordered by name.
    pub fn list_contacts(&self) -> BulletinResult<Vec<Contact>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM contacts ORDER BY name_key",
                CONTACT_COLUMNS
            ))
            .context("Failed to prepare contact listing")?;
        let contacts = stmt
            .query_map([], contact_from_row)
            .and_then(Iterator::collect)
            .context("Failed to list contacts")?;
        Ok(contacts)
    }

    /// Case-insensitive substring match over name, phone and email.
    pub fn search_contacts(&self, query: &str) -> BulletinResult<Vec<Contact>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_contacts();
        }
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM contacts
                 WHERE name_key LIKE ?1 ESCAPE '\\'
                    OR phone_number LIKE ?1 ESCAPE '\\'
                    OR lower(coalesce(email, '')) LIKE ?1 ESCAPE '\\'
                 ORDER BY name_key",
                CONTACT_COLUMNS
            ))
            .context("Failed to prepare contact search")?;
        let contacts = stmt
            .query_map(params![pattern], contact_from_row)
            .and_then(Iterator::collect)
            .context("Failed to search contacts")?;
        Ok(contacts)
    }

    /// Delete a contact; it drops out of every group and the pending selection.
    pub fn delete_contact(&self, id: &str) -> BulletinResult<()> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM contacts WHERE id = ?1", params![id])
            .context("Failed to delete contact")?;
        drop(conn);
        if removed == 0 {
            return Err(BulletinError::not_found("contact", id));
        }
        self.selection_guard().contact_ids.remove(id);
        debug!("deleted contact {}", id);
        Ok(())
    }

    /// Import rows one by one. A bad row is reported and skipped; it never
    /// aborts the rest of the import.
    pub fn import_contacts(&self, rows: &[ImportRow]) -> ImportReport {
        let mut report = ImportReport::default();
        for (idx, row) in rows.iter().enumerate() {
            let mut new = NewContact::new(row.name.clone(), row.phone.clone());
            new.email = row.email.clone();
            match self.add_contact(new) {
                Ok(contact) => report.imported.push(contact),
                Err(e) => {
                    let reason = match e {
                        BulletinError::Validation(msg) => msg,
                        other => other.to_string(),
                    };
                    report.failed.push(ImportFailure {
                        row: idx + 1,
                        name: row.name.clone(),
                        phone: row.phone.clone(),
                        reason,
                    });
                }
            }
        }
        if report.failed.is_empty() {
            info!("imported {} contacts", report.imported.len());
        } else {
            warn!(
                "imported {} contacts, {} rows rejected",
                report.imported.len(),
                report.failed.len()
            );
        }
        report
    }

    /// Tabular export: header then `name,phone,email` per contact, ordered by name.
    pub fn export_contacts(&self) -> BulletinResult<String> {
        Ok(format_contact_rows(&self.list_contacts()?))
    }

    // -----------------------------------------------------------------------
    // Groups
    // -----------------------------------------------------------------------

    pub fn create_group(
        &self,
        name: &str,
        member_contact_ids: &[String],
        external_group_ref: Option<&str>,
    ) -> BulletinResult<Group> {
        let name = validate_name(name, "group")?;
        if member_contact_ids.is_empty() {
            return Err(BulletinError::validation("a group needs at least one member"));
        }
        let members: BTreeSet<String> = member_contact_ids.iter().cloned().collect();

        let mut conn = self.conn()?;
        for id in &members {
            if !contact_exists(&conn, id)? {
                return Err(BulletinError::not_found("contact", id.clone()));
            }
        }

        let group = Group {
            id: uuid::Uuid::new_v4().to_string(),
            name,
            member_contact_ids: members,
            external_group_ref: optional_text(external_group_ref),
            created_at: Utc::now(),
        };

        let tx = conn.transaction().context("Failed to begin transaction")?;
        tx.execute(
            "INSERT INTO groups (id, name, external_group_ref, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                group.id,
                group.name,
                group.external_group_ref,
                group.created_at.to_rfc3339()
            ],
        )
        .context("Failed to insert group")?;
        for contact_id in &group.member_contact_ids {
            tx.execute(
                "INSERT INTO group_members (group_id, contact_id) VALUES (?1, ?2)",
                params![group.id, contact_id],
            )
            .context("Failed to insert group member")?;
        }
        tx.commit().context("Failed to commit group")?;

        info!(
            "created group {} '{}' with {} members",
            group.id,
            group.name,
            group.member_contact_ids.len()
        );
        Ok(group)
    }

    pub fn get_group(&self, id: &str) -> BulletinResult<Group> {
        let conn = self.conn()?;
        load_group(&conn, id)
    }

    pub fn list_groups(&self) -> BulletinResult<Vec<Group>> {
        let conn = self.conn()?;
        let ids: Vec<String> = {
            let mut stmt = conn
                .prepare("SELECT id FROM groups ORDER BY lower(name), id")
                .context("Failed to prepare group listing")?;
            stmt.query_map([], |row| row.get(0))
                .and_then(Iterator::collect)
                .context("Failed to list groups")?
        };
        ids.iter().map(|id| load_group(&conn, id)).collect()
    }

    pub fn delete_group(&self, id: &str) -> BulletinResult<()> {
        let conn = self.conn()?;
        let removed = conn
            .execute("DELETE FROM groups WHERE id = ?1", params![id])
            .context("Failed to delete group")?;
        drop(conn);
        if removed == 0 {
            return Err(BulletinError::not_found("group", id));
        }
        self.selection_guard().group_ids.remove(id);
        Ok(())
    }

    pub fn add_group_member(&self, group_id: &str, contact_id: &str) -> BulletinResult<()> {
        let conn = self.conn()?;
        if !group_exists(&conn, group_id)? {
            return Err(BulletinError::not_found("group", group_id));
        }
        if !contact_exists(&conn, contact_id)? {
            return Err(BulletinError::not_found("contact", contact_id));
        }
        conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, contact_id) VALUES (?1, ?2)",
            params![group_id, contact_id],
        )
        .context("Failed to add group member")?;
        Ok(())
    }

    pub fn remove_group_member(&self, group_id: &str, contact_id: &str) -> BulletinResult<()> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM group_members WHERE group_id = ?1 AND contact_id = ?2",
                params![group_id, contact_id],
            )
            .context("Failed to remove group member")?;
        if removed == 0 {
            return Err(BulletinError::not_found(
                "group member",
                format!("{}/{}", group_id, contact_id),
            ));
        }
        Ok(())
    }

    /// Phone numbers of the group's current members, read fresh on every call.
    pub fn resolve_group_recipients(&self, id: &str) -> BulletinResult<BTreeSet<String>> {
        let conn = self.conn()?;
        group_recipients(&conn, id)
    }

    /// De-duplicated union of the contacts' numbers and every group's members.
    pub fn resolve_recipients(
        &self,
        contact_ids: &[String],
        group_ids: &[String],
    ) -> BulletinResult<BTreeSet<String>> {
        let conn = self.conn()?;
        let mut recipients = BTreeSet::new();
        for id in contact_ids {
            recipients.insert(load_contact(&conn, id)?.phone_number);
        }
        for id in group_ids {
            recipients.extend(group_recipients(&conn, id)?);
        }
        Ok(recipients)
    }

    // -----------------------------------------------------------------------
    // Pending selection
    // -----------------------------------------------------------------------

    pub fn select_contact(&self, id: &str) -> BulletinResult<()> {
        self.get_contact(id)?;
        self.selection_guard().contact_ids.insert(id.to_string());
        Ok(())
    }

    pub fn select_group(&self, id: &str) -> BulletinResult<()> {
        self.get_group(id)?;
        self.selection_guard().group_ids.insert(id.to_string());
        Ok(())
    }

    pub fn deselect(&self, id: &str) {
        let mut selection = self.selection_guard();
        selection.contact_ids.remove(id);
        selection.group_ids.remove(id);
    }

    pub fn selection(&self) -> Selection {
        self.selection_guard().clone()
    }

    pub fn clear_selection(&self) {
        *self.selection_guard() = Selection::default();
    }
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn validate_name(raw: &str, kind: &str) -> BulletinResult<String> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(BulletinError::validation(format!("{} name is empty", kind)));
    }
    Ok(name.to_string())
}

fn optional_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn optional_email(raw: Option<&str>) -> BulletinResult<Option<String>> {
    match optional_text(raw) {
        Some(email) => Ok(Some(validate_email(&email)?)),
        None => Ok(None),
    }
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn ensure_unique(
    conn: &Connection,
    name: &str,
    phone_number: &str,
    exclude_id: Option<&str>,
) -> BulletinResult<()> {
    let exclude = exclude_id.unwrap_or("");
    let phone_taken: Option<String> = conn
        .query_row(
            "SELECT name FROM contacts WHERE phone_number = ?1 AND id != ?2",
            params![phone_number, exclude],
            |row| row.get(0),
        )
        .optional()
        .context("Failed to check phone uniqueness")?;
    if let Some(existing) = phone_taken {
        return Err(BulletinError::validation(format!(
            "duplicate phone number {} (already used by {})",
            phone_number, existing
        )));
    }

    let name_taken: bool = conn
        .query_row(
            "SELECT EXISTS(SELECT 1 FROM contacts WHERE name_key = ?1 AND id != ?2)",
            params![name_key(name), exclude],
            |row| row.get(0),
        )
        .context("Failed to check name uniqueness")?;
    if name_taken {
        return Err(BulletinError::validation(format!(
            "duplicate contact name: {}",
            name
        )));
    }
    Ok(())
}

fn contact_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Contact> {
    let created_at: String = row.get(6)?;
    Ok(Contact {
        id: row.get(0)?,
        name: row.get(1)?,
        phone_number: row.get(2)?,
        email: row.get(3)?,
        notes: row.get(4)?,
        added_by: row.get(5)?,
        created_at: parse_timestamp(&created_at),
    })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_default()
}

fn load_contact(conn: &Connection, id: &str) -> BulletinResult<Contact> {
    conn.query_row(
        &format!("SELECT {} FROM contacts WHERE id = ?1", CONTACT_COLUMNS),
        params![id],
        contact_from_row,
    )
    .optional()
    .context("Failed to load contact")?
    .ok_or_else(|| BulletinError::not_found("contact", id))
}

fn contact_exists(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM contacts WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?)
}

fn group_exists(conn: &Connection, id: &str) -> Result<bool> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1)",
        params![id],
        |row| row.get(0),
    )?)
}

fn load_group(conn: &Connection, id: &str) -> BulletinResult<Group> {
    let header: Option<(String, Option<String>, String)> = conn
        .query_row(
            "SELECT name, external_group_ref, created_at FROM groups WHERE id = ?1",
            params![id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .context("Failed to load group")?;
    let Some((name, external_group_ref, created_at)) = header else {
        return Err(BulletinError::not_found("group", id));
    };

    let mut stmt = conn
        .prepare("SELECT contact_id FROM group_members WHERE group_id = ?1")
        .context("Failed to prepare member query")?;
    let member_contact_ids = stmt
        .query_map(params![id], |row| row.get(0))
        .and_then(Iterator::collect)
        .context("Failed to load group members")?;

    Ok(Group {
        id: id.to_string(),
        name,
        member_contact_ids,
        external_group_ref,
        created_at: parse_timestamp(&created_at),
    })
}

fn group_recipients(conn: &Connection, id: &str) -> BulletinResult<BTreeSet<String>> {
    if !group_exists(conn, id)? {
        return Err(BulletinError::not_found("group", id));
    }
    let mut stmt = conn
        .prepare(
            "SELECT c.phone_number FROM group_members gm
             JOIN contacts c ON c.id = gm.contact_id
             WHERE gm.group_id = ?1",
        )
        .context("Failed to prepare recipient query")?;
    let recipients = stmt
        .query_map(params![id], |row| row.get(0))
        .and_then(Iterator::collect)
        .context("Failed to resolve group recipients")?;
    Ok(recipients)
}
