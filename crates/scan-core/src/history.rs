//! Scan/generate history backed by SQLite
//!
//! The content string is the natural key: recording the same content twice
//! keeps the first record.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

use crate::content::ContentType;

const SCHEMA_VERSION: i64 = 1;

const RECORD_COLUMNS: &str =
    "id, content, content_type, timestamp_ms, is_generated, barcode_format, is_favorite, notes, tags";

const CSV_HEADER: &str = "id,content,type,timestamp,isGenerated,barcodeFormat,isFavorite,notes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub id: i64,
    pub content: String,
    #[serde(rename = "type")]
    pub content_type: ContentType,
    #[serde(rename = "timestamp")]
    pub timestamp_ms: i64,
    #[serde(default)]
    pub is_generated: bool,
    #[serde(default = "default_format")]
    pub barcode_format: String,
    #[serde(default)]
    pub is_favorite: bool,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_format() -> String {
    "QR_CODE".to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    Existing(i64),
}

impl InsertOutcome {
    pub fn id(&self) -> i64 {
        match self {
            InsertOutcome::Inserted(id) | InsertOutcome::Existing(id) => *id,
        }
    }
}

pub struct HistoryStore {
    conn: Mutex<Connection>,
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    if version >= SCHEMA_VERSION {
        return Ok(());
    }

    let tx = conn.transaction()?;
    tx.execute_batch(
        "CREATE TABLE IF NOT EXISTS history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content TEXT NOT NULL UNIQUE,
            content_type TEXT NOT NULL,
            timestamp_ms INTEGER NOT NULL,
            is_generated INTEGER NOT NULL DEFAULT 0,
            barcode_format TEXT NOT NULL DEFAULT 'QR_CODE',
            is_favorite INTEGER NOT NULL DEFAULT 0,
            notes TEXT NOT NULL DEFAULT '',
            tags TEXT NOT NULL DEFAULT '[]'
        );
        CREATE INDEX IF NOT EXISTS idx_history_timestamp ON history(timestamp_ms DESC);",
    )?;
    tx.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    tx.commit()?;

    log::info!("History schema migrated to version {}", SCHEMA_VERSION);
    Ok(())
}

fn row_to_record(row: &Row) -> Result<HistoryRecord> {
    let content_type: String = row.get("content_type")?;
    let tags: String = row.get("tags")?;

    Ok(HistoryRecord {
        id: row.get("id")?,
        content: row.get("content")?,
        content_type: content_type
            .parse()
            .map_err(|e: String| anyhow!("invalid history row: {e}"))?,
        timestamp_ms: row.get("timestamp_ms")?,
        is_generated: row.get("is_generated")?,
        barcode_format: row.get("barcode_format")?,
        is_favorite: row.get("is_favorite")?,
        notes: row.get("notes")?,
        tags: serde_json::from_str(&tags).context("invalid tags column")?,
    })
}

fn collect_records(
    conn: &Connection,
    sql: &str,
    args: impl rusqlite::Params,
) -> Result<Vec<HistoryRecord>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(args)?;
    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        records.push(row_to_record(row)?);
    }
    Ok(records)
}

impl HistoryStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create history directory {}", parent.display())
            })?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("failed to open history database {}", path.display()))?;
        if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
            log::warn!("Failed to enable WAL mode: {err}");
        }
        log::info!("History database opened at {}", path.display());
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        run_migrations(&mut conn).context("failed to run history migrations")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        match self.conn.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Record content unless an identical content string is already stored
    pub fn insert_if_absent(
        &self,
        content: &str,
        content_type: ContentType,
        is_generated: bool,
        barcode_format: &str,
    ) -> Result<InsertOutcome> {
        let conn = self.lock();
        let now = Utc::now().timestamp_millis();
        let inserted = conn.execute(
            "INSERT INTO history (content, content_type, timestamp_ms, is_generated, barcode_format)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(content) DO NOTHING",
            params![content, content_type.as_str(), now, is_generated, barcode_format],
        )?;

        if inserted > 0 {
            let id = conn.last_insert_rowid();
            log::debug!("History: inserted #{} ({})", id, content_type);
            return Ok(InsertOutcome::Inserted(id));
        }

        let id: i64 = conn.query_row(
            "SELECT id FROM history WHERE content = ?1",
            params![content],
            |row| row.get(0),
        )?;
        Ok(InsertOutcome::Existing(id))
    }

    /// Newest first
    pub fn query_all(&self) -> Result<Vec<HistoryRecord>> {
        let conn = self.lock();
        collect_records(
            &conn,
            &format!("SELECT {RECORD_COLUMNS} FROM history ORDER BY timestamp_ms DESC, id DESC"),
            [],
        )
    }

    pub fn get(&self, id: i64) -> Result<Option<HistoryRecord>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!("SELECT {RECORD_COLUMNS} FROM history WHERE id = ?1"))?;
        let mut rows = stmt.query(params![id])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_record(row)?)),
            None => Ok(None),
        }
    }

    pub fn find_by_content(&self, content: &str) -> Result<Option<HistoryRecord>> {
        let conn = self.lock();
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM history WHERE content = ?1",
                params![content],
                |row| row.get(0),
            )
            .optional()?;
        drop(conn);
        match id {
            Some(id) => self.get(id),
            None => Ok(None),
        }
    }

    /// Case-insensitive substring match on content, notes and tags
    pub fn search(&self, query: &str) -> Result<Vec<HistoryRecord>> {
        let conn = self.lock();
        collect_records(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM history
                 WHERE instr(lower(content), lower(?1)) > 0
                    OR instr(lower(notes), lower(?1)) > 0
                    OR instr(lower(tags), lower(?1)) > 0
                 ORDER BY timestamp_ms DESC, id DESC"
            ),
            params![query],
        )
    }

    pub fn favorites(&self) -> Result<Vec<HistoryRecord>> {
        let conn = self.lock();
        collect_records(
            &conn,
            &format!(
                "SELECT {RECORD_COLUMNS} FROM history WHERE is_favorite = 1
                 ORDER BY timestamp_ms DESC, id DESC"
            ),
            [],
        )
    }

    pub fn set_favorite(&self, id: i64, favorite: bool) -> Result<()> {
        self.update_one("UPDATE history SET is_favorite = ?2 WHERE id = ?1", id, favorite)
    }

    pub fn set_notes(&self, id: i64, notes: &str) -> Result<()> {
        self.update_one("UPDATE history SET notes = ?2 WHERE id = ?1", id, notes)
    }

    pub fn set_tags(&self, id: i64, tags: &[String]) -> Result<()> {
        let encoded = serde_json::to_string(tags)?;
        self.update_one("UPDATE history SET tags = ?2 WHERE id = ?1", id, encoded)
    }

    fn update_one(&self, sql: &str, id: i64, value: impl rusqlite::ToSql) -> Result<()> {
        let conn = self.lock();
        let changed = conn.execute(sql, params![id, value])?;
        if changed == 0 {
            return Err(anyhow!("history record {id} not found"));
        }
        Ok(())
    }

    /// Returns whether a record was removed
    pub fn delete(&self, id: i64) -> Result<bool> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM history WHERE id = ?1", params![id])? > 0)
    }

    /// Remove everything, returning the number of deleted records
    pub fn clear(&self) -> Result<usize> {
        let conn = self.lock();
        Ok(conn.execute("DELETE FROM history", [])?)
    }

    pub fn export_json(&self) -> Result<String> {
        let records = self.query_all()?;
        serde_json::to_string_pretty(&records).context("failed to serialize history")
    }

    pub fn export_csv(&self) -> Result<String> {
        let records = self.query_all()?;
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for record in &records {
            let fields = [
                record.id.to_string(),
                csv_field(&record.content),
                record.content_type.to_string(),
                record.timestamp_ms.to_string(),
                record.is_generated.to_string(),
                csv_field(&record.barcode_format),
                record.is_favorite.to_string(),
                csv_field(&record.notes),
            ];
            out.push_str(&fields.join(","));
            out.push('\n');
        }
        Ok(out)
    }

    /// Restore a JSON export. Existing content is kept, ids are reassigned.
    /// Returns the number of records added.
    pub fn import_json(&self, json: &str) -> Result<usize> {
        let records: Vec<HistoryRecord> =
            serde_json::from_str(json).context("backup is not a valid history export")?;

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        let mut added = 0;
        for record in &records {
            added += tx.execute(
                "INSERT INTO history
                    (content, content_type, timestamp_ms, is_generated, barcode_format, is_favorite, notes, tags)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(content) DO NOTHING",
                params![
                    record.content,
                    record.content_type.as_str(),
                    record.timestamp_ms,
                    record.is_generated,
                    record.barcode_format,
                    record.is_favorite,
                    record.notes,
                    serde_json::to_string(&record.tags)?,
                ],
            )?;
        }
        tx.commit()?;

        log::info!("History import: {} of {} records added", added, records.len());
        Ok(added)
    }
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
