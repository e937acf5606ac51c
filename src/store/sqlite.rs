//! SQLite-backed record and glossary store.
//!
//! Raw SQL with rusqlite, no ORM. The composite primary key and the
//! `(status, created_at)` index mirror the managed-store layout so queries
//! keep the same access paths.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::Mutex;

use crate::record::{GlossaryTerm, MeetingRecord, MeetingStage, MeetingStatus, RecordKey};

use super::{GlossaryStore, RecordPatch, RecordStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }
        let conn = Connection::open(path).context("Failed to open database connection")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS meetings (
            meeting_id TEXT NOT NULL,
            created_at TEXT NOT NULL,
            status TEXT NOT NULL,
            stage TEXT NOT NULL,
            title TEXT NOT NULL DEFAULT '',
            filename TEXT NOT NULL DEFAULT '',
            meeting_type TEXT NOT NULL DEFAULT 'general',
            s3_key TEXT NOT NULL DEFAULT '',
            transcribe_key TEXT NOT NULL DEFAULT '',
            whisper_key TEXT NOT NULL DEFAULT '',
            funasr_key TEXT NOT NULL DEFAULT '',
            report_key TEXT NOT NULL DEFAULT '',
            pdf_key TEXT NOT NULL DEFAULT '',
            recipient_emails TEXT NOT NULL DEFAULT '[]',
            error_message TEXT,
            updated_at TEXT NOT NULL,
            exported_at TEXT,
            PRIMARY KEY (meeting_id, created_at)
        )",
        [],
    )
    .context("Failed to create meetings table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_meetings_status_created_at
         ON meetings(status, created_at)",
        [],
    )
    .context("Failed to create meetings status index")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS glossary_terms (
            term_id TEXT PRIMARY KEY,
            term TEXT NOT NULL,
            aliases TEXT NOT NULL DEFAULT '[]',
            definition TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL
        )",
        [],
    )
    .context("Failed to create glossary_terms table")?;

    Ok(())
}

const MEETING_COLUMNS: &str = "meeting_id, created_at, status, stage, title, filename, \
     meeting_type, s3_key, transcribe_key, whisper_key, funasr_key, report_key, pdf_key, \
     recipient_emails, error_message, updated_at, exported_at";

fn row_to_record(row: &Row<'_>) -> rusqlite::Result<MeetingRecord> {
    let status: String = row.get(2)?;
    let stage: String = row.get(3)?;
    let meeting_type: String = row.get(6)?;
    let recipient_emails: String = row.get(13)?;

    Ok(MeetingRecord {
        meeting_id: row.get(0)?,
        created_at: row.get(1)?,
        status: MeetingStatus::parse(&status).unwrap_or(MeetingStatus::Failed),
        stage: MeetingStage::parse(&stage).unwrap_or(MeetingStage::Failed),
        title: row.get(4)?,
        filename: row.get(5)?,
        meeting_type: crate::record::MeetingType::parse(&meeting_type).unwrap_or_default(),
        s3_key: row.get(7)?,
        transcribe_key: row.get(8)?,
        whisper_key: row.get(9)?,
        funasr_key: row.get(10)?,
        report_key: row.get(11)?,
        pdf_key: row.get(12)?,
        recipient_emails: serde_json::from_str(&recipient_emails).unwrap_or_default(),
        error_message: row.get(14)?,
        updated_at: row.get(15)?,
        exported_at: row.get(16)?,
    })
}

fn write_record(conn: &Connection, record: &MeetingRecord) -> Result<()> {
    let recipient_emails = serde_json::to_string(&record.recipient_emails)?;
    conn.execute(
        "INSERT OR REPLACE INTO meetings (meeting_id, created_at, status, stage, title, \
         filename, meeting_type, s3_key, transcribe_key, whisper_key, funasr_key, report_key, \
         pdf_key, recipient_emails, error_message, updated_at, exported_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
        params![
            record.meeting_id,
            record.created_at,
            record.status.as_str(),
            record.stage.as_str(),
            record.title,
            record.filename,
            record.meeting_type.as_str(),
            record.s3_key,
            record.transcribe_key,
            record.whisper_key,
            record.funasr_key,
            record.report_key,
            record.pdf_key,
            recipient_emails,
            record.error_message,
            record.updated_at,
            record.exported_at,
        ],
    )
    .context("Failed to write meeting record")?;
    Ok(())
}

fn load_record(conn: &Connection, key: &RecordKey) -> Result<Option<MeetingRecord>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {MEETING_COLUMNS} FROM meetings WHERE meeting_id = ?1 AND created_at = ?2"
        ))
        .context("Failed to prepare meeting query")?;

    let mut rows = stmt
        .query_map(params![key.meeting_id, key.created_at], row_to_record)
        .context("Failed to query meeting")?;

    match rows.next() {
        Some(Ok(record)) => Ok(Some(record)),
        Some(Err(e)) => Err(e.into()),
        None => Ok(None),
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn get(&self, key: &RecordKey) -> Result<Option<MeetingRecord>> {
        let conn = self.conn.lock().unwrap();
        load_record(&conn, key)
    }

    async fn put(&self, record: &MeetingRecord) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        write_record(&conn, record)
    }

    async fn update(&self, key: &RecordKey, patch: RecordPatch) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let Some(mut record) = load_record(&conn, key)? else {
            bail!("record not found: {}/{}", key.meeting_id, key.created_at);
        };
        patch.apply(&mut record);
        write_record(&conn, &record)
    }

    async fn update_if_status(
        &self,
        key: &RecordKey,
        expected: MeetingStatus,
        patch: RecordPatch,
    ) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let Some(mut record) = load_record(&conn, key)? else {
            return Ok(false);
        };
        if record.status != expected {
            return Ok(false);
        }
        patch.apply(&mut record);
        // The status guard is re-checked in SQL so the write is conditional
        // even if another connection raced the read.
        let recipient_emails = serde_json::to_string(&record.recipient_emails)?;
        let changed = conn
            .execute(
                "UPDATE meetings SET status = ?1, stage = ?2, transcribe_key = ?3, \
                 whisper_key = ?4, funasr_key = ?5, report_key = ?6, pdf_key = ?7, \
                 recipient_emails = ?8, error_message = ?9, updated_at = ?10, exported_at = ?11 \
                 WHERE meeting_id = ?12 AND created_at = ?13 AND status = ?14",
                params![
                    record.status.as_str(),
                    record.stage.as_str(),
                    record.transcribe_key,
                    record.whisper_key,
                    record.funasr_key,
                    record.report_key,
                    record.pdf_key,
                    recipient_emails,
                    record.error_message,
                    record.updated_at,
                    record.exported_at,
                    key.meeting_id,
                    key.created_at,
                    expected.as_str(),
                ],
            )
            .context("Failed conditional meeting update")?;
        Ok(changed == 1)
    }

    async fn find_by_status(
        &self,
        status: MeetingStatus,
        s3_key: Option<&str>,
        limit: usize,
    ) -> Result<Vec<MeetingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut records = Vec::new();

        match s3_key {
            Some(s3_key) => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {MEETING_COLUMNS} FROM meetings \
                         WHERE status = ?1 AND s3_key = ?2 ORDER BY created_at LIMIT ?3"
                    ))
                    .context("Failed to prepare status query")?;
                let rows = stmt
                    .query_map(params![status.as_str(), s3_key, limit as i64], row_to_record)
                    .context("Failed to query meetings by status")?;
                for row in rows {
                    records.push(row?);
                }
            }
            None => {
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {MEETING_COLUMNS} FROM meetings \
                         WHERE status = ?1 ORDER BY created_at LIMIT ?2"
                    ))
                    .context("Failed to prepare status query")?;
                let rows = stmt
                    .query_map(params![status.as_str(), limit as i64], row_to_record)
                    .context("Failed to query meetings by status")?;
                for row in rows {
                    records.push(row?);
                }
            }
        }

        Ok(records)
    }

    async fn find_latest(&self, meeting_id: &str) -> Result<Option<MeetingRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {MEETING_COLUMNS} FROM meetings \
                 WHERE meeting_id = ?1 ORDER BY created_at DESC LIMIT 1"
            ))
            .context("Failed to prepare latest query")?;

        let mut rows = stmt
            .query_map(params![meeting_id], row_to_record)
            .context("Failed to query latest meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }
}

#[async_trait]
impl GlossaryStore for SqliteStore {
    async fn list_terms(&self) -> Result<Vec<GlossaryTerm>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT term_id, term, aliases, definition, created_at \
                 FROM glossary_terms ORDER BY term",
            )
            .context("Failed to prepare glossary query")?;

        let rows = stmt
            .query_map([], |row| {
                let aliases: String = row.get(2)?;
                Ok(GlossaryTerm {
                    term_id: row.get(0)?,
                    term: row.get(1)?,
                    aliases: serde_json::from_str(&aliases).unwrap_or_default(),
                    definition: row.get(3)?,
                    created_at: row.get(4)?,
                })
            })
            .context("Failed to query glossary terms")?;

        let mut terms = Vec::new();
        for row in rows {
            terms.push(row?);
        }
        Ok(terms)
    }
}

impl SqliteStore {
    /// Insert a glossary term; used by tests and seeding tools. The admin
    /// surface owning glossary CRUD is an external collaborator.
    pub fn insert_term(&self, term: &GlossaryTerm) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT OR REPLACE INTO glossary_terms (term_id, term, aliases, definition, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                term.term_id,
                term.term,
                serde_json::to_string(&term.aliases)?,
                term.definition,
                term.created_at,
            ],
        )
        .context("Failed to insert glossary term")?;
        Ok(())
    }
}
