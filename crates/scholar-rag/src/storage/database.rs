//! SQLite persistence for documents, embedded passages and answer history
//!
//! All access goes through a single connection behind a mutex. Callers on the
//! async side wrap these methods in `tokio::task::spawn_blocking`.

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{content_hash, AnswerRecord, Document, Owner, Passage, PassageId};

/// Row counts for the info endpoint
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct StoreStats {
    pub documents: usize,
    pub passages: usize,
    pub answer_records: usize,
}

/// SQLite-backed store for documents, passages and answer records
#[derive(Clone)]
pub struct PassageStore {
    conn: Arc<Mutex<Connection>>,
}

impl PassageStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())
            .map_err(|e| Error::Storage(format!("Failed to open database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Storage(format!("Failed to open in-memory database: {}", e)))?;

        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
            PRAGMA foreign_keys=ON;
            PRAGMA temp_store=MEMORY;
        "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                doi TEXT,
                title TEXT,
                publication_year INTEGER,
                source TEXT,
                authors TEXT NOT NULL DEFAULT '[]',
                fulltext TEXT,
                content_hash TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_documents_doi ON documents(doi);

            -- One row per chunk; (document_id, chunk_index) is the citation id
            CREATE TABLE IF NOT EXISTS passages (
                document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
                chunk_index INTEGER NOT NULL,
                content TEXT NOT NULL,
                embedding BLOB NOT NULL,
                dimensions INTEGER NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (document_id, chunk_index)
            );

            CREATE TABLE IF NOT EXISTS answer_records (
                id TEXT PRIMARY KEY,
                user_id INTEGER,
                query TEXT NOT NULL,
                answer TEXT NOT NULL,
                chunk_ids TEXT NOT NULL,
                source_documents TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_answer_records_user
                ON answer_records(user_id, created_at);
        "#,
        )
        .map_err(|e| Error::Storage(format!("Failed to create tables: {}", e)))?;

        Ok(())
    }

    // ==================== Documents ====================

    /// Register a document; an existing id is a conflict
    pub fn insert_document(&self, doc: &Document) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            r#"
            INSERT INTO documents (
                id, doi, title, publication_year, source, authors,
                fulltext, content_hash, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
            params![
                doc.id.to_string(),
                doc.doi,
                doc.title,
                doc.publication_year,
                doc.source,
                serde_json::to_string(&doc.authors)?,
                doc.fulltext,
                doc.content_hash,
                format_timestamp(&doc.created_at),
            ],
        )?;

        Ok(())
    }

    /// Get a document by id
    pub fn get_document(&self, id: Uuid) -> Result<Option<Document>> {
        let conn = self.conn.lock();

        let doc = conn
            .query_row(
                &format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS),
                params![id.to_string()],
                row_to_document,
            )
            .optional()?;

        Ok(doc)
    }

    /// Get documents by id, in the order given; unknown ids are skipped
    pub fn get_documents(&self, ids: &[Uuid]) -> Result<Vec<Document>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS))?;

        let mut docs = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(doc) = stmt
                .query_row(params![id.to_string()], row_to_document)
                .optional()?
            {
                docs.push(doc);
            }
        }

        Ok(docs)
    }

    /// Attach fulltext to a document that has none yet
    pub fn attach_fulltext(&self, id: Uuid, fulltext: &str) -> Result<()> {
        let conn = self.conn.lock();

        let updated = conn.execute(
            "UPDATE documents SET fulltext = ?1, content_hash = ?2 WHERE id = ?3 AND fulltext IS NULL",
            params![fulltext, content_hash(fulltext), id.to_string()],
        )?;

        if updated == 1 {
            return Ok(());
        }

        let exists: bool = conn
            .query_row(
                "SELECT 1 FROM documents WHERE id = ?1",
                params![id.to_string()],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if exists {
            Err(Error::StorageConflict(format!(
                "document {} already has fulltext",
                id
            )))
        } else {
            Err(Error::DocumentNotFound(id.to_string()))
        }
    }

    // ==================== Passages ====================

    /// Insert or update the passages of one document in a single transaction
    ///
    /// Passages must belong to `document_id` and be numbered `0..n`. Stored
    /// passages of the same document with an index `>= n` are removed, so a
    /// re-ingest that yields fewer chunks leaves no stale tail behind.
    pub fn upsert_passages(&self, document_id: Uuid, passages: &[Passage]) -> Result<usize> {
        for (expected, passage) in passages.iter().enumerate() {
            if passage.document_id != document_id {
                return Err(Error::InvalidRequest(format!(
                    "passage {} does not belong to document {}",
                    passage.id(),
                    document_id
                )));
            }
            if passage.chunk_index as usize != expected {
                return Err(Error::InvalidRequest(format!(
                    "passage indices must be contiguous: expected {}, got {}",
                    expected, passage.chunk_index
                )));
            }
        }

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        {
            let mut stmt = tx.prepare(
                r#"
                INSERT INTO passages (
                    document_id, chunk_index, content, embedding, dimensions, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(document_id, chunk_index) DO UPDATE SET
                    content = excluded.content,
                    embedding = excluded.embedding,
                    dimensions = excluded.dimensions,
                    updated_at = excluded.updated_at
                "#,
            )?;

            let now = format_timestamp(&Utc::now());
            for passage in passages {
                stmt.execute(params![
                    document_id.to_string(),
                    passage.chunk_index,
                    passage.content,
                    encode_embedding(&passage.embedding),
                    passage.embedding.len() as i64,
                    &now,
                ])?;
            }
        }

        tx.execute(
            "DELETE FROM passages WHERE document_id = ?1 AND chunk_index >= ?2",
            params![document_id.to_string(), passages.len() as i64],
        )?;

        tx.commit()?;

        Ok(passages.len())
    }

    /// All passages of a document in chunk order
    pub fn passages_for_document(&self, document_id: Uuid) -> Result<Vec<Passage>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(
            "SELECT document_id, chunk_index, content, embedding FROM passages
             WHERE document_id = ?1 ORDER BY chunk_index",
        )?;

        let passages = stmt
            .query_map(params![document_id.to_string()], row_to_passage)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(passages)
    }

    /// Visit stored passages, optionally only those of the given documents
    pub fn scan_passages<F>(&self, documents: Option<&[Uuid]>, mut visit: F) -> Result<()>
    where
        F: FnMut(Passage),
    {
        let conn = self.conn.lock();

        match documents {
            None => {
                let mut stmt = conn
                    .prepare("SELECT document_id, chunk_index, content, embedding FROM passages")?;
                let rows = stmt.query_map([], row_to_passage)?;
                for row in rows {
                    visit(row?);
                }
            }
            Some(ids) => {
                let mut stmt = conn.prepare(
                    "SELECT document_id, chunk_index, content, embedding FROM passages
                     WHERE document_id = ?1",
                )?;
                for id in ids {
                    let rows = stmt.query_map(params![id.to_string()], row_to_passage)?;
                    for row in rows {
                        visit(row?);
                    }
                }
            }
        }

        Ok(())
    }

    /// Number of stored passages
    pub fn count_passages(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM passages", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ==================== Answer history ====================

    /// Persist one answer record
    pub fn save_answer_record(&self, record: &AnswerRecord) -> Result<()> {
        let chunk_ids = serde_json::to_string(&record.cited)?;
        let source_documents = serde_json::to_string(&record.source_documents)?;

        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO answer_records (
                id, user_id, query, answer, chunk_ids, source_documents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                record.id.to_string(),
                record.owner.user_id(),
                record.query,
                record.answer,
                chunk_ids,
                source_documents,
                format_timestamp(&record.created_at),
            ],
        )?;

        Ok(())
    }

    /// Records of one owner, newest first
    pub fn list_answer_records(&self, owner: Owner) -> Result<Vec<AnswerRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM answer_records WHERE user_id IS ?1
             ORDER BY created_at DESC, rowid DESC",
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![owner.user_id()], row_to_answer_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Get one record by id
    pub fn get_answer_record(&self, id: Uuid) -> Result<Option<AnswerRecord>> {
        let conn = self.conn.lock();

        let record = conn
            .query_row(
                &format!("SELECT {} FROM answer_records WHERE id = ?1", RECORD_COLUMNS),
                params![id.to_string()],
                row_to_answer_record,
            )
            .optional()?;

        Ok(record)
    }

    /// Delete one record; returns whether it existed
    pub fn delete_answer_record(&self, id: Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM answer_records WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(count > 0)
    }

    /// Delete every record of one owner
    pub fn clear_answer_records(&self, owner: Owner) -> Result<usize> {
        let conn = self.conn.lock();
        let count = conn.execute(
            "DELETE FROM answer_records WHERE user_id IS ?1",
            params![owner.user_id()],
        )?;
        Ok(count)
    }

    /// Row counts across all tables
    pub fn stats(&self) -> Result<StoreStats> {
        let conn = self.conn.lock();

        let count = |table: &str| -> Result<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| row.get(0))?;
            Ok(n as usize)
        };

        Ok(StoreStats {
            documents: count("documents")?,
            passages: count("passages")?,
            answer_records: count("answer_records")?,
        })
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, doi, title, publication_year, source, authors, fulltext, content_hash, created_at";

const RECORD_COLUMNS: &str =
    "id, user_id, query, answer, chunk_ids, source_documents, created_at";

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    // Fixed width so lexical order matches time order
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_uuid(idx: usize, raw: &str) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(idx: usize, raw: &str) -> rusqlite::Result<T> {
    serde_json::from_str(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Little-endian f32 bytes
fn encode_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect()
}

fn row_to_document(row: &rusqlite::Row) -> rusqlite::Result<Document> {
    let id_str: String = row.get(0)?;
    let authors_json: String = row.get(5)?;
    let created_at_str: String = row.get(8)?;

    Ok(Document {
        id: parse_uuid(0, &id_str)?,
        doi: row.get(1)?,
        title: row.get(2)?,
        publication_year: row.get(3)?,
        source: row.get(4)?,
        authors: serde_json::from_str(&authors_json).unwrap_or_default(),
        fulltext: row.get(6)?,
        content_hash: row.get(7)?,
        created_at: parse_timestamp(&created_at_str),
    })
}

fn row_to_passage(row: &rusqlite::Row) -> rusqlite::Result<Passage> {
    let document_id_str: String = row.get(0)?;
    let chunk_index: u32 = row.get(1)?;
    let content: String = row.get(2)?;
    let embedding: Vec<u8> = row.get(3)?;

    Ok(Passage::new(
        parse_uuid(0, &document_id_str)?,
        chunk_index,
        content,
        decode_embedding(&embedding),
    ))
}

fn row_to_answer_record(row: &rusqlite::Row) -> rusqlite::Result<AnswerRecord> {
    let id_str: String = row.get(0)?;
    let user_id: Option<i64> = row.get(1)?;
    let chunk_ids_json: String = row.get(4)?;
    let sources_json: String = row.get(5)?;
    let created_at_str: String = row.get(6)?;

    let cited: Vec<PassageId> = parse_json(4, &chunk_ids_json)?;

    Ok(AnswerRecord {
        id: parse_uuid(0, &id_str)?,
        owner: Owner::from_user_id(user_id),
        query: row.get(2)?,
        answer: row.get(3)?,
        cited,
        source_documents: parse_json(5, &sources_json)?,
        created_at: parse_timestamp(&created_at_str),
    })
}
