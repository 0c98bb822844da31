// Record store backed by a single SQLite file

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, info};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;

use consulta_recon::engine::timestamp;
use consulta_recon::model::{
    Estado, ESTADO, FECHA_ACTUALIZACION, FECHA_CREACION, TIPO_PERSONA, TOTAL_REGISTROS,
};
use consulta_recon::PersonaType;
use consulta_recon::store::{Document, DocumentStore, StoreError, UpsertOutcome};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    collection TEXT NOT NULL,
    key TEXT NOT NULL,
    body TEXT NOT NULL,            -- JSON object
    estado TEXT,                   -- exitoso | no_registrado | error
    created_at TEXT NOT NULL,      -- RFC 3339, UTC
    updated_at TEXT NOT NULL,
    PRIMARY KEY (collection, key)
);

CREATE INDEX IF NOT EXISTS idx_documents_updated ON documents (collection, updated_at);
CREATE INDEX IF NOT EXISTS idx_documents_estado ON documents (collection, estado);
"#;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (creating if needed) the store at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| StoreError::Backend(format!("{}: {e}", parent.display())))?;
            }
        }
        let conn = Connection::open(path).map_err(backend)?;
        // WAL lets one job write while others read or write other keys.
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(())).map_err(backend)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory().map_err(backend)?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT).map_err(backend)?;
        conn.execute_batch(SCHEMA).map_err(backend)?;
        Ok(Self { conn })
    }

    /// Delete records of `collection` not updated within `days` of `now`.
    pub fn clean_old_data(
        &self,
        collection: &str,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let Some(cutoff) = now.checked_sub_signed(chrono::Duration::days(i64::from(days))) else {
            debug!("{collection}: retention of {days} days reaches past the calendar, nothing to remove");
            return Ok(0);
        };
        let cutoff = timestamp(cutoff);
        let deleted = self
            .conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND updated_at < ?2",
                params![collection, cutoff],
            )
            .map_err(backend)?;
        info!("{collection}: removed {deleted} records older than {days} days");
        Ok(deleted)
    }

    /// Records of `collection`, most recently updated first.
    pub fn list(
        &self,
        collection: &str,
        estado: Option<Estado>,
        limit: Option<usize>,
    ) -> Result<Vec<Document>, StoreError> {
        let limit = limit.map_or(-1, |n| n as i64);
        let mut stmt = self
            .conn
            .prepare(
                "SELECT key, body FROM documents
                 WHERE collection = ?1 AND (?2 IS NULL OR estado = ?2)
                 ORDER BY updated_at DESC, key
                 LIMIT ?3",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![collection, estado.map(|e| e.as_str()), limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(backend)?;

        let mut documents = Vec::new();
        for row in rows {
            let (key, body) = row.map_err(backend)?;
            documents.push(parse_body(collection, &key, &body)?);
        }
        Ok(documents)
    }

    pub fn stats(&self, collection: &str) -> Result<CollectionStats, StoreError> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT COALESCE(estado, ''), COUNT(*) FROM documents
                 WHERE collection = ?1 GROUP BY estado",
            )
            .map_err(backend)?;
        let rows = stmt
            .query_map(params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })
            .map_err(backend)?;

        let mut stats = CollectionStats { collection: collection.to_string(), ..Default::default() };
        for row in rows {
            let (estado, count) = row.map_err(backend)?;
            let count = count as usize;
            stats.total += count;
            stats.by_estado.insert(estado, count);
        }

        let exitosos = stats.by_estado.get(Estado::Exitoso.as_str()).copied().unwrap_or(0);
        stats.with_error = stats.by_estado.get(Estado::Error.as_str()).copied().unwrap_or(0);
        if stats.total > 0 {
            stats.success_rate = exitosos as f64 * 100.0 / stats.total as f64;
        }

        let (naturales, juridicas, con_datos) = self
            .conn
            .query_row(
                "SELECT
                     COALESCE(SUM(json_extract(body, '$.' || ?2) = ?3), 0),
                     COALESCE(SUM(json_extract(body, '$.' || ?2) = ?4), 0),
                     COALESCE(SUM(COALESCE(json_extract(body, '$.' || ?5), 0) > 0), 0)
                 FROM documents WHERE collection = ?1",
                params![
                    collection,
                    TIPO_PERSONA,
                    PersonaType::Natural.as_str(),
                    PersonaType::Juridica.as_str(),
                    TOTAL_REGISTROS,
                ],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
            )
            .map_err(backend)?;
        stats.personas_naturales = naturales as usize;
        stats.personas_juridicas = juridicas as usize;
        stats.with_data = con_datos as usize;
        Ok(stats)
    }
}

fn parse_body(collection: &str, key: &str, body: &str) -> Result<Document, StoreError> {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Object(doc)) => Ok(doc),
        _ => Err(StoreError::Corrupt { collection: collection.to_string(), key: key.to_string() }),
    }
}

fn string_field<'a>(document: &'a Document, field: &str) -> Option<&'a str> {
    document.get(field).and_then(Value::as_str)
}

impl DocumentStore for SqliteStore {
    fn find_one(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
        let body: Option<String> = self
            .conn
            .query_row(
                "SELECT body FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| row.get(0),
            )
            .optional()
            .map_err(backend)?;
        body.map(|body| parse_body(collection, key, &body)).transpose()
    }

    fn upsert(
        &mut self,
        collection: &str,
        key: &str,
        document: &Document,
    ) -> Result<UpsertOutcome, StoreError> {
        let body = serde_json::to_string(document).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let now = timestamp(Utc::now());
        let updated_at = string_field(document, FECHA_ACTUALIZACION).unwrap_or(now.as_str());
        let created_at = string_field(document, FECHA_CREACION).unwrap_or(updated_at);
        let estado = string_field(document, ESTADO);

        let tx = self.conn.transaction().map_err(backend)?;
        let exists = tx
            .query_row(
                "SELECT 1 FROM documents WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |_| Ok(()),
            )
            .optional()
            .map_err(backend)?
            .is_some();
        tx.execute(
            "INSERT INTO documents (collection, key, body, estado, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (collection, key) DO UPDATE SET
                 body = excluded.body,
                 estado = excluded.estado,
                 updated_at = excluded.updated_at",
            params![collection, key, body, estado, created_at, updated_at],
        )
        .map_err(backend)?;
        tx.commit().map_err(backend)?;

        debug!("{collection}/{key}: stored ({} bytes)", body.len());
        Ok(UpsertOutcome { inserted_new: !exists })
    }
}

/// Per-collection counts for operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CollectionStats {
    pub collection: String,
    pub total: usize,
    pub by_estado: BTreeMap<String, usize>,
    /// Percentage of records whose last query succeeded.
    pub success_rate: f64,
    pub with_error: usize,
    pub personas_naturales: usize,
    pub personas_juridicas: usize,
    /// Records whose last successful query returned at least one row.
    pub with_data: usize,
}
