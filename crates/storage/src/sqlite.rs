//! Embedded relational backend.
//!
//! SQLite with WAL mode, the single-node production store. Attestations,
//! platform data, and trust checks get typed tables with the query columns
//! broken out and indexed; the remaining record kinds share a generic
//! `records` table. Every write runs in a transaction, so a crash leaves a
//! record either fully present or absent.

use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

use crate::backend::{RecordKind, StorageBackend, AGENT_FIELDS};
use crate::error::Result;

/// SQLite-backed [`StorageBackend`].
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SqliteBackend {
    /// Create or open a database at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        // WAL for durability and concurrent readers.
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;

        Self::init_schema(&conn)?;

        info!(path = %path.display(), "Opened SQLite storage backend");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS attestations (
                id TEXT PRIMARY KEY,
                subject_id TEXT NOT NULL,
                witness_id TEXT NOT NULL,
                task TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                record TEXT NOT NULL,
                seq INTEGER UNIQUE
            );
            CREATE INDEX IF NOT EXISTS idx_attestations_subject ON attestations(subject_id);
            CREATE INDEX IF NOT EXISTS idx_attestations_witness ON attestations(witness_id);
            CREATE INDEX IF NOT EXISTS idx_attestations_task ON attestations(task);
            CREATE INDEX IF NOT EXISTS idx_attestations_timestamp ON attestations(timestamp);

            CREATE TABLE IF NOT EXISTS platform_data (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                platform_name TEXT NOT NULL,
                platform_url TEXT NOT NULL,
                last_fetched TEXT NOT NULL,
                record TEXT NOT NULL,
                seq INTEGER UNIQUE
            );
            CREATE INDEX IF NOT EXISTS idx_platform_data_agent ON platform_data(agent_id);

            CREATE TABLE IF NOT EXISTS trust_checks (
                id TEXT PRIMARY KEY,
                agent_id TEXT NOT NULL,
                requested_at TEXT NOT NULL,
                record TEXT NOT NULL,
                seq INTEGER UNIQUE
            );
            CREATE INDEX IF NOT EXISTS idx_trust_checks_agent ON trust_checks(agent_id);
            CREATE INDEX IF NOT EXISTS idx_trust_checks_time ON trust_checks(requested_at);

            CREATE TABLE IF NOT EXISTS records (
                kind TEXT NOT NULL,
                id TEXT NOT NULL,
                record TEXT NOT NULL,
                seq INTEGER UNIQUE,
                PRIMARY KEY (kind, id)
            );
            CREATE INDEX IF NOT EXISTS idx_records_kind ON records(kind);

            CREATE TABLE IF NOT EXISTS record_indexes (
                kind TEXT NOT NULL,
                index_name TEXT NOT NULL,
                key TEXT NOT NULL,
                id TEXT NOT NULL,
                PRIMARY KEY (kind, index_name, key, id)
            );
            CREATE INDEX IF NOT EXISTS idx_record_indexes_lookup
                ON record_indexes(kind, index_name, key);

            CREATE TABLE IF NOT EXISTS seq_counter (
                n INTEGER NOT NULL
            );
            INSERT INTO seq_counter (n)
                SELECT 0 WHERE NOT EXISTS (SELECT 1 FROM seq_counter);
            "#,
        )?;
        Ok(())
    }

    fn next_seq(conn: &Connection) -> Result<i64> {
        conn.execute("UPDATE seq_counter SET n = n + 1", [])?;
        let seq: i64 = conn.query_row("SELECT n FROM seq_counter", [], |row| row.get(0))?;
        Ok(seq)
    }

    fn field<'a>(record: &'a Value, name: &str) -> &'a str {
        record.get(name).and_then(Value::as_str).unwrap_or("")
    }
}

impl StorageBackend for SqliteBackend {
    fn put(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool> {
        let mut conn = self.conn.lock().expect("sqlite backend poisoned");
        let tx = conn.transaction()?;
        let json = serde_json::to_string(record)?;
        let seq = Self::next_seq(&tx)?;

        let inserted = match kind {
            RecordKind::Attestation => tx.execute(
                r#"
                INSERT OR IGNORE INTO attestations
                    (id, subject_id, witness_id, task, timestamp, record, seq)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    id,
                    Self::field(record, "subject"),
                    Self::field(record, "witness"),
                    Self::field(record, "task"),
                    Self::field(record, "timestamp"),
                    json,
                    seq,
                ],
            )?,
            RecordKind::PlatformDatum => tx.execute(
                r#"
                INSERT OR IGNORE INTO platform_data
                    (id, agent_id, platform_name, platform_url, last_fetched, record, seq)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
                params![
                    id,
                    Self::field(record, "agent_id"),
                    Self::field(record, "platform_name"),
                    Self::field(record, "platform_url"),
                    Self::field(record, "last_fetched"),
                    json,
                    seq,
                ],
            )?,
            RecordKind::TrustCheck => tx.execute(
                r#"
                INSERT OR IGNORE INTO trust_checks (id, agent_id, requested_at, record, seq)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![
                    id,
                    Self::field(record, "agent_id"),
                    Self::field(record, "requested_at"),
                    json,
                    seq,
                ],
            )?,
            _ => tx.execute(
                "INSERT OR IGNORE INTO records (kind, id, record, seq) VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), id, json, seq],
            )?,
        };

        tx.commit()?;
        debug!(kind = %kind, id = %id, inserted = inserted > 0, "put");
        Ok(inserted > 0)
    }

    fn update(&self, kind: RecordKind, id: &str, record: &Value) -> Result<bool> {
        let conn = self.conn.lock().expect("sqlite backend poisoned");
        let json = serde_json::to_string(record)?;
        let changed = match kind {
            RecordKind::Attestation => conn.execute(
                r#"
                UPDATE attestations
                SET subject_id = ?2, witness_id = ?3, task = ?4, timestamp = ?5, record = ?6
                WHERE id = ?1
                "#,
                params![
                    id,
                    Self::field(record, "subject"),
                    Self::field(record, "witness"),
                    Self::field(record, "task"),
                    Self::field(record, "timestamp"),
                    json,
                ],
            )?,
            RecordKind::PlatformDatum => conn.execute(
                r#"
                UPDATE platform_data
                SET agent_id = ?2, platform_name = ?3, platform_url = ?4,
                    last_fetched = ?5, record = ?6
                WHERE id = ?1
                "#,
                params![
                    id,
                    Self::field(record, "agent_id"),
                    Self::field(record, "platform_name"),
                    Self::field(record, "platform_url"),
                    Self::field(record, "last_fetched"),
                    json,
                ],
            )?,
            RecordKind::TrustCheck => conn.execute(
                "UPDATE trust_checks SET agent_id = ?2, requested_at = ?3, record = ?4 WHERE id = ?1",
                params![
                    id,
                    Self::field(record, "agent_id"),
                    Self::field(record, "requested_at"),
                    json,
                ],
            )?,
            _ => conn.execute(
                "UPDATE records SET record = ?3 WHERE kind = ?1 AND id = ?2",
                params![kind.as_str(), id, json],
            )?,
        };
        Ok(changed > 0)
    }

    fn get(&self, kind: RecordKind, id: &str) -> Result<Option<Value>> {
        let conn = self.conn.lock().expect("sqlite backend poisoned");
        let json: Option<String> = match kind {
            RecordKind::Attestation => conn
                .query_row(
                    "SELECT record FROM attestations WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?,
            RecordKind::PlatformDatum => conn
                .query_row(
                    "SELECT record FROM platform_data WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?,
            RecordKind::TrustCheck => conn
                .query_row(
                    "SELECT record FROM trust_checks WHERE id = ?1",
                    [id],
                    |row| row.get(0),
                )
                .optional()?,
            _ => conn
                .query_row(
                    "SELECT record FROM records WHERE kind = ?1 AND id = ?2",
                    params![kind.as_str(), id],
                    |row| row.get(0),
                )
                .optional()?,
        };
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn iter(&self, kind: RecordKind) -> Result<Vec<(String, Value)>> {
        let conn = self.conn.lock().expect("sqlite backend poisoned");
        let sql = match kind {
            RecordKind::Attestation => {
                "SELECT id, record FROM attestations ORDER BY seq ASC".to_string()
            }
            RecordKind::PlatformDatum => {
                "SELECT id, record FROM platform_data ORDER BY seq ASC".to_string()
            }
            RecordKind::TrustCheck => {
                "SELECT id, record FROM trust_checks ORDER BY seq ASC".to_string()
            }
            _ => format!(
                "SELECT id, record FROM records WHERE kind = '{}' ORDER BY seq ASC",
                kind.as_str()
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, json)| Ok((id, serde_json::from_str(&json)?)))
            .collect()
    }

    fn delete_by_agent(&self, agent_id: &str) -> Result<usize> {
        let mut conn = self.conn.lock().expect("sqlite backend poisoned");
        let tx = conn.transaction()?;
        let mut removed = 0;

        removed += tx.execute(
            r#"
            DELETE FROM attestations WHERE subject_id = ?1 OR witness_id = ?1
            "#,
            [agent_id],
        )?;
        removed += tx.execute("DELETE FROM platform_data WHERE agent_id = ?1", [agent_id])?;
        removed += tx.execute("DELETE FROM trust_checks WHERE agent_id = ?1", [agent_id])?;

        // Generic records: match on any owning JSON field.
        let conditions: Vec<String> = AGENT_FIELDS
            .iter()
            .map(|field| format!("json_extract(record, '$.{}') = ?1", field))
            .collect();
        removed += tx.execute(
            &format!("DELETE FROM records WHERE {}", conditions.join(" OR ")),
            [agent_id],
        )?;

        // Drop index entries that no longer resolve to a live record.
        tx.execute(
            r#"
            DELETE FROM record_indexes
            WHERE (kind = 'attestation' AND id NOT IN (SELECT id FROM attestations))
               OR (kind = 'platform_datum' AND id NOT IN (SELECT id FROM platform_data))
               OR (kind = 'trust_check' AND id NOT IN (SELECT id FROM trust_checks))
               OR (kind NOT IN ('attestation', 'platform_datum', 'trust_check')
                   AND id NOT IN (SELECT id FROM records WHERE records.kind = record_indexes.kind))
            "#,
            [],
        )?;

        tx.commit()?;
        info!(agent_id = %agent_id, removed = removed, "Erased agent records");
        Ok(removed)
    }

    fn index_add(&self, kind: RecordKind, index_name: &str, key: &str, id: &str) -> Result<()> {
        let conn = self.conn.lock().expect("sqlite backend poisoned");
        conn.execute(
            r#"
            INSERT OR IGNORE INTO record_indexes (kind, index_name, key, id)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![kind.as_str(), index_name, key, id],
        )?;
        Ok(())
    }

    fn index_lookup(&self, kind: RecordKind, index_name: &str, key: &str) -> Result<Vec<String>> {
        let conn = self.conn.lock().expect("sqlite backend poisoned");
        let live_table = match kind {
            RecordKind::Attestation => "attestations",
            RecordKind::PlatformDatum => "platform_data",
            RecordKind::TrustCheck => "trust_checks",
            _ => "records",
        };
        let sql = if live_table == "records" {
            r#"
            SELECT ri.id FROM record_indexes ri
            JOIN records r ON r.kind = ri.kind AND r.id = ri.id
            WHERE ri.kind = ?1 AND ri.index_name = ?2 AND ri.key = ?3
            ORDER BY r.seq ASC
            "#
            .to_string()
        } else {
            format!(
                r#"
                SELECT ri.id FROM record_indexes ri
                JOIN {table} t ON t.id = ri.id
                WHERE ri.kind = ?1 AND ri.index_name = ?2 AND ri.key = ?3
                ORDER BY t.seq ASC
                "#,
                table = live_table
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params![kind.as_str(), index_name, key], |row| {
                row.get::<_, String>(0)
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn open_test_backend() -> (SqliteBackend, std::path::PathBuf) {
        let db_path =
            std::env::temp_dir().join(format!("isnad_test_{}.db", uuid::Uuid::new_v4()));
        (SqliteBackend::open(&db_path).unwrap(), db_path)
    }

    #[test]
    fn test_put_get_roundtrip() {
        let (backend, db_path) = open_test_backend();

        let record = json!({
            "subject": "agent:s",
            "witness": "agent:w",
            "task": "qa",
            "timestamp": "2026-01-01T00:00:00+00:00",
        });
        assert!(backend.put(RecordKind::Attestation, "a1", &record).unwrap());
        assert!(!backend.put(RecordKind::Attestation, "a1", &record).unwrap());

        let loaded = backend.get(RecordKind::Attestation, "a1").unwrap().unwrap();
        assert_eq!(loaded, record);

        std::fs::remove_file(db_path).ok();
    }

    #[test]
    fn test_iter_preserves_insertion_order() {
        let (backend, db_path) = open_test_backend();

        for i in 0..5 {
            backend
                .put(
                    RecordKind::Revocation,
                    &format!("r{}", i),
                    &json!({"revoked_by": "agent:r", "n": i}),
                )
                .unwrap();
        }

        let all = backend.iter(RecordKind::Revocation).unwrap();
        assert_eq!(all.len(), 5);
        for (i, (id, record)) in all.iter().enumerate() {
            assert_eq!(id, &format!("r{}", i));
            assert_eq!(record["n"], i);
        }

        std::fs::remove_file(db_path).ok();
    }

    #[test]
    fn test_durability_across_reopen() {
        let db_path =
            std::env::temp_dir().join(format!("isnad_test_{}.db", uuid::Uuid::new_v4()));

        {
            let backend = SqliteBackend::open(&db_path).unwrap();
            backend
                .put(
                    RecordKind::Attestation,
                    "a1",
                    &json!({"subject": "agent:s", "witness": "agent:w", "task": "qa"}),
                )
                .unwrap();
            backend
                .index_add(RecordKind::Attestation, "by_subject", "agent:s", "a1")
                .unwrap();
        }

        let backend = SqliteBackend::open(&db_path).unwrap();
        assert!(backend.get(RecordKind::Attestation, "a1").unwrap().is_some());
        assert_eq!(
            backend
                .index_lookup(RecordKind::Attestation, "by_subject", "agent:s")
                .unwrap(),
            vec!["a1"]
        );

        std::fs::remove_file(db_path).ok();
    }

    #[test]
    fn test_delete_by_agent_spans_tables() {
        let (backend, db_path) = open_test_backend();

        backend
            .put(
                RecordKind::Attestation,
                "a1",
                &json!({"subject": "agent:gone", "witness": "agent:w"}),
            )
            .unwrap();
        backend
            .put(
                RecordKind::Delegation,
                "d1",
                &json!({"principal": "agent:gone", "delegate": "agent:x"}),
            )
            .unwrap();
        backend
            .put(
                RecordKind::PlatformDatum,
                "p1",
                &json!({"agent_id": "agent:gone", "platform_name": "github"}),
            )
            .unwrap();
        backend
            .put(
                RecordKind::Attestation,
                "keep",
                &json!({"subject": "agent:other", "witness": "agent:w"}),
            )
            .unwrap();

        let removed = backend.delete_by_agent("agent:gone").unwrap();
        assert_eq!(removed, 3);
        assert!(backend.get(RecordKind::Attestation, "a1").unwrap().is_none());
        assert!(backend.get(RecordKind::Attestation, "keep").unwrap().is_some());

        std::fs::remove_file(db_path).ok();
    }

    #[test]
    fn test_index_lookup_excludes_erased() {
        let (backend, db_path) = open_test_backend();

        backend
            .put(RecordKind::Attestation, "a1", &json!({"subject": "agent:gone"}))
            .unwrap();
        backend
            .index_add(RecordKind::Attestation, "by_subject", "agent:gone", "a1")
            .unwrap();
        backend.delete_by_agent("agent:gone").unwrap();

        assert!(backend
            .index_lookup(RecordKind::Attestation, "by_subject", "agent:gone")
            .unwrap()
            .is_empty());

        std::fs::remove_file(db_path).ok();
    }
}
