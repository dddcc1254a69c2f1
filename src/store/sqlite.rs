use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection};
use serde_json::Value;

use super::backend::RowStore;
use super::filter::{Filter, Query};
use super::schema;
use super::{StoreError, StoreResult};

/// SQLite-backed row store for local development and single-user setups.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the store database and apply the schema.
    pub fn open(db_path: &str) -> StoreResult<Self> {
        if let Some(dir) = Path::new(db_path).parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create {}: {}", dir.display(), e))
                })?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (for testing).
    pub fn open_memory() -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(schema::CREATE_TABLES_SQL)?;
        conn.execute_batch(schema::CREATE_INDEXES_SQL)?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at, description) VALUES (?1, ?2, ?3)",
            params![schema::SCHEMA_VERSION, chrono::Utc::now().to_rfc3339(), "Initial schema"],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StoreResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("sqlite connection poisoned".to_string()))
    }

    /// Load (id, body) pairs of a table in insertion order.
    fn load(conn: &Connection, table: &str) -> StoreResult<Vec<(String, Value)>> {
        let mut stmt =
            conn.prepare("SELECT id, body FROM rows WHERE table_name = ?1 ORDER BY seq")?;
        let raw = stmt
            .query_map(params![table], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        raw.into_iter()
            .map(|(id, body)| {
                let value = serde_json::from_str(&body).map_err(|source| StoreError::Decode {
                    table: table.to_string(),
                    source,
                })?;
                Ok((id, value))
            })
            .collect()
    }
}

#[async_trait]
impl RowStore for SqliteStore {
    async fn select(&self, table: &str, query: &Query) -> StoreResult<Vec<Value>> {
        let conn = self.conn()?;
        let rows = Self::load(&conn, table)?
            .into_iter()
            .map(|(_, v)| v)
            .filter(|v| query.filter.matches(v))
            .collect();
        Ok(query.finish(rows))
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> StoreResult<Vec<Value>> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = Vec::with_capacity(rows.len());
        for mut row in rows {
            let Some(obj) = row.as_object_mut() else {
                return Err(StoreError::Rejected {
                    table: table.to_string(),
                    reason: "row must be a JSON object".to_string(),
                });
            };
            let id = match obj.get("id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => {
                    let id = uuid::Uuid::new_v4().to_string();
                    obj.insert("id".to_string(), Value::String(id.clone()));
                    id
                }
            };
            tx.execute(
                "INSERT INTO rows (table_name, id, body) VALUES (?1, ?2, ?3)",
                params![table, id, row.to_string()],
            )?;
            inserted.push(row);
        }
        tx.commit()?;
        Ok(inserted)
    }

    async fn patch(&self, table: &str, filter: &Filter, changes: Value) -> StoreResult<()> {
        let Some(changes) = changes.as_object() else {
            return Err(StoreError::Rejected {
                table: table.to_string(),
                reason: "patch body must be an object".to_string(),
            });
        };
        let mut conn = self.conn()?;
        let existing = Self::load(&conn, table)?;
        let tx = conn.transaction()?;
        for (id, mut row) in existing.into_iter().filter(|(_, v)| filter.matches(v)) {
            if let Some(obj) = row.as_object_mut() {
                for (k, v) in changes {
                    obj.insert(k.clone(), v.clone());
                }
            }
            tx.execute(
                "UPDATE rows SET body = ?3 WHERE table_name = ?1 AND id = ?2",
                params![table, id, row.to_string()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}
