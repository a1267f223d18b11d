use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use hearth_core::{Record, Table};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, params, params_from_iter};
use serde_json::Value;

use crate::{Filter, Store, StoreError, ensure_table};

/// Record store on a local sqlite file. Every table shares one `records`
/// relation keyed by `(table_name, id)`; `seq` keeps insertion order stable
/// across upserts.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteStore {
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: PathBuf::from(":memory:"),
        };
        store.migrate()?;
        Ok(store)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
              version INTEGER PRIMARY KEY,
              name TEXT NOT NULL,
              applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            "#,
        )?;

        apply_migration(
            &conn,
            1,
            "records_table",
            r#"
            CREATE TABLE IF NOT EXISTS records (
              seq INTEGER PRIMARY KEY AUTOINCREMENT,
              table_name TEXT NOT NULL,
              id TEXT NOT NULL,
              body TEXT NOT NULL,
              updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
              UNIQUE(table_name, id)
            );
            "#,
        )?;

        apply_migration(
            &conn,
            2,
            "records_table_index",
            r#"
            CREATE INDEX IF NOT EXISTS idx_records_table_seq ON records(table_name, seq);
            "#,
        )?;
        Ok(())
    }

    pub fn applied_migrations(&self) -> Result<Vec<(i64, String)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT version, name FROM schema_migrations ORDER BY version")?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    fn write(&self, table: Table, records: &[Record], replace: bool) -> Result<(), StoreError> {
        ensure_table(table, records)?;
        let encoded = records
            .iter()
            .map(|record| Ok((record.id().to_string(), record.to_value()?.to_string())))
            .collect::<Result<Vec<_>, StoreError>>()?;

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let sql = if replace {
                "INSERT INTO records (table_name, id, body) VALUES (?1, ?2, ?3)
                 ON CONFLICT(table_name, id)
                 DO UPDATE SET body = excluded.body, updated_at = CURRENT_TIMESTAMP"
            } else {
                "INSERT INTO records (table_name, id, body) VALUES (?1, ?2, ?3)"
            };
            let mut stmt = tx.prepare(sql)?;
            for (id, body) in &encoded {
                stmt.execute(params![table.as_str(), id, body])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn read(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let mut sql = String::from("SELECT id, body FROM records WHERE table_name = ?1");
        let mut args = vec![SqlValue::Text(table.as_str().to_string())];
        for (field, expected) in &filter.eq {
            if !is_plain_field(field) {
                return Err(StoreError::Rejected {
                    table: table.as_str(),
                    reason: format!("unsupported filter field `{field}`"),
                });
            }
            args.push(SqlValue::Text(format!("$.{field}")));
            let path_idx = args.len();
            match sql_value(expected) {
                Some(value) => {
                    args.push(value);
                    sql.push_str(&format!(
                        " AND json_extract(body, ?{path_idx}) = ?{}",
                        args.len()
                    ));
                }
                None => sql.push_str(&format!(" AND json_extract(body, ?{path_idx}) IS NULL")),
            }
        }
        sql.push_str(" ORDER BY seq ASC");
        if let Some(limit) = filter.limit {
            sql.push_str(&format!(" LIMIT {limit}"));
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let rows = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter()
            .map(|(id, body)| {
                let value: Value =
                    serde_json::from_str(&body).map_err(|source| StoreError::Corrupt {
                        table: table.as_str(),
                        id: id.clone(),
                        source,
                    })?;
                Record::from_value(table, value).map_err(|source| StoreError::Corrupt {
                    table: table.as_str(),
                    id,
                    source,
                })
            })
            .collect()
    }
}

fn apply_migration(
    conn: &Connection,
    version: i64,
    name: &str,
    sql: &str,
) -> Result<(), StoreError> {
    let mut stmt = conn.prepare("SELECT 1 FROM schema_migrations WHERE version = ?1 LIMIT 1")?;
    let mut rows = stmt.query(params![version])?;
    if rows.next()?.is_some() {
        return Ok(());
    }

    let tx = conn.unchecked_transaction()?;
    for raw in sql.split(';') {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Err(err) = tx.execute(trimmed, []) {
            let message = err.to_string().to_lowercase();
            if !message.contains("already exists") {
                return Err(err.into());
            }
        }
    }
    tx.execute(
        "INSERT INTO schema_migrations (version, name) VALUES (?1, ?2)",
        params![version, name],
    )?;
    tx.commit()?;
    tracing::debug!(version, name, "applied store migration");
    Ok(())
}

fn is_plain_field(field: &str) -> bool {
    !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn sql_value(value: &Value) -> Option<SqlValue> {
    match value {
        Value::Null => None,
        Value::Bool(flag) => Some(SqlValue::Integer(i64::from(*flag))),
        Value::Number(number) => Some(match number.as_i64() {
            Some(int) => SqlValue::Integer(int),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        }),
        Value::String(text) => Some(SqlValue::Text(text.clone())),
        other => Some(SqlValue::Text(other.to_string())),
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn insert(&self, table: Table, records: &[Record]) -> Result<(), StoreError> {
        self.write(table, records, false)
    }

    async fn upsert(&self, table: Table, records: &[Record]) -> Result<(), StoreError> {
        self.write(table, records, true)
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM records WHERE table_name = ?1 AND id = ?2",
            params![table.as_str(), id],
        )?;
        Ok(())
    }

    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        self.read(table, filter)
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}
