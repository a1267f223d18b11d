use std::sync::Arc;

use async_trait::async_trait;
use hearth_common::{HearthConfig, StoreBackend};
use hearth_core::{Record, Table};
use thiserror::Error;

mod filter;
mod memory;
mod sqlite;

pub use filter::Filter;
pub use memory::{InMemoryStore, StoreCall};
pub use sqlite::SqliteStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store rejected write to {table}: {reason}")]
    Rejected { table: &'static str, reason: String },
    #[error("record {id} in {table} is not valid: {source}")]
    Corrupt {
        table: &'static str,
        id: String,
        source: serde_json::Error,
    },
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("failed to prepare store location: {0}")]
    Io(#[from] std::io::Error),
    #[error("store connection is poisoned")]
    Poisoned,
}

/// Remote record store. Every call is a single batch that either lands whole
/// or fails whole.
#[async_trait]
pub trait Store: Send + Sync {
    /// Adds new records; an id that already exists fails the batch.
    async fn insert(&self, table: Table, records: &[Record]) -> Result<(), StoreError>;
    /// Writes records, replacing existing ids in place.
    async fn upsert(&self, table: Table, records: &[Record]) -> Result<(), StoreError>;
    /// Removes one record. Deleting a missing id succeeds.
    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError>;
    /// Records in insertion order.
    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError>;

    fn backend_name(&self) -> &'static str;
}

pub fn open(config: &HearthConfig) -> Result<Arc<dyn Store>, StoreError> {
    match config.store.backend {
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.db_path())?;
            Ok(Arc::new(store))
        }
        StoreBackend::Memory => Ok(Arc::new(InMemoryStore::new())),
    }
}

fn ensure_table(table: Table, records: &[Record]) -> Result<(), StoreError> {
    match records.iter().find(|record| record.table() != table) {
        Some(stray) => Err(StoreError::Rejected {
            table: table.as_str(),
            reason: format!("record {} belongs to {}", stray.id(), stray.table().as_str()),
        }),
        None => Ok(()),
    }
}
