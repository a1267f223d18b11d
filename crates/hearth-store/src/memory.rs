use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use hearth_core::{Record, Table};

use crate::{Filter, Store, StoreError, ensure_table};

/// A write the store was asked to perform, recorded whether or not it failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Insert(Table, Vec<String>),
    Upsert(Table, Vec<String>),
    Delete(Table, String),
}

#[derive(Debug, Default)]
struct Inner {
    tables: BTreeMap<Table, Vec<Record>>,
    failing_tables: BTreeSet<Table>,
    writes_before_failure: Option<usize>,
    calls: Vec<StoreCall>,
}

impl Inner {
    fn check_write(&mut self, table: Table) -> Result<(), StoreError> {
        if self.failing_tables.contains(&table) {
            return Err(StoreError::Rejected {
                table: table.as_str(),
                reason: "injected failure".to_string(),
            });
        }
        match self.writes_before_failure {
            Some(0) => Err(StoreError::Rejected {
                table: table.as_str(),
                reason: "injected failure".to_string(),
            }),
            Some(remaining) => {
                self.writes_before_failure = Some(remaining - 1);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

/// Process-local store used for tests and `store.backend = "memory"`.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            for record in records {
                inner.tables.entry(record.table()).or_default().push(record);
            }
        }
        store
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Every later write to `table` is rejected until [`InMemoryStore::heal`].
    pub fn fail_writes_to(&self, table: Table) {
        if let Ok(mut inner) = self.lock() {
            inner.failing_tables.insert(table);
        }
    }

    /// Lets `count` more writes succeed, then rejects the rest.
    pub fn fail_after_writes(&self, count: usize) {
        if let Ok(mut inner) = self.lock() {
            inner.writes_before_failure = Some(count);
        }
    }

    pub fn heal(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.failing_tables.clear();
            inner.writes_before_failure = None;
        }
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().map(|inner| inner.calls.clone()).unwrap_or_default()
    }

    pub fn records(&self, table: Table) -> Vec<Record> {
        self.lock()
            .map(|inner| inner.tables.get(&table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn insert(&self, table: Table, records: &[Record]) -> Result<(), StoreError> {
        ensure_table(table, records)?;
        let mut inner = self.lock()?;
        inner.calls.push(StoreCall::Insert(
            table,
            records.iter().map(|r| r.id().to_string()).collect(),
        ));
        inner.check_write(table)?;
        let rows = inner.tables.entry(table).or_default();
        if let Some(dup) = records
            .iter()
            .find(|record| rows.iter().any(|row| row.id() == record.id()))
        {
            return Err(StoreError::Rejected {
                table: table.as_str(),
                reason: format!("id {} already exists", dup.id()),
            });
        }
        rows.extend(records.iter().cloned());
        Ok(())
    }

    async fn upsert(&self, table: Table, records: &[Record]) -> Result<(), StoreError> {
        ensure_table(table, records)?;
        let mut inner = self.lock()?;
        inner.calls.push(StoreCall::Upsert(
            table,
            records.iter().map(|r| r.id().to_string()).collect(),
        ));
        inner.check_write(table)?;
        let rows = inner.tables.entry(table).or_default();
        for record in records {
            match rows.iter().position(|row| row.id() == record.id()) {
                Some(idx) => rows[idx] = record.clone(),
                None => rows.push(record.clone()),
            }
        }
        Ok(())
    }

    async fn delete(&self, table: Table, id: &str) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        inner.calls.push(StoreCall::Delete(table, id.to_string()));
        inner.check_write(table)?;
        if let Some(rows) = inner.tables.get_mut(&table) {
            rows.retain(|row| row.id() != id);
        }
        Ok(())
    }

    async fn query(&self, table: Table, filter: &Filter) -> Result<Vec<Record>, StoreError> {
        let inner = self.lock()?;
        let rows = inner.tables.get(&table).cloned().unwrap_or_default();
        let mut matched = Vec::new();
        for row in rows {
            if filter.limit.is_some_and(|limit| matched.len() >= limit) {
                break;
            }
            if filter.eq.is_empty() || filter.matches(&row.to_value()?) {
                matched.push(row);
            }
        }
        Ok(matched)
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
