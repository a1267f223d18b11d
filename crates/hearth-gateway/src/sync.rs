use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use hearth_core::{
    Change, Ledger, LedgerError, Mutation, Reconcile, Record, RecordKey, Snapshot, Table,
    reduce,
};
use hearth_store::{Filter, Store, StoreError};
use thiserror::Error;
use tracing::{debug, error, info, warn};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Rejected(#[from] LedgerError),
    #[error("{source}")]
    Persistence {
        source: StoreError,
        /// Whether every store write that landed before the failure was undone.
        compensated: bool,
    },
    #[error("local ledger lock is poisoned")]
    Poisoned,
}

#[derive(Debug)]
pub enum ApplyError<E, P> {
    Rejected(E),
    Persistence(P),
    Poisoned,
}

/// Optimistically applies a reduced change to `state`, then persists it.
///
/// The lock is held only while the change is computed, snapshotted and
/// applied, so readers see the new state while persistence is in flight. A
/// persistence failure restores exactly the snapshotted entities.
pub async fn transactional_apply<S, E, P, R, W, Fut>(
    state: &Mutex<S>,
    reduce: R,
    persist: W,
) -> Result<S::Change, ApplyError<E, P>>
where
    S: Reconcile,
    S::Change: Clone,
    S::Snapshot: Clone,
    R: FnOnce(&S) -> Result<S::Change, E>,
    W: FnOnce(S::Change, S::Snapshot) -> Fut,
    Fut: Future<Output = Result<(), P>>,
{
    let (change, snapshot) = {
        let mut guard = state.lock().map_err(|_| ApplyError::Poisoned)?;
        let change = reduce(&*guard).map_err(ApplyError::Rejected)?;
        let snapshot = guard.snapshot(&change);
        guard.apply(&change);
        (change, snapshot)
    };

    match persist(change.clone(), snapshot.clone()).await {
        Ok(()) => Ok(change),
        Err(err) => {
            let mut guard = state.lock().map_err(|_| ApplyError::Poisoned)?;
            guard.restore(snapshot);
            Err(ApplyError::Persistence(err))
        }
    }
}

#[derive(Debug)]
pub struct PersistFailure {
    pub source: StoreError,
    pub compensated: bool,
}

/// A store write that has already been acknowledged.
#[derive(Debug)]
enum Landed {
    Written(Table, Vec<String>),
    Deleted(RecordKey),
}

pub struct SyncEngine {
    ledger: Arc<Mutex<Ledger>>,
    store: Arc<dyn Store>,
}

impl SyncEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_ledger(store, Arc::new(Mutex::new(Ledger::new())))
    }

    pub fn with_ledger(store: Arc<dyn Store>, ledger: Arc<Mutex<Ledger>>) -> Self {
        Self { ledger, store }
    }

    pub fn ledger_handle(&self) -> Arc<Mutex<Ledger>> {
        Arc::clone(&self.ledger)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Copy of the current local state.
    pub fn view(&self) -> Result<Ledger, SyncError> {
        self.ledger
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| SyncError::Poisoned)
    }

    pub async fn apply(&self, mutation: &Mutation) -> Result<Change, SyncError> {
        let kind = mutation.kind().as_str();
        let result = transactional_apply(
            &self.ledger,
            |ledger: &Ledger| reduce(ledger, mutation),
            |change, snapshot| self.persist(change, snapshot),
        )
        .await;

        match result {
            Ok(change) => {
                debug!(
                    mutation = kind,
                    upserts = change.upserts.len(),
                    deletes = change.deletes.len(),
                    "mutation persisted"
                );
                Ok(change)
            }
            Err(ApplyError::Rejected(err)) => {
                debug!(mutation = kind, error = %err, "mutation rejected by ledger");
                Err(SyncError::Rejected(err))
            }
            Err(ApplyError::Persistence(failure)) => {
                warn!(
                    mutation = kind,
                    compensated = failure.compensated,
                    error = %failure.source,
                    "persistence failed, local ledger rolled back"
                );
                Err(SyncError::Persistence {
                    source: failure.source,
                    compensated: failure.compensated,
                })
            }
            Err(ApplyError::Poisoned) => Err(SyncError::Poisoned),
        }
    }

    /// Writes new records with `insert`, changed ones with `upsert`, grouped by
    /// table, then issues deletes. Writes that landed before a failure are
    /// undone on a best-effort basis.
    async fn persist(&self, change: Change, snapshot: Snapshot) -> Result<(), PersistFailure> {
        let priors: BTreeMap<RecordKey, Option<Record>> = snapshot
            .prior()
            .map(|(key, prior)| (key.clone(), prior.cloned()))
            .collect();

        let mut by_table: BTreeMap<Table, (Vec<Record>, Vec<Record>)> = BTreeMap::new();
        for record in change.upserts {
            let is_new = matches!(priors.get(&record.key()), Some(None) | None);
            let (fresh, existing) = by_table.entry(record.table()).or_default();
            if is_new {
                fresh.push(record);
            } else {
                existing.push(record);
            }
        }

        let mut landed = Vec::new();
        for (table, (fresh, existing)) in by_table {
            for (batch, is_insert) in [(fresh, true), (existing, false)] {
                if batch.is_empty() {
                    continue;
                }
                let result = if is_insert {
                    self.store.insert(table, &batch).await
                } else {
                    self.store.upsert(table, &batch).await
                };
                match result {
                    Ok(()) => landed.push(Landed::Written(
                        table,
                        batch.iter().map(|r| r.id().to_string()).collect(),
                    )),
                    Err(source) => return Err(self.fail(source, landed, &priors).await),
                }
            }
        }

        for key in change.deletes {
            match self.store.delete(key.table, &key.id).await {
                Ok(()) => landed.push(Landed::Deleted(key)),
                Err(source) => return Err(self.fail(source, landed, &priors).await),
            }
        }
        Ok(())
    }

    async fn fail(
        &self,
        source: StoreError,
        landed: Vec<Landed>,
        priors: &BTreeMap<RecordKey, Option<Record>>,
    ) -> PersistFailure {
        error!(backend = self.store.backend_name(), error = %source, "store write failed");
        let compensated = self.compensate(landed, priors).await;
        PersistFailure {
            source,
            compensated,
        }
    }

    async fn compensate(
        &self,
        landed: Vec<Landed>,
        priors: &BTreeMap<RecordKey, Option<Record>>,
    ) -> bool {
        let mut clean = true;
        for write in landed.into_iter().rev() {
            let undo = match write {
                Landed::Written(table, ids) => {
                    let mut restore = Vec::new();
                    let mut remove = Vec::new();
                    for id in ids {
                        match priors.get(&RecordKey::new(table, id.clone())) {
                            Some(Some(prior)) => restore.push(prior.clone()),
                            _ => remove.push(id),
                        }
                    }
                    let mut result = Ok(());
                    if !restore.is_empty() {
                        result = self.store.upsert(table, &restore).await;
                    }
                    for id in remove {
                        if result.is_err() {
                            break;
                        }
                        result = self.store.delete(table, &id).await;
                    }
                    result
                }
                Landed::Deleted(key) => match priors.get(&key) {
                    Some(Some(prior)) => {
                        self.store
                            .upsert(key.table, std::slice::from_ref(prior))
                            .await
                    }
                    _ => Ok(()),
                },
            };
            if let Err(err) = undo {
                clean = false;
                error!(error = %err, "failed to undo a store write during rollback");
            }
        }
        clean
    }

    /// Replaces local state with a fresh read of every table.
    pub async fn refresh(&self) -> Result<(), SyncError> {
        let mut records = Vec::new();
        for table in Table::all() {
            let rows = self
                .store
                .query(*table, &Filter::all())
                .await
                .map_err(|source| SyncError::Persistence {
                    source,
                    compensated: true,
                })?;
            records.extend(rows);
        }
        let fresh = Ledger::from_records(records);
        info!(
            accounts = fresh.accounts.len(),
            friends = fresh.friends.len(),
            transactions = fresh.transactions.len(),
            reminders = fresh.reminders.len(),
            "ledger refreshed from store"
        );
        let mut guard = self.ledger.lock().map_err(|_| SyncError::Poisoned)?;
        *guard = fresh;
        Ok(())
    }
}
