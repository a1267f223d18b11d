use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{
    Account, Friend, MONEY_EPSILON, Record, RecordKey, Reminder, Table, Transaction,
    TransactionKind,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("amount must be a finite number")]
    NonFiniteAmount,
    #[error("cannot transfer an account into itself")]
    SameAccount,
    #[error("{0} is already settled")]
    AlreadySettled(String),
    #[error("a split needs at least one participant")]
    NoParticipants,
    #[error("a split you paid for needs an account to pay from")]
    MissingPayerAccount,
    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Payer {
    User,
    Friend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Expense,
    Income,
    Subscription,
    Transfer,
    Split,
    Settlement,
    BalanceOverwrite,
    CreateAccount,
    DeleteAccount,
    CreateFriend,
    DeleteTransaction,
    CreateReminder,
    EditReminder,
    DeleteReminder,
    CompleteReminder,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "EXPENSE",
            Self::Income => "INCOME",
            Self::Subscription => "SUBSCRIPTION",
            Self::Transfer => "TRANSFER",
            Self::Split => "SPLIT",
            Self::Settlement => "SETTLEMENT",
            Self::BalanceOverwrite => "BALANCE_OVERWRITE",
            Self::CreateAccount => "CREATE_ACCOUNT",
            Self::DeleteAccount => "DELETE_ACCOUNT",
            Self::CreateFriend => "CREATE_FRIEND",
            Self::DeleteTransaction => "DELETE_TRANSACTION",
            Self::CreateReminder => "CREATE_REMINDER",
            Self::EditReminder => "EDIT_REMINDER",
            Self::DeleteReminder => "DELETE_REMINDER",
            Self::CompleteReminder => "COMPLETE_REMINDER",
        }
    }
}

/// A requested state change. Money-moving variants carry the id of the
/// transaction they will create so reducing the same mutation twice yields the
/// same records.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    Expense {
        tx_id: String,
        amount: f64,
        account_id: String,
        purpose: String,
        date: NaiveDate,
    },
    Income {
        tx_id: String,
        amount: f64,
        account_id: String,
        purpose: String,
        date: NaiveDate,
    },
    Subscription {
        tx_id: String,
        amount: f64,
        account_id: String,
        purpose: String,
        date: NaiveDate,
    },
    Transfer {
        tx_id: String,
        amount: f64,
        from_account_id: String,
        to_account_id: String,
        purpose: String,
        date: NaiveDate,
    },
    Split {
        tx_id: String,
        amount: f64,
        payer: Payer,
        account_id: Option<String>,
        participant_ids: Vec<String>,
        purpose: String,
        date: NaiveDate,
    },
    Settlement {
        tx_id: String,
        friend_id: String,
        account_id: String,
        date: NaiveDate,
    },
    BalanceOverwrite {
        tx_id: String,
        account_id: String,
        new_balance: f64,
        date: NaiveDate,
    },
    CreateAccount(Account),
    DeleteAccount {
        account_id: String,
    },
    CreateFriend(Friend),
    DeleteTransaction {
        transaction_id: String,
    },
    CreateReminder(Reminder),
    EditReminder {
        reminder_id: String,
        title: Option<String>,
        date: Option<NaiveDate>,
        time: Option<NaiveTime>,
    },
    DeleteReminder {
        reminder_id: String,
    },
    CompleteReminder {
        reminder_id: String,
    },
}

pub fn new_tx_id() -> String {
    Uuid::new_v4().to_string()
}

impl Mutation {
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::Expense { .. } => MutationKind::Expense,
            Self::Income { .. } => MutationKind::Income,
            Self::Subscription { .. } => MutationKind::Subscription,
            Self::Transfer { .. } => MutationKind::Transfer,
            Self::Split { .. } => MutationKind::Split,
            Self::Settlement { .. } => MutationKind::Settlement,
            Self::BalanceOverwrite { .. } => MutationKind::BalanceOverwrite,
            Self::CreateAccount(_) => MutationKind::CreateAccount,
            Self::DeleteAccount { .. } => MutationKind::DeleteAccount,
            Self::CreateFriend(_) => MutationKind::CreateFriend,
            Self::DeleteTransaction { .. } => MutationKind::DeleteTransaction,
            Self::CreateReminder(_) => MutationKind::CreateReminder,
            Self::EditReminder { .. } => MutationKind::EditReminder,
            Self::DeleteReminder { .. } => MutationKind::DeleteReminder,
            Self::CompleteReminder { .. } => MutationKind::CompleteReminder,
        }
    }

    /// Id of the primary entity the mutation acts on.
    pub fn target_id(&self) -> &str {
        match self {
            Self::Expense { account_id, .. }
            | Self::Income { account_id, .. }
            | Self::Subscription { account_id, .. }
            | Self::BalanceOverwrite { account_id, .. }
            | Self::DeleteAccount { account_id } => account_id,
            Self::Transfer {
                from_account_id, ..
            } => from_account_id,
            Self::Split { tx_id, .. } => tx_id,
            Self::Settlement { friend_id, .. } => friend_id,
            Self::CreateAccount(account) => &account.id,
            Self::CreateFriend(friend) => &friend.id,
            Self::DeleteTransaction { transaction_id } => transaction_id,
            Self::CreateReminder(reminder) => &reminder.id,
            Self::EditReminder { reminder_id, .. }
            | Self::DeleteReminder { reminder_id }
            | Self::CompleteReminder { reminder_id } => reminder_id,
        }
    }
}

/// Records the reducer wants written and removed, as one logical unit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Change {
    pub upserts: Vec<Record>,
    pub deletes: Vec<RecordKey>,
}

impl Change {
    fn upsert(mut self, record: Record) -> Self {
        self.upserts.push(record);
        self
    }

    fn delete(mut self, key: RecordKey) -> Self {
        self.deletes.push(key);
        self
    }

    /// Distinct keys touched by the change, upserts first.
    pub fn touched(&self) -> Vec<RecordKey> {
        let mut seen = BTreeSet::new();
        self.upserts
            .iter()
            .map(Record::key)
            .chain(self.deletes.iter().cloned())
            .filter(|key| seen.insert(key.clone()))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }
}

/// In-process copy of every record the front-ends read and mutate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    pub accounts: Vec<Account>,
    pub friends: Vec<Friend>,
    pub transactions: Vec<Transaction>,
    pub reminders: Vec<Reminder>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut ledger = Self::new();
        for record in records {
            ledger.put(record);
        }
        ledger
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|row| row.id == id)
    }

    pub fn friend(&self, id: &str) -> Option<&Friend> {
        self.friends.iter().find(|row| row.id == id)
    }

    pub fn transaction(&self, id: &str) -> Option<&Transaction> {
        self.transactions.iter().find(|row| row.id == id)
    }

    pub fn reminder(&self, id: &str) -> Option<&Reminder> {
        self.reminders.iter().find(|row| row.id == id)
    }

    pub fn records(&self, table: Table) -> Vec<Record> {
        match table {
            Table::Accounts => self.accounts.iter().cloned().map(Record::Account).collect(),
            Table::Friends => self.friends.iter().cloned().map(Record::Friend).collect(),
            Table::Transactions => self
                .transactions
                .iter()
                .cloned()
                .map(Record::Transaction)
                .collect(),
            Table::Reminders => self
                .reminders
                .iter()
                .cloned()
                .map(Record::Reminder)
                .collect(),
        }
    }

    /// Current position and value of a record.
    pub fn get(&self, key: &RecordKey) -> Option<(usize, Record)> {
        let id = key.id.as_str();
        match key.table {
            Table::Accounts => position_of(&self.accounts, |row| row.id == id)
                .map(|idx| (idx, Record::Account(self.accounts[idx].clone()))),
            Table::Friends => position_of(&self.friends, |row| row.id == id)
                .map(|idx| (idx, Record::Friend(self.friends[idx].clone()))),
            Table::Transactions => position_of(&self.transactions, |row| row.id == id)
                .map(|idx| (idx, Record::Transaction(self.transactions[idx].clone()))),
            Table::Reminders => position_of(&self.reminders, |row| row.id == id)
                .map(|idx| (idx, Record::Reminder(self.reminders[idx].clone()))),
        }
    }

    /// Replaces the record in place, or appends it when new.
    pub fn put(&mut self, record: Record) {
        match record {
            Record::Account(row) => put_row(&mut self.accounts, row, |r| r.id.clone()),
            Record::Friend(row) => put_row(&mut self.friends, row, |r| r.id.clone()),
            Record::Transaction(row) => put_row(&mut self.transactions, row, |r| r.id.clone()),
            Record::Reminder(row) => put_row(&mut self.reminders, row, |r| r.id.clone()),
        }
    }

    pub fn remove(&mut self, key: &RecordKey) -> Option<(usize, Record)> {
        let id = key.id.as_str();
        match key.table {
            Table::Accounts => position_of(&self.accounts, |row| row.id == id)
                .map(|idx| (idx, Record::Account(self.accounts.remove(idx)))),
            Table::Friends => position_of(&self.friends, |row| row.id == id)
                .map(|idx| (idx, Record::Friend(self.friends.remove(idx)))),
            Table::Transactions => position_of(&self.transactions, |row| row.id == id)
                .map(|idx| (idx, Record::Transaction(self.transactions.remove(idx)))),
            Table::Reminders => position_of(&self.reminders, |row| row.id == id)
                .map(|idx| (idx, Record::Reminder(self.reminders.remove(idx)))),
        }
    }

    fn insert_at(&mut self, index: usize, record: Record) {
        match record {
            Record::Account(row) => insert_clamped(&mut self.accounts, index, row),
            Record::Friend(row) => insert_clamped(&mut self.friends, index, row),
            Record::Transaction(row) => insert_clamped(&mut self.transactions, index, row),
            Record::Reminder(row) => insert_clamped(&mut self.reminders, index, row),
        }
    }
}

fn position_of<T>(rows: &[T], pred: impl Fn(&T) -> bool) -> Option<usize> {
    rows.iter().position(pred)
}

fn put_row<T>(rows: &mut Vec<T>, row: T, id_of: impl Fn(&T) -> String) {
    let id = id_of(&row);
    match rows.iter().position(|existing| id_of(existing) == id) {
        Some(idx) => rows[idx] = row,
        None => rows.push(row),
    }
}

fn insert_clamped<T>(rows: &mut Vec<T>, index: usize, row: T) {
    let index = index.min(rows.len());
    rows.insert(index, row);
}

/// Prior value and position of every record a change touched.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    entries: Vec<(RecordKey, Option<(usize, Record)>)>,
}

impl Snapshot {
    /// Pre-change values; `None` marks a record the change created.
    pub fn prior(&self) -> impl Iterator<Item = (&RecordKey, Option<&Record>)> {
        self.entries
            .iter()
            .map(|(key, prior)| (key, prior.as_ref().map(|(_, record)| record)))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Snapshot/apply/restore triple used by optimistic application.
pub trait Reconcile {
    type Change;
    type Snapshot;

    fn snapshot(&self, change: &Self::Change) -> Self::Snapshot;
    fn apply(&mut self, change: &Self::Change);
    fn restore(&mut self, snapshot: Self::Snapshot);
}

impl Reconcile for Ledger {
    type Change = Change;
    type Snapshot = Snapshot;

    fn snapshot(&self, change: &Change) -> Snapshot {
        let entries = change
            .touched()
            .into_iter()
            .map(|key| {
                let prior = self.get(&key);
                (key, prior)
            })
            .collect();
        Snapshot { entries }
    }

    fn apply(&mut self, change: &Change) {
        for record in &change.upserts {
            self.put(record.clone());
        }
        for key in &change.deletes {
            self.remove(key);
        }
    }

    fn restore(&mut self, snapshot: Snapshot) {
        for (key, _) in &snapshot.entries {
            self.remove(key);
        }
        // Ascending original positions rebuild the exact pre-change order.
        let mut priors: Vec<(usize, Record)> = snapshot
            .entries
            .into_iter()
            .filter_map(|(_, prior)| prior)
            .collect();
        priors.sort_by_key(|(idx, _)| *idx);
        for (idx, record) in priors {
            self.insert_at(idx, record);
        }
    }
}

fn ensure_amount(amount: f64) -> Result<(), LedgerError> {
    if !amount.is_finite() {
        return Err(LedgerError::NonFiniteAmount);
    }
    if amount <= 0.0 {
        return Err(LedgerError::NonPositiveAmount);
    }
    Ok(())
}

fn find_account<'a>(ledger: &'a Ledger, id: &str) -> Result<&'a Account, LedgerError> {
    ledger.account(id).ok_or_else(|| LedgerError::NotFound {
        entity: "account",
        id: id.to_string(),
    })
}

fn find_friend<'a>(ledger: &'a Ledger, id: &str) -> Result<&'a Friend, LedgerError> {
    ledger.friend(id).ok_or_else(|| LedgerError::NotFound {
        entity: "friend",
        id: id.to_string(),
    })
}

fn find_reminder<'a>(ledger: &'a Ledger, id: &str) -> Result<&'a Reminder, LedgerError> {
    ledger.reminder(id).ok_or_else(|| LedgerError::NotFound {
        entity: "reminder",
        id: id.to_string(),
    })
}

fn credit(account: &mut Account, amount: f64) {
    account.balance += amount;
    account.total_inflow += amount;
}

fn debit(account: &mut Account, amount: f64) {
    account.balance -= amount;
    account.total_outflow += amount;
}

struct Entry<'a> {
    kind: TransactionKind,
    tx_id: &'a str,
    amount: f64,
    account_id: &'a str,
    purpose: &'a str,
    date: NaiveDate,
}

fn reduce_entry(ledger: &Ledger, entry: Entry<'_>) -> Result<Change, LedgerError> {
    ensure_amount(entry.amount)?;
    let mut account = find_account(ledger, entry.account_id)?.clone();
    match entry.kind {
        TransactionKind::Income => credit(&mut account, entry.amount),
        _ => debit(&mut account, entry.amount),
    }
    let mut tx = Transaction::new(entry.kind, entry.amount, entry.purpose, entry.date)
        .on_account(account.id.clone());
    tx.id = entry.tx_id.to_string();
    Ok(Change::default()
        .upsert(Record::Account(account))
        .upsert(Record::Transaction(tx)))
}

/// Computes the records a mutation produces without touching `ledger`.
pub fn reduce(ledger: &Ledger, mutation: &Mutation) -> Result<Change, LedgerError> {
    match mutation {
        Mutation::Expense {
            tx_id,
            amount,
            account_id,
            purpose,
            date,
        } => reduce_entry(
            ledger,
            Entry {
                kind: TransactionKind::Expense,
                tx_id,
                amount: *amount,
                account_id,
                purpose,
                date: *date,
            },
        ),
        Mutation::Income {
            tx_id,
            amount,
            account_id,
            purpose,
            date,
        } => reduce_entry(
            ledger,
            Entry {
                kind: TransactionKind::Income,
                tx_id,
                amount: *amount,
                account_id,
                purpose,
                date: *date,
            },
        ),
        Mutation::Subscription {
            tx_id,
            amount,
            account_id,
            purpose,
            date,
        } => reduce_entry(
            ledger,
            Entry {
                kind: TransactionKind::Subscription,
                tx_id,
                amount: *amount,
                account_id,
                purpose,
                date: *date,
            },
        ),
        Mutation::Transfer {
            tx_id,
            amount,
            from_account_id,
            to_account_id,
            purpose,
            date,
        } => {
            ensure_amount(*amount)?;
            if from_account_id == to_account_id {
                return Err(LedgerError::SameAccount);
            }
            let mut from = find_account(ledger, from_account_id)?.clone();
            let mut to = find_account(ledger, to_account_id)?.clone();
            debit(&mut from, *amount);
            credit(&mut to, *amount);
            let mut tx =
                Transaction::new(TransactionKind::Transfer, *amount, purpose.clone(), *date)
                    .on_account(from.id.clone());
            tx.id = tx_id.clone();
            tx.to_account_id = Some(to.id.clone());
            Ok(Change::default()
                .upsert(Record::Account(from))
                .upsert(Record::Account(to))
                .upsert(Record::Transaction(tx)))
        }
        Mutation::Split {
            tx_id,
            amount,
            payer,
            account_id,
            participant_ids,
            purpose,
            date,
        } => reduce_split(
            ledger,
            SplitRequest {
                tx_id,
                amount: *amount,
                payer,
                account_id: account_id.as_deref(),
                participant_ids,
                purpose,
                date: *date,
            },
        ),
        Mutation::Settlement {
            tx_id,
            friend_id,
            account_id,
            date,
        } => {
            let mut friend = find_friend(ledger, friend_id)?.clone();
            let mut account = find_account(ledger, account_id)?.clone();
            let net = friend.net_balance;
            if net.abs() < MONEY_EPSILON {
                return Err(LedgerError::AlreadySettled(friend.name));
            }
            let settled = net.abs();
            let payer_name = if net > 0.0 {
                credit(&mut account, settled);
                friend.name.clone()
            } else {
                debit(&mut account, settled);
                "me".to_string()
            };
            friend.net_balance = 0.0;
            let mut tx = Transaction::new(
                TransactionKind::Settlement,
                settled,
                format!("Settlement with {}", friend.name),
                *date,
            )
            .on_account(account.id.clone());
            tx.id = tx_id.clone();
            tx.payer_name = Some(payer_name);
            tx.participant_names = vec![friend.name.clone()];
            Ok(Change::default()
                .upsert(Record::Account(account))
                .upsert(Record::Friend(friend))
                .upsert(Record::Transaction(tx)))
        }
        Mutation::BalanceOverwrite {
            tx_id,
            account_id,
            new_balance,
            date,
        } => {
            if !new_balance.is_finite() {
                return Err(LedgerError::NonFiniteAmount);
            }
            let mut account = find_account(ledger, account_id)?.clone();
            let delta = new_balance - account.balance;
            let mut change = Change::default();
            if delta.abs() >= MONEY_EPSILON {
                let kind = if delta > 0.0 {
                    credit(&mut account, delta);
                    TransactionKind::Income
                } else {
                    debit(&mut account, -delta);
                    TransactionKind::Expense
                };
                let mut tx = Transaction::new(kind, delta.abs(), "Balance adjustment", *date)
                    .on_account(account.id.clone());
                tx.id = tx_id.clone();
                change = change.upsert(Record::Transaction(tx));
            }
            account.balance = *new_balance;
            change.upserts.insert(0, Record::Account(account));
            Ok(change)
        }
        Mutation::CreateAccount(account) => {
            if account.name.trim().is_empty() {
                return Err(LedgerError::Invalid("account name cannot be empty".to_string()));
            }
            if ledger.account(&account.id).is_some() {
                return Err(LedgerError::Invalid(format!(
                    "account {} already exists",
                    account.id
                )));
            }
            Ok(Change::default().upsert(Record::Account(account.clone())))
        }
        Mutation::DeleteAccount { account_id } => {
            let account = find_account(ledger, account_id)?;
            Ok(Change::default().delete(RecordKey::new(Table::Accounts, account.id.clone())))
        }
        Mutation::CreateFriend(friend) => {
            if friend.name.trim().is_empty() {
                return Err(LedgerError::Invalid("friend name cannot be empty".to_string()));
            }
            if ledger.friend(&friend.id).is_some() {
                return Err(LedgerError::Invalid(format!(
                    "friend {} already exists",
                    friend.id
                )));
            }
            Ok(Change::default().upsert(Record::Friend(friend.clone())))
        }
        Mutation::DeleteTransaction { transaction_id } => {
            // Balances keep the effect of the deleted transaction.
            let tx = ledger
                .transaction(transaction_id)
                .ok_or_else(|| LedgerError::NotFound {
                    entity: "transaction",
                    id: transaction_id.clone(),
                })?;
            Ok(Change::default().delete(RecordKey::new(Table::Transactions, tx.id.clone())))
        }
        Mutation::CreateReminder(reminder) => {
            if reminder.title.trim().is_empty() {
                return Err(LedgerError::Invalid("reminder title cannot be empty".to_string()));
            }
            Ok(Change::default().upsert(Record::Reminder(reminder.clone())))
        }
        Mutation::EditReminder {
            reminder_id,
            title,
            date,
            time,
        } => {
            let mut reminder = find_reminder(ledger, reminder_id)?.clone();
            if title.is_none() && date.is_none() && time.is_none() {
                return Err(LedgerError::Invalid("nothing to change".to_string()));
            }
            if let Some(title) = title {
                if title.trim().is_empty() {
                    return Err(LedgerError::Invalid(
                        "reminder title cannot be empty".to_string(),
                    ));
                }
                reminder.title = title.trim().to_string();
            }
            if let Some(date) = date {
                reminder.date = *date;
                reminder.done = false;
            }
            if let Some(time) = time {
                reminder.time = Some(*time);
                reminder.done = false;
            }
            Ok(Change::default().upsert(Record::Reminder(reminder)))
        }
        Mutation::DeleteReminder { reminder_id } => {
            let reminder = find_reminder(ledger, reminder_id)?;
            Ok(Change::default().delete(RecordKey::new(Table::Reminders, reminder.id.clone())))
        }
        Mutation::CompleteReminder { reminder_id } => {
            let mut reminder = find_reminder(ledger, reminder_id)?.clone();
            reminder.done = true;
            Ok(Change::default().upsert(Record::Reminder(reminder)))
        }
    }
}

struct SplitRequest<'a> {
    tx_id: &'a str,
    amount: f64,
    payer: &'a Payer,
    account_id: Option<&'a str>,
    participant_ids: &'a [String],
    purpose: &'a str,
    date: NaiveDate,
}

fn reduce_split(ledger: &Ledger, req: SplitRequest<'_>) -> Result<Change, LedgerError> {
    ensure_amount(req.amount)?;
    if req.participant_ids.is_empty() {
        return Err(LedgerError::NoParticipants);
    }
    let distinct: BTreeSet<&str> = req.participant_ids.iter().map(String::as_str).collect();
    if distinct.len() != req.participant_ids.len() {
        return Err(LedgerError::Invalid(
            "a participant is listed more than once".to_string(),
        ));
    }
    let share = split_share(req.amount, req.participant_ids.len());
    let participants = req
        .participant_ids
        .iter()
        .map(|id| find_friend(ledger, id).cloned())
        .collect::<Result<Vec<_>, _>>()?;
    let participant_names = participants.iter().map(|f| f.name.clone()).collect();

    let mut change = Change::default();
    let mut tx = Transaction::new(TransactionKind::Split, req.amount, req.purpose, req.date);
    tx.id = req.tx_id.to_string();
    tx.participant_names = participant_names;

    match req.payer {
        Payer::User => {
            let account_id = req.account_id.ok_or(LedgerError::MissingPayerAccount)?;
            let mut account = find_account(ledger, account_id)?.clone();
            debit(&mut account, req.amount);
            tx.account_id = Some(account.id.clone());
            tx.payer_name = Some("me".to_string());
            change = change.upsert(Record::Account(account));
            for mut friend in participants {
                friend.net_balance += share;
                change = change.upsert(Record::Friend(friend));
            }
        }
        Payer::Friend(friend_id) => {
            let mut payer = find_friend(ledger, friend_id)?.clone();
            payer.net_balance -= req.amount - share;
            tx.payer_name = Some(payer.name.clone());
            change = change.upsert(Record::Friend(payer));
        }
    }
    Ok(change.upsert(Record::Transaction(tx)))
}

/// Equal share of `amount` across `participants` plus the user.
pub fn split_share(amount: f64, participants: usize) -> f64 {
    amount / (participants as f64 + 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 1).expect("date")
    }

    fn ledger_with(accounts: &[(&str, f64)], friends: &[(&str, f64)]) -> Ledger {
        let mut ledger = Ledger::new();
        for (name, balance) in accounts {
            ledger.accounts.push(Account::new(*name, "bank", *balance));
        }
        for (name, net) in friends {
            let mut friend = Friend::new(*name);
            friend.net_balance = *net;
            ledger.friends.push(friend);
        }
        ledger
    }

    fn apply(ledger: &mut Ledger, mutation: &Mutation) -> Change {
        let change = reduce(ledger, mutation).expect("reduce");
        ledger.apply(&change);
        change
    }

    #[test]
    fn expense_debits_balance_and_outflow() {
        let mut ledger = ledger_with(&[("Cash", 1000.0)], &[]);
        let id = ledger.accounts[0].id.clone();
        let change = apply(
            &mut ledger,
            &Mutation::Expense {
                tx_id: new_tx_id(),
                amount: 500.0,
                account_id: id.clone(),
                purpose: "lunch".to_string(),
                date: day(),
            },
        );
        let account = ledger.account(&id).expect("account");
        assert_eq!(account.balance, 500.0);
        assert_eq!(account.total_outflow, 500.0);
        assert!(account.is_balanced());
        assert_eq!(change.upserts.len(), 2);
        assert_eq!(ledger.transactions[0].kind, TransactionKind::Expense);
    }

    #[test]
    fn income_credits_balance_and_inflow() {
        let mut ledger = ledger_with(&[("Bank", 10.0)], &[]);
        let id = ledger.accounts[0].id.clone();
        apply(
            &mut ledger,
            &Mutation::Income {
                tx_id: new_tx_id(),
                amount: 90.0,
                account_id: id.clone(),
                purpose: "salary".to_string(),
                date: day(),
            },
        );
        let account = ledger.account(&id).expect("account");
        assert_eq!(account.balance, 100.0);
        assert_eq!(account.total_inflow, 90.0);
        assert!(account.is_balanced());
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let ledger = ledger_with(&[("Cash", 1000.0)], &[]);
        let err = reduce(
            &ledger,
            &Mutation::Expense {
                tx_id: new_tx_id(),
                amount: 0.0,
                account_id: ledger.accounts[0].id.clone(),
                purpose: "x".to_string(),
                date: day(),
            },
        )
        .expect_err("must reject");
        assert_eq!(err, LedgerError::NonPositiveAmount);
    }

    #[test]
    fn transfer_conserves_combined_balance() {
        let mut ledger = ledger_with(&[("A", 700.0), ("B", 50.0)], &[]);
        let a = ledger.accounts[0].id.clone();
        let b = ledger.accounts[1].id.clone();
        let before = ledger.account(&a).unwrap().balance + ledger.account(&b).unwrap().balance;
        apply(
            &mut ledger,
            &Mutation::Transfer {
                tx_id: new_tx_id(),
                amount: 123.45,
                from_account_id: a.clone(),
                to_account_id: b.clone(),
                purpose: "move".to_string(),
                date: day(),
            },
        );
        let after = ledger.account(&a).unwrap().balance + ledger.account(&b).unwrap().balance;
        assert!((before - after).abs() < MONEY_EPSILON);
        assert!(ledger.accounts.iter().all(Account::is_balanced));
    }

    #[test]
    fn transfer_into_same_account_is_rejected() {
        let ledger = ledger_with(&[("A", 700.0)], &[]);
        let a = ledger.accounts[0].id.clone();
        let err = reduce(
            &ledger,
            &Mutation::Transfer {
                tx_id: new_tx_id(),
                amount: 1.0,
                from_account_id: a.clone(),
                to_account_id: a,
                purpose: "loop".to_string(),
                date: day(),
            },
        )
        .expect_err("same account");
        assert_eq!(err, LedgerError::SameAccount);
    }

    #[test]
    fn split_paid_by_user_credits_each_participant_one_share() {
        let mut ledger = ledger_with(&[("Card", 2000.0)], &[("Asha", 0.0), ("Ben", 10.0)]);
        let card = ledger.accounts[0].id.clone();
        let ids: Vec<String> = ledger.friends.iter().map(|f| f.id.clone()).collect();
        apply(
            &mut ledger,
            &Mutation::Split {
                tx_id: new_tx_id(),
                amount: 900.0,
                payer: Payer::User,
                account_id: Some(card.clone()),
                participant_ids: ids.clone(),
                purpose: "dinner".to_string(),
                date: day(),
            },
        );
        let share = split_share(900.0, 2);
        assert!((share - 300.0).abs() < MONEY_EPSILON);
        assert_eq!(ledger.account(&card).unwrap().balance, 1100.0);
        assert_eq!(ledger.friend(&ids[0]).unwrap().net_balance, 300.0);
        assert_eq!(ledger.friend(&ids[1]).unwrap().net_balance, 310.0);
        let tx = &ledger.transactions[0];
        assert_eq!(tx.participant_names, vec!["Asha", "Ben"]);
        assert_eq!(tx.payer_name.as_deref(), Some("me"));
    }

    #[test]
    fn split_shares_sum_to_amount() {
        for participants in 1..=7 {
            let amount = 1000.0 / 3.0;
            let share = split_share(amount, participants);
            let total = share * participants as f64 + share;
            assert!((total - amount).abs() < MONEY_EPSILON);
        }
    }

    #[test]
    fn split_paid_by_friend_debits_payer_only() {
        let mut ledger = ledger_with(&[], &[("Asha", 0.0), ("Ben", 0.0)]);
        let asha = ledger.friends[0].id.clone();
        let ben = ledger.friends[1].id.clone();
        apply(
            &mut ledger,
            &Mutation::Split {
                tx_id: new_tx_id(),
                amount: 600.0,
                payer: Payer::Friend(asha.clone()),
                account_id: None,
                participant_ids: vec![ben.clone()],
                purpose: "cab".to_string(),
                date: day(),
            },
        );
        assert_eq!(ledger.friend(&asha).unwrap().net_balance, -300.0);
        assert_eq!(ledger.friend(&ben).unwrap().net_balance, 0.0);
        assert!(ledger.transactions[0].account_id.is_none());
    }

    #[test]
    fn split_without_account_for_user_payer_is_rejected() {
        let ledger = ledger_with(&[], &[("Asha", 0.0)]);
        let err = reduce(
            &ledger,
            &Mutation::Split {
                tx_id: new_tx_id(),
                amount: 10.0,
                payer: Payer::User,
                account_id: None,
                participant_ids: vec![ledger.friends[0].id.clone()],
                purpose: "x".to_string(),
                date: day(),
            },
        )
        .expect_err("needs account");
        assert_eq!(err, LedgerError::MissingPayerAccount);
    }

    #[test]
    fn settlement_zeroes_friend_in_both_directions() {
        let mut ledger = ledger_with(&[("Cash", 100.0)], &[("Owes me", 40.0), ("I owe", -25.0)]);
        let cash = ledger.accounts[0].id.clone();
        let owes_me = ledger.friends[0].id.clone();
        let i_owe = ledger.friends[1].id.clone();
        for friend_id in [&owes_me, &i_owe] {
            apply(
                &mut ledger,
                &Mutation::Settlement {
                    tx_id: new_tx_id(),
                    friend_id: friend_id.clone(),
                    account_id: cash.clone(),
                    date: day(),
                },
            );
        }
        let account = ledger.account(&cash).unwrap();
        assert_eq!(account.balance, 115.0);
        assert_eq!(account.total_inflow, 40.0);
        assert_eq!(account.total_outflow, 25.0);
        assert!(ledger.friends.iter().all(|f| f.net_balance == 0.0));
    }

    #[test]
    fn settling_a_settled_friend_is_rejected() {
        let ledger = ledger_with(&[("Cash", 100.0)], &[("Even", 0.0)]);
        let err = reduce(
            &ledger,
            &Mutation::Settlement {
                tx_id: new_tx_id(),
                friend_id: ledger.friends[0].id.clone(),
                account_id: ledger.accounts[0].id.clone(),
                date: day(),
            },
        )
        .expect_err("settled");
        assert_eq!(err, LedgerError::AlreadySettled("Even".to_string()));
    }

    #[test]
    fn balance_overwrite_records_adjustment_transaction() {
        let mut ledger = ledger_with(&[("Bank", 1000.0)], &[]);
        let id = ledger.accounts[0].id.clone();
        apply(
            &mut ledger,
            &Mutation::BalanceOverwrite {
                tx_id: new_tx_id(),
                account_id: id.clone(),
                new_balance: 850.0,
                date: day(),
            },
        );
        let account = ledger.account(&id).unwrap();
        assert_eq!(account.balance, 850.0);
        assert!(account.is_balanced());
        let tx = &ledger.transactions[0];
        assert_eq!(tx.kind, TransactionKind::Expense);
        assert_eq!(tx.amount, 150.0);
        assert_eq!(tx.purpose, "Balance adjustment");
    }

    #[test]
    fn balance_overwrite_to_same_value_records_nothing() {
        let ledger = ledger_with(&[("Bank", 1000.0)], &[]);
        let change = reduce(
            &ledger,
            &Mutation::BalanceOverwrite {
                tx_id: new_tx_id(),
                account_id: ledger.accounts[0].id.clone(),
                new_balance: 1000.0,
                date: day(),
            },
        )
        .expect("reduce");
        assert_eq!(change.upserts.len(), 1);
    }

    #[test]
    fn delete_transaction_keeps_account_balance() {
        let mut ledger = ledger_with(&[("Cash", 1000.0)], &[]);
        let id = ledger.accounts[0].id.clone();
        apply(
            &mut ledger,
            &Mutation::Expense {
                tx_id: new_tx_id(),
                amount: 200.0,
                account_id: id.clone(),
                purpose: "shoes".to_string(),
                date: day(),
            },
        );
        let tx_id = ledger.transactions[0].id.clone();
        apply(
            &mut ledger,
            &Mutation::DeleteTransaction {
                transaction_id: tx_id,
            },
        );
        assert!(ledger.transactions.is_empty());
        assert_eq!(ledger.account(&id).unwrap().balance, 800.0);
    }

    #[test]
    fn edit_reminder_requires_a_change() {
        let mut ledger = Ledger::new();
        ledger.reminders.push(Reminder::new("Pay Rent", day(), None));
        let err = reduce(
            &ledger,
            &Mutation::EditReminder {
                reminder_id: ledger.reminders[0].id.clone(),
                title: None,
                date: None,
                time: None,
            },
        )
        .expect_err("no-op edit");
        assert!(matches!(err, LedgerError::Invalid(_)));
    }

    #[test]
    fn restore_rebuilds_exact_order_after_delete_and_create() {
        let mut ledger = ledger_with(&[("A", 1.0), ("B", 2.0), ("C", 3.0)], &[]);
        let original = ledger.clone();
        let b = ledger.accounts[1].id.clone();
        let mut change = reduce(&ledger, &Mutation::DeleteAccount { account_id: b }).unwrap();
        change
            .upserts
            .push(Record::Account(Account::new("D", "bank", 4.0)));
        let snapshot = ledger.snapshot(&change);
        ledger.apply(&change);
        assert_eq!(ledger.accounts.len(), 3);
        assert_eq!(ledger.accounts[2].name, "D");
        ledger.restore(snapshot);
        assert_eq!(ledger, original);
    }

    #[test]
    fn reduce_is_pure() {
        let ledger = ledger_with(&[("Cash", 1000.0)], &[]);
        let before = ledger.clone();
        let mutation = Mutation::Expense {
            tx_id: "fixed".to_string(),
            amount: 1.0,
            account_id: ledger.accounts[0].id.clone(),
            purpose: "gum".to_string(),
            date: day(),
        };
        let first = reduce(&ledger, &mutation).unwrap();
        let second = reduce(&ledger, &mutation).unwrap();
        assert_eq!(first, second);
        assert_eq!(ledger, before);
    }
}
