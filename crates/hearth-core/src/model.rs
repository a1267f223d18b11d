use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Tolerance used when comparing derived money values.
pub const MONEY_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Accounts,
    Friends,
    Transactions,
    Reminders,
}

impl Table {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accounts => "accounts",
            Self::Friends => "friends",
            Self::Transactions => "transactions",
            Self::Reminders => "reminders",
        }
    }

    pub fn all() -> &'static [Table] {
        &[
            Self::Accounts,
            Self::Friends,
            Self::Transactions,
            Self::Reminders,
        ]
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "accounts" => Some(Self::Accounts),
            "friends" => Some(Self::Friends),
            "transactions" => Some(Self::Transactions),
            "reminders" => Some(Self::Reminders),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default = "default_account_type")]
    pub kind: String,
    #[serde(default)]
    pub opening_balance: f64,
    pub balance: f64,
    #[serde(default)]
    pub total_inflow: f64,
    #[serde(default)]
    pub total_outflow: f64,
}

fn default_account_type() -> String {
    "bank".to_string()
}

impl Account {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, opening_balance: f64) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            kind: kind.into(),
            opening_balance,
            balance: opening_balance,
            total_inflow: 0.0,
            total_outflow: 0.0,
        }
    }

    /// `balance == opening_balance + total_inflow - total_outflow`.
    pub fn is_balanced(&self) -> bool {
        let expected = self.opening_balance + self.total_inflow - self.total_outflow;
        (self.balance - expected).abs() < MONEY_EPSILON
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Friend {
    pub id: String,
    pub name: String,
    /// Positive: the friend owes the user. Negative: the user owes the friend.
    #[serde(default)]
    pub net_balance: f64,
}

impl Friend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            net_balance: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Expense,
    Income,
    Transfer,
    Split,
    Settlement,
    Subscription,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Expense => "EXPENSE",
            Self::Income => "INCOME",
            Self::Transfer => "TRANSFER",
            Self::Split => "SPLIT",
            Self::Settlement => "SETTLEMENT",
            Self::Subscription => "SUBSCRIPTION",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub amount: f64,
    pub purpose: String,
    pub date: NaiveDate,
    pub kind: TransactionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub participant_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payer_name: Option<String>,
}

impl Transaction {
    pub fn new(
        kind: TransactionKind,
        amount: f64,
        purpose: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            amount,
            purpose: purpose.into(),
            date,
            kind,
            account_id: None,
            to_account_id: None,
            participant_names: Vec::new(),
            payer_name: None,
        }
    }

    pub fn on_account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reminder {
    pub id: String,
    pub title: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<NaiveTime>,
    #[serde(default)]
    pub done: bool,
}

impl Reminder {
    pub fn new(title: impl Into<String>, date: NaiveDate, time: Option<NaiveTime>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            date,
            time,
            done: false,
        }
    }

    pub fn due_label(&self) -> String {
        match self.time {
            Some(time) => format!("{} {}", self.date, time.format("%H:%M")),
            None => self.date.to_string(),
        }
    }
}

/// One persisted row, tagged by the table it lives in.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Account(Account),
    Friend(Friend),
    Transaction(Transaction),
    Reminder(Reminder),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Self::Account(_) => Table::Accounts,
            Self::Friend(_) => Table::Friends,
            Self::Transaction(_) => Table::Transactions,
            Self::Reminder(_) => Table::Reminders,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Account(row) => &row.id,
            Self::Friend(row) => &row.id,
            Self::Transaction(row) => &row.id,
            Self::Reminder(row) => &row.id,
        }
    }

    pub fn key(&self) -> RecordKey {
        RecordKey::new(self.table(), self.id())
    }

    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::Account(row) => serde_json::to_value(row),
            Self::Friend(row) => serde_json::to_value(row),
            Self::Transaction(row) => serde_json::to_value(row),
            Self::Reminder(row) => serde_json::to_value(row),
        }
    }

    pub fn from_value(table: Table, value: Value) -> Result<Self, serde_json::Error> {
        Ok(match table {
            Table::Accounts => Self::Account(serde_json::from_value(value)?),
            Table::Friends => Self::Friend(serde_json::from_value(value)?),
            Table::Transactions => Self::Transaction(serde_json::from_value(value)?),
            Table::Reminders => Self::Reminder(serde_json::from_value(value)?),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub table: Table,
    pub id: String,
}

impl RecordKey {
    pub fn new(table: Table, id: impl Into<String>) -> Self {
        Self {
            table,
            id: id.into(),
        }
    }
}

/// Renders an amount the way replies show it: whole numbers without decimals.
pub fn format_amount(currency_symbol: &str, amount: f64) -> String {
    if (amount - amount.round()).abs() < MONEY_EPSILON {
        format!("{currency_symbol}{}", amount.round() as i64)
    } else {
        format!("{currency_symbol}{amount:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_amount_drops_zero_fraction() {
        assert_eq!(format_amount("₹", 500.0), "₹500");
        assert_eq!(format_amount("$", 12.5), "$12.50");
        assert_eq!(format_amount("$", -3.0), "$-3");
    }

    #[test]
    fn account_type_serializes_as_type_field() {
        let account = Account::new("Cash", "wallet", 1000.0);
        let value = serde_json::to_value(&account).expect("serialize");
        assert_eq!(value["type"], "wallet");
        assert_eq!(value["balance"], 1000.0);
    }

    #[test]
    fn transaction_kind_uses_upper_case_wire_names() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 2).expect("date");
        let tx = Transaction::new(TransactionKind::Subscription, 99.0, "music", date);
        let value = serde_json::to_value(&tx).expect("serialize");
        assert_eq!(value["kind"], "SUBSCRIPTION");
        assert_eq!(value["date"], "2026-01-02");
        assert!(value.get("account_id").is_none());
    }

    #[test]
    fn record_from_value_rejects_wrong_shape() {
        let err = Record::from_value(Table::Accounts, serde_json::json!({"id": "x"}));
        assert!(err.is_err());
    }
}
