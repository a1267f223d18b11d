use std::collections::BTreeMap;

use chrono::{Days, NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    AddExpense,
    AddIncome,
    AddSubscription,
    Transfer,
    SplitBill,
    SettleFriend,
    SetBalance,
    AddAccount,
    DeleteAccount,
    ListAccounts,
    AddFriend,
    ListFriends,
    ListTransactions,
    DeleteTransaction,
    AddReminder,
    ListReminders,
    EditReminder,
    DeleteReminder,
    CompleteReminder,
    Chat,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AddExpense => "ADD_EXPENSE",
            Self::AddIncome => "ADD_INCOME",
            Self::AddSubscription => "ADD_SUBSCRIPTION",
            Self::Transfer => "TRANSFER",
            Self::SplitBill => "SPLIT_BILL",
            Self::SettleFriend => "SETTLE_FRIEND",
            Self::SetBalance => "SET_BALANCE",
            Self::AddAccount => "ADD_ACCOUNT",
            Self::DeleteAccount => "DELETE_ACCOUNT",
            Self::ListAccounts => "LIST_ACCOUNTS",
            Self::AddFriend => "ADD_FRIEND",
            Self::ListFriends => "LIST_FRIENDS",
            Self::ListTransactions => "LIST_TRANSACTIONS",
            Self::DeleteTransaction => "DELETE_TRANSACTION",
            Self::AddReminder => "ADD_REMINDER",
            Self::ListReminders => "LIST_REMINDERS",
            Self::EditReminder => "EDIT_REMINDER",
            Self::DeleteReminder => "DELETE_REMINDER",
            Self::CompleteReminder => "COMPLETE_REMINDER",
            Self::Chat => "CHAT",
        }
    }
}

/// Structured request produced by a decoder or a finished dialogue.
///
/// `fields` may be missing any key; handlers degrade to a clarification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
    #[serde(default, alias = "targetHint", skip_serializing_if = "Option::is_none")]
    pub target_hint: Option<String>,
    #[serde(default, alias = "replyText", skip_serializing_if = "Option::is_none")]
    pub reply_text: Option<String>,
}

impl Intent {
    pub fn new(kind: IntentKind) -> Self {
        Self {
            kind,
            fields: BTreeMap::new(),
            target_hint: None,
            reply_text: None,
        }
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn with_target_hint(mut self, hint: impl Into<String>) -> Self {
        let hint = hint.into();
        let trimmed = hint.trim();
        self.target_hint = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    pub fn with_reply_text(mut self, text: impl Into<String>) -> Self {
        self.reply_text = Some(text.into());
        self
    }

    pub fn has(&self, key: &str) -> bool {
        match self.fields.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(text)) => !text.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    /// Non-empty trimmed string field.
    pub fn text(&self, key: &str) -> Option<&str> {
        match self.fields.get(key) {
            Some(Value::String(text)) => {
                let trimmed = text.trim();
                (!trimmed.is_empty()).then_some(trimmed)
            }
            _ => None,
        }
    }

    /// Numeric field; numeric strings such as `"₹1,200"` are accepted.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.fields.get(key) {
            Some(Value::Number(number)) => number.as_f64().filter(|v| v.is_finite()),
            Some(Value::String(text)) => parse_amount(text),
            _ => None,
        }
    }

    /// List field, accepting either a JSON array of strings or a comma separated string.
    pub fn list(&self, key: &str) -> Vec<String> {
        let raw: Vec<String> = match self.fields.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(text)) => text.split(',').map(str::to_string).collect(),
            _ => Vec::new(),
        };
        raw.into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    }

    pub fn date(&self, key: &str, today: NaiveDate) -> Option<NaiveDate> {
        self.text(key).and_then(|raw| parse_date(raw, today))
    }

    pub fn time(&self, key: &str) -> Option<NaiveTime> {
        self.text(key).and_then(parse_time)
    }

    /// Explicit hint for a named field, falling back to the intent-wide target hint.
    pub fn hint_for<'a>(&'a self, key: &str) -> Option<&'a str> {
        self.text(key).or(self.target_hint.as_deref())
    }
}

/// Parses a user-typed amount, tolerating a leading currency symbol and separators.
pub fn parse_amount(input: &str) -> Option<f64> {
    let trimmed = input
        .trim()
        .trim_start_matches(|c: char| !(c.is_ascii_digit() || c == '-' || c == '.'));
    let cleaned: String = trimmed
        .chars()
        .filter(|c| *c != ',' && *c != '_' && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|value| value.is_finite())
}

pub fn parse_date(input: &str, today: NaiveDate) -> Option<NaiveDate> {
    match input.trim().to_lowercase().as_str() {
        "today" => Some(today),
        "tomorrow" => today.checked_add_days(Days::new(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").ok(),
    }
}

pub fn parse_time(input: &str) -> Option<NaiveTime> {
    let trimmed = input.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .ok()
}
