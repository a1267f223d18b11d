use std::time::Duration;

use async_trait::async_trait;
use hearth_common::DecoderConfig;
use hearth_core::{Intent, IntentKind, parse_amount};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("decoder request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("decoder returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("decoder api key is not a valid header value")]
    InvalidKey,
}

/// Turns free text into a structured intent.
#[async_trait]
pub trait IntentDecoder: Send + Sync {
    async fn decode(&self, text: &str) -> Result<Intent, DecodeError>;

    fn name(&self) -> &'static str;
}

/// Decoder backed by an HTTP service that answers `{"text": ...}` with an intent.
pub struct HttpIntentDecoder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpIntentDecoder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, DecodeError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        })
    }

    /// `None` when no endpoint is configured. The api key is read from the
    /// environment variable named in `api_key_env`.
    pub fn from_config(config: &DecoderConfig) -> Result<Option<Self>, DecodeError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|endpoint| !endpoint.is_empty());
        let Some(endpoint) = endpoint else {
            return Ok(None);
        };
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.trim().is_empty());
        Self::new(endpoint, api_key, Duration::from_millis(config.timeout_ms)).map(Some)
    }
}

#[async_trait]
impl IntentDecoder for HttpIntentDecoder {
    async fn decode(&self, text: &str) -> Result<Intent, DecodeError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "text": text }));
        if let Some(key) = &self.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| DecodeError::InvalidKey)?;
            request = request.header(AUTHORIZATION, value);
        }
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(DecodeError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let intent: Intent = resp.json().await?;
        debug!(kind = intent.kind.as_str(), "decoded intent over http");
        Ok(intent)
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// Offline decoder for a handful of fixed phrasings. Anything else becomes a
/// chat reply.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordDecoder;

#[async_trait]
impl IntentDecoder for KeywordDecoder {
    async fn decode(&self, text: &str) -> Result<Intent, DecodeError> {
        Ok(decode_keywords(text))
    }

    fn name(&self) -> &'static str {
        "keyword"
    }
}

const HELP_REPLY: &str = "I can log expenses, income, transfers, splits and reminders. \
Try \"spent 200 on lunch\", \"transfer 500 from Bank to Cash\" \
or \"remind me to pay rent tomorrow\".";

pub fn decode_keywords(text: &str) -> Intent {
    let words: Vec<&str> = text.split_whitespace().collect();
    let lower: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let lw: Vec<&str> = lower.iter().map(String::as_str).collect();
    let rest = |from: usize| words.get(from..).map(|w| w.join(" ")).unwrap_or_default();
    let between = |from: usize, to: usize| {
        words
            .get(from..to.min(words.len()))
            .map(|w| w.join(" "))
            .unwrap_or_default()
    };
    let find = |word: &str, after: usize| {
        lw.iter()
            .skip(after)
            .position(|w| *w == word)
            .map(|idx| idx + after)
    };

    match lw.as_slice() {
        ["spent" | "paid", amount, ..] => {
            let mut intent = Intent::new(IntentKind::AddExpense);
            if let Some(value) = parse_amount(amount) {
                intent = intent.with_field("amount", value);
            }
            let from_at = find("from", 2);
            if let Some(on) = find("on", 2).or_else(|| find("for", 2)) {
                let end = from_at.filter(|f| *f > on).unwrap_or(words.len());
                intent = intent.with_field("purpose", between(on + 1, end));
            }
            if let Some(from) = from_at {
                intent = intent.with_field("account", rest(from + 1));
            }
            intent
        }
        ["earned" | "received" | "got", amount, ..] if parse_amount(amount).is_some() => {
            let mut intent = Intent::new(IntentKind::AddIncome)
                .with_field("amount", parse_amount(amount).unwrap_or_default());
            if let Some(idx) = find("from", 2).or_else(|| find("for", 2)) {
                intent = intent.with_field("purpose", rest(idx + 1));
            }
            intent
        }
        ["subscribed" | "subscription", ..] => {
            let amount_at = lw.iter().position(|w| parse_amount(w).is_some());
            let mut intent = Intent::new(IntentKind::AddSubscription);
            if let Some(idx) = amount_at {
                intent = intent.with_field("amount", parse_amount(lw[idx]).unwrap_or_default());
            }
            if let Some(idx) = find("to", 1).or_else(|| find("for", 1)) {
                intent = intent.with_field("purpose", rest(idx + 1));
            }
            intent
        }
        ["transfer" | "move", amount, ..] => {
            let mut intent = Intent::new(IntentKind::Transfer);
            if let Some(value) = parse_amount(amount) {
                intent = intent.with_field("amount", value);
            }
            let from = find("from", 2);
            let to = find("to", 2);
            if let (Some(from), Some(to)) = (from, to) {
                if from < to {
                    intent = intent
                        .with_field("from", between(from + 1, to))
                        .with_field("to", rest(to + 1));
                } else {
                    intent = intent
                        .with_field("to", between(to + 1, from))
                        .with_field("from", rest(from + 1));
                }
            }
            intent
        }
        ["split", amount, ..] if parse_amount(amount).is_some() => {
            let mut intent = Intent::new(IntentKind::SplitBill)
                .with_field("amount", parse_amount(amount).unwrap_or_default());
            let purpose_at = find("for", 2);
            if let Some(with) = find("with", 2) {
                let end = purpose_at.filter(|p| *p > with).unwrap_or(words.len());
                let names: Vec<String> = between(with + 1, end)
                    .replace(" and ", ",")
                    .split(',')
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .collect();
                intent = intent.with_field("participants", names);
            }
            if let Some(idx) = purpose_at {
                intent = intent.with_field("purpose", rest(idx + 1));
            }
            intent
        }
        ["settle", "up", "with", ..] => {
            Intent::new(IntentKind::SettleFriend).with_target_hint(rest(3))
        }
        ["settle", "with", ..] => Intent::new(IntentKind::SettleFriend).with_target_hint(rest(2)),
        ["set", .., "balance", "to", value] => {
            let balance_at = lw.len() - 3;
            let mut intent = Intent::new(IntentKind::SetBalance)
                .with_target_hint(between(1, balance_at));
            if let Some(balance) = parse_amount(value) {
                intent = intent.with_field("balance", balance);
            }
            intent
        }
        ["add", "account", ..] => {
            let mut name_end = words.len();
            let mut intent = Intent::new(IntentKind::AddAccount);
            if let Some(last) = lw.last().and_then(|w| parse_amount(w)) {
                if words.len() > 3 {
                    intent = intent.with_field("balance", last);
                    name_end -= 1;
                }
            }
            intent.with_field("name", between(2, name_end))
        }
        ["delete" | "remove", "account", ..] => {
            Intent::new(IntentKind::DeleteAccount).with_target_hint(rest(2))
        }
        ["add", "friend", ..] => Intent::new(IntentKind::AddFriend).with_field("name", rest(2)),
        ["delete" | "remove", "transaction", ..] => {
            Intent::new(IntentKind::DeleteTransaction).with_target_hint(rest(2))
        }
        ["delete" | "remove", "reminder", ..] => {
            Intent::new(IntentKind::DeleteReminder).with_target_hint(rest(2))
        }
        ["delete" | "remove", .., "reminder"] => {
            let start = if lw.get(1) == Some(&"the") { 2 } else { 1 };
            Intent::new(IntentKind::DeleteReminder)
                .with_target_hint(between(start, words.len() - 1))
        }
        ["done" | "completed" | "finished", ..] => {
            Intent::new(IntentKind::CompleteReminder).with_target_hint(rest(1))
        }
        ["remind", "me", "to", ..] => decode_reminder(&words, &lw),
        ["list" | "show", "accounts" | "balances"] | ["accounts" | "balances"] => {
            Intent::new(IntentKind::ListAccounts)
        }
        ["list" | "show", "friends"] | ["friends"] => Intent::new(IntentKind::ListFriends),
        ["list" | "show", "transactions"] | ["transactions" | "history"] => {
            Intent::new(IntentKind::ListTransactions)
        }
        ["list" | "show", "reminders"] | ["reminders"] => Intent::new(IntentKind::ListReminders),
        _ => Intent::new(IntentKind::Chat).with_reply_text(HELP_REPLY),
    }
}

fn decode_reminder(words: &[&str], lw: &[&str]) -> Intent {
    let mut end = words.len();
    let mut intent = Intent::new(IntentKind::AddReminder);
    if end >= 2 && lw[end - 2] == "at" {
        intent = intent.with_field("time", words[end - 1]);
        end -= 2;
    }
    if end >= 4 && matches!(lw[end - 1], "today" | "tomorrow") {
        intent = intent.with_field("date", lw[end - 1]);
        end -= 1;
    } else if end >= 5 && lw[end - 2] == "on" {
        intent = intent.with_field("date", words[end - 1]);
        end -= 2;
    }
    let title = words.get(3..end).map(|w| w.join(" ")).unwrap_or_default();
    intent.with_field("title", title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    #[test]
    fn spent_phrase_becomes_expense_without_account_hint() {
        let intent = decode_keywords("spent 500 on lunch");
        assert_eq!(intent.kind, IntentKind::AddExpense);
        assert_eq!(intent.number("amount"), Some(500.0));
        assert_eq!(intent.text("purpose"), Some("lunch"));
        assert!(!intent.has("account"));
    }

    #[test]
    fn spent_phrase_can_name_the_account() {
        let intent = decode_keywords("Paid ₹1,200 for Team Dinner from HDFC Bank");
        assert_eq!(intent.number("amount"), Some(1200.0));
        assert_eq!(intent.text("purpose"), Some("Team Dinner"));
        assert_eq!(intent.text("account"), Some("HDFC Bank"));
    }

    #[test]
    fn delete_the_named_reminder() {
        let intent = decode_keywords("delete the rent reminder");
        assert_eq!(intent.kind, IntentKind::DeleteReminder);
        assert_eq!(intent.target_hint.as_deref(), Some("rent"));
        let intent = decode_keywords("remove reminder dentist");
        assert_eq!(intent.target_hint.as_deref(), Some("dentist"));
    }

    #[test]
    fn transfer_and_split_phrases() {
        let transfer = decode_keywords("transfer 300 from Bank to Cash");
        assert_eq!(transfer.text("from"), Some("Bank"));
        assert_eq!(transfer.text("to"), Some("Cash"));

        let split = decode_keywords("split 900 with Asha and Ben for dinner");
        assert_eq!(split.list("participants"), vec!["Asha", "Ben"]);
        assert_eq!(split.text("purpose"), Some("dinner"));
    }

    #[test]
    fn reminder_phrase_with_date_and_time() {
        let intent = decode_keywords("remind me to pay rent tomorrow at 09:30");
        assert_eq!(intent.kind, IntentKind::AddReminder);
        assert_eq!(intent.text("title"), Some("pay rent"));
        assert_eq!(intent.text("date"), Some("tomorrow"));
        assert_eq!(intent.text("time"), Some("09:30"));

        let intent = decode_keywords("remind me to renew passport on 2026-09-01");
        assert_eq!(intent.text("title"), Some("renew passport"));
        assert_eq!(intent.text("date"), Some("2026-09-01"));
    }

    #[test]
    fn set_balance_and_account_phrases() {
        let intent = decode_keywords("set cash balance to 850");
        assert_eq!(intent.kind, IntentKind::SetBalance);
        assert_eq!(intent.target_hint.as_deref(), Some("cash"));
        assert_eq!(intent.number("balance"), Some(850.0));

        let intent = decode_keywords("add account Cash 1000");
        assert_eq!(intent.text("name"), Some("Cash"));
        assert_eq!(intent.number("balance"), Some(1000.0));
    }

    #[test]
    fn unknown_text_is_chat_with_help() {
        let intent = decode_keywords("what's the weather");
        assert_eq!(intent.kind, IntentKind::Chat);
        assert!(intent.reply_text.is_some());
    }

    #[tokio::test]
    async fn http_decoder_posts_text_and_parses_intent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/decode")
                    .header("authorization", "Bearer secret")
                    .json_body(serde_json::json!({"text": "spent 500 on lunch"}));
                then.status(200)
                    .header("content-type", "application/json")
                    .json_body(serde_json::json!({
                        "kind": "ADD_EXPENSE",
                        "fields": {"amount": 500, "purpose": "lunch"}
                    }));
            })
            .await;

        let decoder = HttpIntentDecoder::new(
            server.url("/decode"),
            Some("secret".to_string()),
            Duration::from_secs(5),
        )
        .expect("decoder");
        let intent = decoder.decode("spent 500 on lunch").await.expect("decode");
        mock.assert_async().await;
        assert_eq!(intent.kind, IntentKind::AddExpense);
        assert_eq!(intent.number("amount"), Some(500.0));
    }

    #[tokio::test]
    async fn http_decoder_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/decode");
                then.status(503).body("overloaded");
            })
            .await;
        let decoder = HttpIntentDecoder::new(server.url("/decode"), None, Duration::from_secs(5))
            .expect("decoder");
        let err = decoder.decode("hi").await.expect_err("503");
        assert!(matches!(err, DecodeError::Status { status: 503, .. }));
    }

    #[test]
    fn missing_endpoint_means_no_http_decoder() {
        let config = DecoderConfig::default();
        assert!(HttpIntentDecoder::from_config(&config).expect("config").is_none());
    }

    #[test]
    fn blank_endpoint_means_no_http_decoder() {
        for blank in ["", "   "] {
            let config = DecoderConfig {
                endpoint: Some(blank.to_string()),
                ..DecoderConfig::default()
            };
            assert!(HttpIntentDecoder::from_config(&config).expect("config").is_none());
        }
    }
}
