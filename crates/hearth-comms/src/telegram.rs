use std::time::Duration;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<Message>,
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    pub from: Option<User>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    pub message: Option<Message>,
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InlineButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InlineKeyboard {
    pub inline_keyboard: Vec<Vec<InlineButton>>,
}

impl InlineKeyboard {
    /// One button per row.
    pub fn column(buttons: impl IntoIterator<Item = InlineButton>) -> Self {
        Self {
            inline_keyboard: buttons.into_iter().map(|b| vec![b]).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inline_keyboard.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct TelegramClient {
    client: Client,
    base: String,
}

impl TelegramClient {
    pub fn new(token: &str, timeout: Duration) -> Result<Self> {
        Self::with_base_url(TELEGRAM_API_BASE, token, timeout)
    }

    pub fn with_base_url(base_url: &str, token: &str, timeout: Duration) -> Result<Self> {
        let token = token.trim();
        if token.is_empty() {
            bail!("telegram token is empty");
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build telegram HTTP client")?;
        Ok(Self {
            client,
            base: format!("{}/bot{token}", base_url.trim_end_matches('/')),
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        payload: serde_json::Value,
    ) -> Result<T> {
        let response = self
            .client
            .post(format!("{}/{method}", self.base))
            .json(&payload)
            .send()
            .await
            .with_context(|| format!("failed to call telegram {method}"))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("telegram {method} failed: {} {}", status.as_u16(), body);
        }
        let envelope = response
            .json::<Envelope<T>>()
            .await
            .with_context(|| format!("failed to parse telegram {method} response"))?;
        if !envelope.ok {
            bail!(
                "telegram {method} returned ok=false: {}",
                envelope.description.unwrap_or_default()
            );
        }
        envelope
            .result
            .with_context(|| format!("telegram {method} returned no result"))
    }

    pub async fn get_me(&self) -> Result<BotIdentity> {
        self.call("getMe", serde_json::json!({})).await
    }

    /// Long-polls for updates after `offset`, waiting up to `timeout_secs`.
    pub async fn get_updates(&self, offset: Option<i64>, timeout_secs: u64) -> Result<Vec<Update>> {
        let mut payload = serde_json::json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        if let Some(offset) = offset {
            payload["offset"] = serde_json::json!(offset);
        }
        self.call("getUpdates", payload).await
    }

    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboard>,
    ) -> Result<Message> {
        if text.trim().is_empty() {
            bail!("message is required");
        }
        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });
        if let Some(keyboard) = keyboard.filter(|k| !k.is_empty()) {
            payload["reply_markup"] = serde_json::to_value(keyboard)?;
        }
        self.call("sendMessage", payload).await
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let _: bool = self
            .call(
                "deleteMessage",
                serde_json::json!({ "chat_id": chat_id, "message_id": message_id }),
            )
            .await?;
        Ok(())
    }

    /// Removes the inline keyboard from a sent message and keeps its text.
    pub async fn clear_keyboard(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .call(
                "editMessageReplyMarkup",
                serde_json::json!({
                    "chat_id": chat_id,
                    "message_id": message_id,
                    "reply_markup": { "inline_keyboard": [] },
                }),
            )
            .await?;
        Ok(())
    }

    pub async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        let mut payload = serde_json::json!({ "callback_query_id": callback_id });
        if let Some(text) = text {
            payload["text"] = serde_json::json!(text);
        }
        let _: bool = self.call("answerCallbackQuery", payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::Method::POST;
    use httpmock::MockServer;

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::with_base_url(&server.base_url(), "TOKEN", Duration::from_secs(5))
            .expect("client")
    }

    #[tokio::test]
    async fn get_me_reads_the_result() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/botTOKEN/getMe");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"id":7,"is_bot":true,"first_name":"Hearth","username":"hearth_bot"}}"#);
            })
            .await;
        let me = client(&server).get_me().await.expect("getMe");
        assert_eq!(me.id, 7);
        assert_eq!(me.username.as_deref(), Some("hearth_bot"));
    }

    #[tokio::test]
    async fn ok_false_is_an_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/botTOKEN/getMe");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":false,"description":"Unauthorized"}"#);
            })
            .await;
        let err = client(&server).get_me().await.expect_err("ok=false");
        assert!(err.to_string().contains("Unauthorized"));
    }

    #[tokio::test]
    async fn send_message_attaches_keyboard() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/botTOKEN/sendMessage")
                    .json_body(serde_json::json!({
                        "chat_id": 42,
                        "text": "Which account?",
                        "reply_markup": {
                            "inline_keyboard": [[{"text": "Cash", "callback_data": "pick:a1"}]]
                        }
                    }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"message_id":9,"chat":{"id":42}}}"#);
            })
            .await;
        let keyboard = InlineKeyboard::column([InlineButton {
            text: "Cash".to_string(),
            callback_data: "pick:a1".to_string(),
        }]);
        let sent = client(&server)
            .send_message(42, "Which account?", Some(&keyboard))
            .await
            .expect("send");
        mock.assert_async().await;
        assert_eq!(sent.message_id, 9);
    }

    #[tokio::test]
    async fn get_updates_parses_messages_and_callbacks() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/botTOKEN/getUpdates");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":[
                        {"update_id":1,"message":{"message_id":3,"chat":{"id":42},"from":{"id":5},"text":"hi"}},
                        {"update_id":2,"callback_query":{"id":"cb","from":{"id":5},"data":"confirm:yes"}}
                    ]}"#);
            })
            .await;
        let updates = client(&server).get_updates(Some(1), 0).await.expect("updates");
        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[0].message.as_ref().and_then(|m| m.text.as_deref()),
            Some("hi")
        );
        assert_eq!(
            updates[1].callback_query.as_ref().and_then(|c| c.data.as_deref()),
            Some("confirm:yes")
        );
    }

    #[tokio::test]
    async fn clear_keyboard_sends_an_empty_markup() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/botTOKEN/editMessageReplyMarkup")
                    .json_body(serde_json::json!({
                        "chat_id": 42,
                        "message_id": 9,
                        "reply_markup": {"inline_keyboard": []}
                    }));
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"ok":true,"result":{"message_id":9,"chat":{"id":42}}}"#);
            })
            .await;
        client(&server).clear_keyboard(42, 9).await.expect("edit");
        mock.assert_async().await;
    }

    #[test]
    fn empty_token_is_rejected() {
        assert!(TelegramClient::new("  ", Duration::from_secs(1)).is_err());
    }
}
