use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use chrono::{Local, NaiveDateTime};
use hearth_common::TelegramConfig;
use hearth_gateway::{Channel, Gateway, ReminderScheduler, Reply, SessionKey};
use tracing::{debug, info, warn};

use crate::callback::{CallbackAction, keyboard_for, mark_done_keyboard};
use crate::menu::MenuTracker;
use crate::telegram::{CallbackQuery, Message, TelegramClient, Update};

const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// Long-polling Telegram front-end over a shared [`Gateway`].
pub struct TelegramBot {
    client: TelegramClient,
    gateway: Arc<Gateway>,
    allowlist: Vec<String>,
    menus: MenuTracker,
    scheduler: ReminderScheduler,
    chats: BTreeSet<i64>,
    offset: Option<i64>,
    poll_timeout_secs: u64,
}

impl TelegramBot {
    pub fn new(client: TelegramClient, gateway: Arc<Gateway>, config: &TelegramConfig) -> Self {
        let chats = config
            .allowlist
            .iter()
            .filter_map(|entry| entry.trim().parse::<i64>().ok())
            .collect();
        Self {
            client,
            gateway,
            allowlist: config.allowlist.clone(),
            menus: MenuTracker::new(Duration::from_secs(config.menu_ttl_secs)),
            scheduler: ReminderScheduler::new(),
            chats,
            offset: None,
            poll_timeout_secs: config.poll_timeout_secs,
        }
    }

    /// Chat that receives reminder notifications.
    pub fn watch_chat(&mut self, chat_id: i64) {
        self.chats.insert(chat_id);
    }

    fn allowed(&self, chat_id: i64, username: Option<&str>) -> bool {
        if self.allowlist.is_empty() {
            return true;
        }
        let chat = chat_id.to_string();
        self.allowlist.iter().any(|entry| {
            let entry = entry.trim();
            entry == chat || username.is_some_and(|name| entry.trim_start_matches('@') == name)
        })
    }

    fn session_key(chat_id: i64) -> SessionKey {
        SessionKey::new(Channel::Telegram, chat_id.to_string())
    }

    pub async fn handle_update(&mut self, update: Update) -> Result<()> {
        self.offset = Some(update.update_id + 1);
        if let Some(query) = update.callback_query {
            return self.handle_callback(query).await;
        }
        if let Some(message) = update.message {
            return self.handle_message(message).await;
        }
        Ok(())
    }

    async fn handle_message(&mut self, message: Message) -> Result<()> {
        let chat_id = message.chat.id;
        let username = message.from.as_ref().and_then(|u| u.username.as_deref());
        if message.from.as_ref().is_some_and(|u| u.is_bot) {
            return Ok(());
        }
        if !self.allowed(chat_id, username) {
            warn!(chat_id, "ignoring message from chat outside the allowlist");
            return Ok(());
        }
        let Some(text) = message.text.as_deref().map(str::trim).filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        self.chats.insert(chat_id);
        debug!(chat_id, "telegram message received");
        let reply = self
            .gateway
            .handle_text(&Self::session_key(chat_id), text)
            .await;
        self.deliver(chat_id, reply).await
    }

    async fn handle_callback(&mut self, query: CallbackQuery) -> Result<()> {
        let chat_id = query
            .message
            .as_ref()
            .map(|m| m.chat.id)
            .unwrap_or(query.from.id);
        if !self.allowed(chat_id, query.from.username.as_deref()) {
            warn!(chat_id, "ignoring callback from chat outside the allowlist");
            return Ok(());
        }
        let Some(action) = query.data.as_deref().and_then(CallbackAction::parse) else {
            self.client
                .answer_callback_query(&query.id, Some("That button has expired."))
                .await?;
            return Ok(());
        };
        self.client.answer_callback_query(&query.id, None).await?;
        if let Some(source) = &query.message {
            if matches!(action, CallbackAction::Done(_)) {
                // Reminder notices stay in the chat; only the button goes.
                self.strip_buttons(chat_id, source.message_id).await;
            } else {
                if self.menus.clear(chat_id).is_some_and(|id| id != source.message_id) {
                    debug!(chat_id, "callback came from an older menu");
                }
                self.remove_menu(chat_id, source.message_id).await;
            }
        }

        let key = Self::session_key(chat_id);
        let reply = match action {
            CallbackAction::Pick(value) => self.gateway.handle_choice(&key, &value).await,
            CallbackAction::Confirm(accepted) => self.gateway.confirm(&key, accepted).await,
            CallbackAction::Cancel => self.gateway.handle_text(&key, "/cancel").await,
            CallbackAction::Done(id) => self.gateway.complete_reminder(&key, &id).await,
        };
        self.deliver(chat_id, reply).await
    }

    async fn deliver(&mut self, chat_id: i64, reply: Reply) -> Result<()> {
        if let Some(previous) = self.menus.clear(chat_id) {
            self.remove_menu(chat_id, previous).await;
        }
        let keyboard = keyboard_for(&reply);
        let sent = self
            .client
            .send_message(chat_id, &reply.text, keyboard.as_ref())
            .await?;
        if keyboard.is_some() {
            if let Some(replaced) = self.menus.track(chat_id, sent.message_id, Instant::now()) {
                self.remove_menu(chat_id, replaced).await;
            }
        }
        Ok(())
    }

    async fn strip_buttons(&self, chat_id: i64, message_id: i64) {
        if let Err(err) = self.client.clear_keyboard(chat_id, message_id).await {
            warn!(chat_id, message_id, error = %err, "failed to clear message buttons");
        }
    }

    async fn remove_menu(&self, chat_id: i64, message_id: i64) {
        if let Err(err) = self.client.delete_message(chat_id, message_id).await {
            warn!(chat_id, message_id, error = %err, "failed to delete menu message");
        }
    }

    /// Deletes menus older than the configured TTL.
    pub async fn expire_menus(&mut self, now: Instant) -> usize {
        let expired = self.menus.take_expired(now);
        for (chat_id, message_id) in &expired {
            self.remove_menu(*chat_id, *message_id).await;
        }
        expired.len()
    }

    /// Sends each newly due reminder, with a "Mark done" button, to every
    /// watched chat. Notices are not menus: they never expire or get replaced.
    pub async fn notify_due(&mut self, now: NaiveDateTime) -> Result<usize> {
        let ledger = self.gateway.view()?;
        let due = self.scheduler.due(&ledger, now);
        for reminder in &due {
            let text = format!("⏰ Reminder: {} ({})", reminder.title, reminder.due_label());
            let keyboard = mark_done_keyboard(&reminder.id);
            for chat_id in &self.chats {
                self.client
                    .send_message(*chat_id, &text, Some(&keyboard))
                    .await?;
            }
        }
        Ok(due.len())
    }

    /// One long-poll round. Returns the number of updates handled.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self
            .client
            .get_updates(self.offset, self.poll_timeout_secs)
            .await?;
        let count = updates.len();
        for update in updates {
            let update_id = update.update_id;
            if let Err(err) = self.handle_update(update).await {
                warn!(update_id, error = %err, "failed to handle telegram update");
            }
        }
        Ok(count)
    }

    pub async fn run(&mut self) -> Result<()> {
        let me = self.client.get_me().await?;
        info!(
            bot_id = me.id,
            username = me.username.as_deref().unwrap_or(""),
            "telegram bot polling"
        );
        loop {
            if let Err(err) = self.poll_once().await {
                warn!(error = %err, "telegram poll failed");
                tokio::time::sleep(POLL_ERROR_BACKOFF).await;
            }
            self.expire_menus(Instant::now()).await;
            if let Err(err) = self.notify_due(Local::now().naive_local()).await {
                warn!(error = %err, "reminder notification failed");
            }
        }
    }
}
