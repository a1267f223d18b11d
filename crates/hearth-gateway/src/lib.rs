use std::sync::Arc;

use chrono::{Local, NaiveDate};
use hearth_common::{HearthConfig, MatchPolicy};
use hearth_core::{Intent, IntentKind, Ledger};
use hearth_store::Store;
use serde::Serialize;
use tracing::{info, warn};

pub mod decoder;
pub mod dialogue;
pub mod dispatch;
pub mod error;
pub mod gate;
pub mod resolve;
pub mod schedule;
pub mod session;
pub mod sync;

pub use decoder::{DecodeError, HttpIntentDecoder, IntentDecoder, KeywordDecoder};
pub use dialogue::{Advance, Choice, Flow, Prompt};
pub use dispatch::{Dispatcher, HANDLERS, HandlerClass, Outcome};
pub use error::CommandError;
pub use gate::PendingAction;
pub use schedule::ReminderScheduler;
pub use session::{Channel, Session, SessionKey, SessionTable};
pub use sync::{SyncEngine, SyncError, transactional_apply};

pub const HELP_TEXT: &str = "Tell me what happened in plain words, for example \
\"spent 200 on lunch\" or \"delete the rent reminder\".\n\
Guided entry: /expense /income /subscription /transfer /reminder\n\
/cancel stops whatever is in progress, /refresh reloads your data.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyStatus {
    Executed,
    Clarify,
    Prompt,
    PendingConfirmation,
    Failed,
}

/// What a front-end renders after one turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
    pub text: String,
    pub choices: Vec<Choice>,
    pub status: ReplyStatus,
}

impl Reply {
    fn plain(status: ReplyStatus, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: Vec::new(),
            status,
        }
    }

    fn prompt(prompt: Prompt) -> Self {
        Self {
            text: prompt.text,
            choices: prompt.choices,
            status: ReplyStatus::Prompt,
        }
    }
}

impl From<Outcome> for Reply {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Executed(text) => Self::plain(ReplyStatus::Executed, text),
            Outcome::Clarify(text) => Self::plain(ReplyStatus::Clarify, text),
            Outcome::Failed(text) => Self::plain(ReplyStatus::Failed, text),
            Outcome::PendingConfirmation(text, _) => Self {
                text,
                choices: vec![Choice::new("Yes", "yes"), Choice::new("No", "no")],
                status: ReplyStatus::PendingConfirmation,
            },
        }
    }
}

enum Answer {
    Yes,
    No,
}

fn confirmation_answer(text: &str) -> Option<Answer> {
    match text.trim().to_lowercase().as_str() {
        "yes" | "y" | "confirm" | "ok" => Some(Answer::Yes),
        "no" | "n" | "nope" => Some(Answer::No),
        _ => None,
    }
}

/// Channel-independent entry point: every front-end hands turns to one of
/// these methods and renders the returned [`Reply`].
pub struct Gateway {
    sessions: SessionTable,
    dispatcher: Dispatcher,
    decoder: Arc<dyn IntentDecoder>,
    fixed_today: Option<NaiveDate>,
}

impl Gateway {
    pub fn new(
        sync: Arc<SyncEngine>,
        decoder: Arc<dyn IntentDecoder>,
        currency: impl Into<String>,
        policy: MatchPolicy,
    ) -> Self {
        Self {
            sessions: SessionTable::new(),
            dispatcher: Dispatcher::new(sync, currency, policy),
            decoder,
            fixed_today: None,
        }
    }

    /// Builds the gateway over `store`, using the HTTP decoder when an endpoint
    /// is configured and the keyword decoder otherwise.
    pub fn from_config(config: &HearthConfig, store: Arc<dyn Store>) -> Result<Self, DecodeError> {
        let http = HttpIntentDecoder::from_config(&config.decoder)?;
        let decoder: Arc<dyn IntentDecoder> = match http {
            Some(http) => Arc::new(http),
            None => Arc::new(KeywordDecoder),
        };
        info!(
            decoder = decoder.name(),
            store = store.backend_name(),
            "gateway configured"
        );
        Ok(Self::new(
            Arc::new(SyncEngine::new(store)),
            decoder,
            config.currency_symbol.clone(),
            config.dispatch.ambiguous_match,
        ))
    }

    /// Pins the date used for relative dates and new transactions.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn sync(&self) -> &Arc<SyncEngine> {
        self.dispatcher.sync()
    }

    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    pub fn decoder_name(&self) -> &'static str {
        self.decoder.name()
    }

    pub fn view(&self) -> Result<Ledger, SyncError> {
        self.sync().view()
    }

    pub async fn refresh(&self) -> Reply {
        match self.sync().refresh().await {
            Ok(()) => Reply::plain(ReplyStatus::Executed, "Reloaded your data."),
            Err(err) => {
                warn!(error = %err, "refresh failed");
                Reply::plain(
                    ReplyStatus::Failed,
                    format!("Couldn't reload your data ({err})."),
                )
            }
        }
    }

    /// Forgets the session, dropping any open dialogue and pending action.
    pub fn logout(&self, key: &SessionKey) -> bool {
        let removed = self.sessions.remove(key);
        if removed {
            info!(session = %key, "session logged out");
        }
        removed
    }

    pub async fn handle_text(&self, key: &SessionKey, text: &str) -> Reply {
        let text = text.trim();
        let command = text.to_lowercase();
        match command.as_str() {
            "" => return Reply::plain(ReplyStatus::Clarify, HELP_TEXT),
            "/refresh" => return self.refresh().await,
            "/logout" => {
                self.logout(key);
                return Reply::plain(ReplyStatus::Executed, "Logged out.");
            }
            _ => {}
        }

        let handle = self.sessions.get_or_create(key);
        let mut session = handle.lock().await;

        if dialogue::is_cancel(text) {
            let message = if session.cancel() {
                "Cancelled."
            } else {
                "Nothing to cancel."
            };
            return Reply::plain(ReplyStatus::Executed, message);
        }
        if matches!(command.as_str(), "/help" | "/start") {
            return Reply::plain(ReplyStatus::Executed, HELP_TEXT);
        }

        if session.dialogue.is_some() {
            let accounts = match self.sync().view() {
                Ok(ledger) => ledger.accounts,
                Err(err) => return CommandError::from(err).into_outcome().into(),
            };
            if let Some(step) = dialogue::advance(&mut session, text, &accounts, self.today()) {
                return self.finish_turn(&mut session, step).await;
            }
        }

        if let Some(answer) = confirmation_answer(text) {
            let accepted = matches!(answer, Answer::Yes);
            return gate::resolve(&mut session, accepted, self.sync()).await.into();
        }

        if let Some(flow) = Flow::from_command(text) {
            return Reply::prompt(dialogue::begin(&mut session, flow));
        }
        if text.starts_with('/') {
            return Reply::plain(
                ReplyStatus::Clarify,
                format!("I don't know the command {text}. Send /help to see what I can do."),
            );
        }

        let intent = match self.decoder.decode(text).await {
            Ok(intent) => intent,
            Err(err) => {
                warn!(session = %key, decoder = self.decoder.name(), error = %err, "decode failed");
                return Reply::plain(
                    ReplyStatus::Failed,
                    "I couldn't understand that right now. Please try again.",
                );
            }
        };
        if let Some(flow) = Flow::for_incomplete(&intent) {
            let accounts = match self.sync().view() {
                Ok(ledger) => ledger.accounts,
                Err(err) => return CommandError::from(err).into_outcome().into(),
            };
            let started =
                dialogue::begin_from(&mut session, flow, &intent, &accounts, self.today());
            return self.finish_turn(&mut session, started).await;
        }
        self.dispatcher
            .dispatch(&mut session, intent, self.today())
            .await
            .into()
    }

    async fn finish_turn(&self, session: &mut Session, step: Advance) -> Reply {
        match step {
            Advance::Prompt(prompt) => Reply::prompt(prompt),
            Advance::Cancelled(message) => Reply::plain(ReplyStatus::Executed, message),
            Advance::Done(intent) => self
                .dispatcher
                .dispatch(session, intent, self.today())
                .await
                .into(),
        }
    }

    /// A tapped button. Values are the same strings a user could type.
    pub async fn handle_choice(&self, key: &SessionKey, value: &str) -> Reply {
        self.handle_text(key, value).await
    }

    pub async fn confirm(&self, key: &SessionKey, accepted: bool) -> Reply {
        let handle = self.sessions.get_or_create(key);
        let mut session = handle.lock().await;
        gate::resolve(&mut session, accepted, self.sync()).await.into()
    }

    /// "Mark done" on a reminder notification. Runs without confirmation.
    pub async fn complete_reminder(&self, key: &SessionKey, reminder_id: &str) -> Reply {
        let handle = self.sessions.get_or_create(key);
        let mut session = handle.lock().await;
        let intent =
            Intent::new(IntentKind::CompleteReminder).with_field("reminder_id", reminder_id);
        self.dispatcher
            .dispatch(&mut session, intent, self.today())
            .await
            .into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_store::InMemoryStore;

    fn gateway() -> Gateway {
        let store = Arc::new(InMemoryStore::new());
        Gateway::new(
            Arc::new(SyncEngine::new(store)),
            Arc::new(KeywordDecoder),
            "₹",
            MatchPolicy::First,
        )
        .with_today(NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"))
    }

    #[tokio::test]
    async fn cancel_with_nothing_open() {
        let gw = gateway();
        let key = SessionKey::new(Channel::Cli, "me");
        let reply = gw.handle_text(&key, "/cancel").await;
        assert_eq!(reply.text, "Nothing to cancel.");
    }

    #[tokio::test]
    async fn flow_command_prompts_with_cancel_button() {
        let gw = gateway();
        let key = SessionKey::new(Channel::Cli, "me");
        let reply = gw.handle_text(&key, "/expense").await;
        assert_eq!(reply.status, ReplyStatus::Prompt);
        assert_eq!(reply.choices.last().map(|c| c.value.as_str()), Some("cancel"));
        let cancelled = gw.handle_choice(&key, "cancel").await;
        assert_eq!(cancelled.text, "Cancelled.");
    }

    #[tokio::test]
    async fn unknown_slash_command_clarifies() {
        let gw = gateway();
        let key = SessionKey::new(Channel::Cli, "me");
        let reply = gw.handle_text(&key, "/dance").await;
        assert_eq!(reply.status, ReplyStatus::Clarify);
    }

    #[tokio::test]
    async fn logout_drops_the_session() {
        let gw = gateway();
        let key = SessionKey::new(Channel::Web, "tab");
        gw.handle_text(&key, "/reminder").await;
        assert_eq!(gw.sessions().len(), 1);
        assert!(gw.logout(&key));
        assert!(gw.sessions().is_empty());
    }
}
