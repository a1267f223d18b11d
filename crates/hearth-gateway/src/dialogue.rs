//! Multi-turn parameter collection.
//!
//! Each flow is a step enum whose variants carry exactly what has been
//! collected so far. A wrong answer re-prompts from the same step.

use chrono::{NaiveDate, NaiveTime};
use hearth_core::{Account, Intent, IntentKind, parse_amount, parse_date, parse_time};
use serde::Serialize;

use crate::session::Session;

pub const CANCEL_VALUE: &str = "cancel";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub label: String,
    pub value: String,
}

impl Choice {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    fn cancel() -> Self {
        Self::new("Cancel", CANCEL_VALUE)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prompt {
    pub text: String,
    pub choices: Vec<Choice>,
}

impl Prompt {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            choices: vec![Choice::cancel()],
        }
    }

    fn pick(text: impl Into<String>, accounts: &[&Account]) -> Self {
        let mut choices: Vec<Choice> = accounts
            .iter()
            .map(|account| Choice::new(account.name.clone(), account.id.clone()))
            .collect();
        choices.push(Choice::cancel());
        Self {
            text: text.into(),
            choices,
        }
    }

    fn retry(reason: &str, next: Prompt) -> Self {
        Self {
            text: format!("{reason} {}", next.text),
            choices: next.choices,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Expense,
    Income,
    Subscription,
}

impl EntryKind {
    fn noun(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Subscription => "subscription",
        }
    }

    fn intent_kind(self) -> IntentKind {
        match self {
            Self::Expense => IntentKind::AddExpense,
            Self::Income => IntentKind::AddIncome,
            Self::Subscription => IntentKind::AddSubscription,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Entry(EntryKind),
    Reminder,
    Transfer,
}

impl Flow {
    pub fn from_command(command: &str) -> Option<Self> {
        match command.trim().to_lowercase().as_str() {
            "/expense" => Some(Self::Entry(EntryKind::Expense)),
            "/income" => Some(Self::Entry(EntryKind::Income)),
            "/subscription" => Some(Self::Entry(EntryKind::Subscription)),
            "/reminder" => Some(Self::Reminder),
            "/transfer" => Some(Self::Transfer),
            _ => None,
        }
    }

    fn intent_kind(self) -> IntentKind {
        match self {
            Self::Entry(kind) => kind.intent_kind(),
            Self::Reminder => IntentKind::AddReminder,
            Self::Transfer => IntentKind::Transfer,
        }
    }

    /// Flow that can collect what an incomplete decoded intent is missing.
    pub fn for_incomplete(intent: &Intent) -> Option<Self> {
        let positive_amount = intent.number("amount").is_some_and(|n| n > 0.0);
        match intent.kind {
            IntentKind::AddExpense if !positive_amount => Some(Self::Entry(EntryKind::Expense)),
            IntentKind::AddIncome if !positive_amount => Some(Self::Entry(EntryKind::Income)),
            IntentKind::AddSubscription if !positive_amount => {
                Some(Self::Entry(EntryKind::Subscription))
            }
            IntentKind::AddReminder if !intent.has("title") || !intent.has("date") => {
                Some(Self::Reminder)
            }
            IntentKind::Transfer
                if !positive_amount
                    || (!intent.has("from") && !intent.has("from_account_id"))
                    || (!intent.has("to") && !intent.has("to_account_id")) =>
            {
                Some(Self::Transfer)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntryStep {
    AwaitingAmount,
    AwaitingAccount { amount: f64 },
    AwaitingPurpose { amount: f64, account_id: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ReminderStep {
    AwaitingTitle,
    AwaitingDate { title: String },
    AwaitingTime { title: String, date: NaiveDate },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferStep {
    AwaitingAmount,
    AwaitingFromAccount { amount: f64 },
    AwaitingToAccount { amount: f64, from_account_id: String },
}

/// `seed` holds the fields the flow started from. Steps it already answers
/// are skipped and it is carried into the finished intent.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogueState {
    Entry {
        kind: EntryKind,
        step: EntryStep,
        seed: Intent,
    },
    Reminder {
        step: ReminderStep,
        seed: Intent,
    },
    Transfer {
        step: TransferStep,
        seed: Intent,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepTag {
    AwaitingAmount,
    AwaitingAccount,
    AwaitingPurpose,
    AwaitingTitle,
    AwaitingDate,
    AwaitingTime,
    AwaitingFromAccount,
    AwaitingToAccount,
}

impl DialogueState {
    pub fn step(&self) -> StepTag {
        match self {
            Self::Entry { step, .. } => match step {
                EntryStep::AwaitingAmount => StepTag::AwaitingAmount,
                EntryStep::AwaitingAccount { .. } => StepTag::AwaitingAccount,
                EntryStep::AwaitingPurpose { .. } => StepTag::AwaitingPurpose,
            },
            Self::Reminder { step, .. } => match step {
                ReminderStep::AwaitingTitle => StepTag::AwaitingTitle,
                ReminderStep::AwaitingDate { .. } => StepTag::AwaitingDate,
                ReminderStep::AwaitingTime { .. } => StepTag::AwaitingTime,
            },
            Self::Transfer { step, .. } => match step {
                TransferStep::AwaitingAmount => StepTag::AwaitingAmount,
                TransferStep::AwaitingFromAccount { .. } => StepTag::AwaitingFromAccount,
                TransferStep::AwaitingToAccount { .. } => StepTag::AwaitingToAccount,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    Prompt(Prompt),
    Done(Intent),
    /// The flow ended without an intent: explicit cancel, or nothing to pick from.
    Cancelled(String),
}

pub fn is_cancel(input: &str) -> bool {
    matches!(input.trim().to_lowercase().as_str(), "/cancel" | CANCEL_VALUE)
}

/// Starts `flow` on the session, replacing any dialogue already open.
pub fn begin(session: &mut Session, flow: Flow) -> Prompt {
    let seed = Intent::new(flow.intent_kind());
    let (state, prompt) = match flow {
        Flow::Entry(kind) => (
            DialogueState::Entry {
                kind,
                step: EntryStep::AwaitingAmount,
                seed,
            },
            amount_prompt(kind),
        ),
        Flow::Reminder => (
            DialogueState::Reminder {
                step: ReminderStep::AwaitingTitle,
                seed,
            },
            title_prompt(),
        ),
        Flow::Transfer => (
            DialogueState::Transfer {
                step: TransferStep::AwaitingAmount,
                seed,
            },
            transfer_amount_prompt(),
        ),
    };
    session.dialogue = Some(state);
    prompt
}

/// Starts `flow` from a partly decoded intent and opens at the first step its
/// fields leave unanswered. Returns `Done` when nothing is left to ask.
pub fn begin_from(
    session: &mut Session,
    flow: Flow,
    intent: &Intent,
    accounts: &[Account],
    today: NaiveDate,
) -> Advance {
    let mut seed = intent.clone();
    seed.kind = flow.intent_kind();
    let (next, outcome) = match flow {
        Flow::Entry(kind) => entry_next(kind, seed, None, None, accounts),
        Flow::Reminder => reminder_next(seed, None, None, today),
        Flow::Transfer => transfer_next(seed, None, None, accounts),
    };
    session.dialogue = next;
    outcome
}

/// Feeds one answer into the open dialogue. `None` when no dialogue is open.
pub fn advance(
    session: &mut Session,
    input: &str,
    accounts: &[Account],
    today: NaiveDate,
) -> Option<Advance> {
    let state = session.dialogue.take()?;
    if is_cancel(input) {
        return Some(Advance::Cancelled("Cancelled.".to_string()));
    }
    let input = input.trim();
    let (next, outcome) = match state {
        DialogueState::Entry { kind, step, seed } => {
            advance_entry(kind, step, seed, input, accounts)
        }
        DialogueState::Reminder { step, seed } => advance_reminder(step, seed, input, today),
        DialogueState::Transfer { step, seed } => advance_transfer(step, seed, input, accounts),
    };
    session.dialogue = next;
    Some(outcome)
}

type Turn = (Option<DialogueState>, Advance);

fn amount_prompt(kind: EntryKind) -> Prompt {
    Prompt::text(format!("How much was the {}?", kind.noun()))
}

fn purpose_prompt(kind: EntryKind) -> Prompt {
    Prompt::text(format!("What was the {} for?", kind.noun()))
}

fn title_prompt() -> Prompt {
    Prompt::text("What should I remind you about?")
}

fn date_prompt() -> Prompt {
    Prompt::text("When? Send a date as YYYY-MM-DD, today or tomorrow.")
}

fn time_prompt() -> Prompt {
    let mut prompt = Prompt::text("At what time? Send HH:MM, or skip.");
    prompt.choices.insert(0, Choice::new("Skip", "skip"));
    prompt
}

fn transfer_amount_prompt() -> Prompt {
    Prompt::text("How much do you want to transfer?")
}

fn retry_amount() -> Prompt {
    Prompt::text("Please send a positive amount, for example 250.")
}

fn entry_next(
    kind: EntryKind,
    seed: Intent,
    amount: Option<f64>,
    account_id: Option<String>,
    accounts: &[Account],
) -> Turn {
    let state = |step: EntryStep, seed: Intent| Some(DialogueState::Entry { kind, step, seed });
    let Some(amount) = amount.or_else(|| seeded_amount(&seed)) else {
        return (
            state(EntryStep::AwaitingAmount, seed),
            Advance::Prompt(amount_prompt(kind)),
        );
    };
    let options: Vec<&Account> = accounts.iter().collect();
    let account_id =
        account_id.or_else(|| seeded_account(&seed, "account_id", "account", &options));
    let Some(account_id) = account_id else {
        if options.is_empty() {
            return (None, Advance::Cancelled(no_accounts_message()));
        }
        return (
            state(EntryStep::AwaitingAccount { amount }, seed),
            Advance::Prompt(Prompt::pick("Which account?", &options)),
        );
    };
    let purpose = seed.text("purpose").and_then(answer_text).map(str::to_string);
    match purpose {
        Some(purpose) => (
            None,
            Advance::Done(entry_intent(seed, amount, account_id, purpose)),
        ),
        None => (
            state(EntryStep::AwaitingPurpose { amount, account_id }, seed),
            Advance::Prompt(purpose_prompt(kind)),
        ),
    }
}

fn advance_entry(
    kind: EntryKind,
    step: EntryStep,
    seed: Intent,
    input: &str,
    accounts: &[Account],
) -> Turn {
    let stay = |step: EntryStep, seed: Intent| Some(DialogueState::Entry { kind, step, seed });
    match step {
        EntryStep::AwaitingAmount => match positive_amount(input) {
            Some(amount) => entry_next(kind, seed, Some(amount), None, accounts),
            None => (
                stay(EntryStep::AwaitingAmount, seed),
                Advance::Prompt(retry_amount()),
            ),
        },
        EntryStep::AwaitingAccount { amount } => {
            let options: Vec<&Account> = accounts.iter().collect();
            match pick_account(&options, input) {
                Some(account) => {
                    entry_next(kind, seed, Some(amount), Some(account.id.clone()), accounts)
                }
                None => (
                    stay(EntryStep::AwaitingAccount { amount }, seed),
                    Advance::Prompt(Prompt::retry(
                        "I don't know that account.",
                        Prompt::pick("Which account?", &options),
                    )),
                ),
            }
        }
        EntryStep::AwaitingPurpose { amount, account_id } => match answer_text(input) {
            Some(purpose) => {
                let purpose = purpose.to_string();
                (
                    None,
                    Advance::Done(entry_intent(seed, amount, account_id, purpose)),
                )
            }
            None => (
                stay(EntryStep::AwaitingPurpose { amount, account_id }, seed),
                Advance::Prompt(text_retry(input, purpose_prompt(kind))),
            ),
        },
    }
}

fn entry_intent(seed: Intent, amount: f64, account_id: String, purpose: String) -> Intent {
    seed.with_field("amount", amount)
        .with_field("account_id", account_id)
        .with_field("purpose", purpose)
}

fn reminder_next(
    seed: Intent,
    title: Option<String>,
    date: Option<NaiveDate>,
    today: NaiveDate,
) -> Turn {
    let state = |step: ReminderStep, seed: Intent| Some(DialogueState::Reminder { step, seed });
    let title = title.or_else(|| seed.text("title").and_then(answer_text).map(str::to_string));
    let Some(title) = title else {
        return (
            state(ReminderStep::AwaitingTitle, seed),
            Advance::Prompt(title_prompt()),
        );
    };
    let date = date.or_else(|| seed.text("date").and_then(|raw| parse_date(raw, today)));
    let Some(date) = date else {
        return (
            state(ReminderStep::AwaitingDate { title }, seed),
            Advance::Prompt(date_prompt()),
        );
    };
    match seed.text("time").and_then(parse_time) {
        Some(time) => (
            None,
            Advance::Done(reminder_intent(seed, title, date, Some(time))),
        ),
        None => (
            state(ReminderStep::AwaitingTime { title, date }, seed),
            Advance::Prompt(time_prompt()),
        ),
    }
}

fn advance_reminder(step: ReminderStep, seed: Intent, input: &str, today: NaiveDate) -> Turn {
    let stay = |step: ReminderStep, seed: Intent| Some(DialogueState::Reminder { step, seed });
    match step {
        ReminderStep::AwaitingTitle => match answer_text(input) {
            Some(title) => reminder_next(seed, Some(title.to_string()), None, today),
            None => (
                stay(ReminderStep::AwaitingTitle, seed),
                Advance::Prompt(text_retry(input, title_prompt())),
            ),
        },
        ReminderStep::AwaitingDate { title } => match parse_date(input, today) {
            Some(date) => reminder_next(seed, Some(title), Some(date), today),
            None => (
                stay(ReminderStep::AwaitingDate { title }, seed),
                Advance::Prompt(Prompt::retry("That isn't a date I understand.", date_prompt())),
            ),
        },
        ReminderStep::AwaitingTime { title, date } => {
            if input.eq_ignore_ascii_case("skip") {
                return (None, Advance::Done(reminder_intent(seed, title, date, None)));
            }
            match parse_time(input) {
                Some(time) => (
                    None,
                    Advance::Done(reminder_intent(seed, title, date, Some(time))),
                ),
                None => (
                    stay(ReminderStep::AwaitingTime { title, date }, seed),
                    Advance::Prompt(Prompt::retry(
                        "That isn't a time I understand.",
                        time_prompt(),
                    )),
                ),
            }
        }
    }
}

fn reminder_intent(
    seed: Intent,
    title: String,
    date: NaiveDate,
    time: Option<NaiveTime>,
) -> Intent {
    let mut intent = seed
        .with_field("title", title)
        .with_field("date", date.to_string());
    match time {
        Some(time) => intent.with_field("time", time.format("%H:%M").to_string()),
        None => {
            intent.fields.remove("time");
            intent
        }
    }
}

fn transfer_next(
    seed: Intent,
    amount: Option<f64>,
    from_account_id: Option<String>,
    accounts: &[Account],
) -> Turn {
    let state = |step: TransferStep, seed: Intent| Some(DialogueState::Transfer { step, seed });
    let Some(amount) = amount.or_else(|| seeded_amount(&seed)) else {
        return (
            state(TransferStep::AwaitingAmount, seed),
            Advance::Prompt(transfer_amount_prompt()),
        );
    };
    let options: Vec<&Account> = accounts.iter().collect();
    if options.len() < 2 {
        return (
            None,
            Advance::Cancelled("You need at least two accounts to transfer between.".to_string()),
        );
    }
    let from_account_id = from_account_id
        .or_else(|| seeded_account(&seed, "from_account_id", "from", &options));
    let Some(from_account_id) = from_account_id else {
        return (
            state(TransferStep::AwaitingFromAccount { amount }, seed),
            Advance::Prompt(Prompt::pick("Transfer from which account?", &options)),
        );
    };
    let targets = destinations(accounts, &from_account_id);
    match seeded_account(&seed, "to_account_id", "to", &targets) {
        Some(to_account_id) => (
            None,
            Advance::Done(transfer_intent(seed, amount, from_account_id, to_account_id)),
        ),
        None => (
            state(
                TransferStep::AwaitingToAccount {
                    amount,
                    from_account_id,
                },
                seed,
            ),
            Advance::Prompt(Prompt::pick("Transfer to which account?", &targets)),
        ),
    }
}

fn advance_transfer(step: TransferStep, seed: Intent, input: &str, accounts: &[Account]) -> Turn {
    let stay = |step: TransferStep, seed: Intent| Some(DialogueState::Transfer { step, seed });
    match step {
        TransferStep::AwaitingAmount => match positive_amount(input) {
            Some(amount) => transfer_next(seed, Some(amount), None, accounts),
            None => (
                stay(TransferStep::AwaitingAmount, seed),
                Advance::Prompt(retry_amount()),
            ),
        },
        TransferStep::AwaitingFromAccount { amount } => {
            let options: Vec<&Account> = accounts.iter().collect();
            match pick_account(&options, input) {
                Some(from) => transfer_next(seed, Some(amount), Some(from.id.clone()), accounts),
                None => (
                    stay(TransferStep::AwaitingFromAccount { amount }, seed),
                    Advance::Prompt(Prompt::retry(
                        "I don't know that account.",
                        Prompt::pick("Transfer from which account?", &options),
                    )),
                ),
            }
        }
        TransferStep::AwaitingToAccount {
            amount,
            from_account_id,
        } => {
            let targets = destinations(accounts, &from_account_id);
            match pick_account(&targets, input) {
                Some(to) => {
                    let to_account_id = to.id.clone();
                    (
                        None,
                        Advance::Done(transfer_intent(
                            seed,
                            amount,
                            from_account_id,
                            to_account_id,
                        )),
                    )
                }
                None => (
                    stay(
                        TransferStep::AwaitingToAccount {
                            amount,
                            from_account_id,
                        },
                        seed,
                    ),
                    Advance::Prompt(Prompt::retry(
                        "Pick one of the listed accounts.",
                        Prompt::pick("Transfer to which account?", &targets),
                    )),
                ),
            }
        }
    }
}

fn transfer_intent(
    seed: Intent,
    amount: f64,
    from_account_id: String,
    to_account_id: String,
) -> Intent {
    seed.with_field("amount", amount)
        .with_field("from_account_id", from_account_id)
        .with_field("to_account_id", to_account_id)
}

/// To-account options: every account except the one money leaves from.
fn destinations<'a>(accounts: &'a [Account], from_account_id: &str) -> Vec<&'a Account> {
    accounts
        .iter()
        .filter(|account| account.id != from_account_id)
        .collect()
}

fn positive_amount(input: &str) -> Option<f64> {
    parse_amount(input).filter(|amount| *amount > 0.0)
}

fn seeded_amount(seed: &Intent) -> Option<f64> {
    seed.number("amount").filter(|amount| *amount > 0.0)
}

/// Free-text answer for a purpose or title. Slash commands never count.
fn answer_text(input: &str) -> Option<&str> {
    let trimmed = input.trim();
    (!trimmed.is_empty() && !trimmed.starts_with('/')).then_some(trimmed)
}

fn text_retry(input: &str, next: Prompt) -> Prompt {
    if input.trim_start().starts_with('/') {
        Prompt::retry("Finish this first, or send /cancel.", next)
    } else {
        next
    }
}

/// Account named by the seed under `id_key` or `name_key`, if it is one of `options`.
fn seeded_account(
    seed: &Intent,
    id_key: &str,
    name_key: &str,
    options: &[&Account],
) -> Option<String> {
    [id_key, name_key]
        .into_iter()
        .filter_map(|key| seed.text(key))
        .find_map(|wanted| pick_account(options, wanted))
        .map(|account| account.id.clone())
}

/// Resolves a button id or a typed name against the offered options only.
fn pick_account<'a>(options: &[&'a Account], input: &str) -> Option<&'a Account> {
    let wanted = input.trim();
    if wanted.is_empty() {
        return None;
    }
    if let Some(by_id) = options.iter().find(|account| account.id == wanted) {
        return Some(*by_id);
    }
    let lowered = wanted.to_lowercase();
    options
        .iter()
        .find(|account| account.name.to_lowercase() == lowered)
        .copied()
}

fn no_accounts_message() -> String {
    "You don't have any accounts yet. Add one first, for example \"add account Cash 1000\"."
        .to_string()
}
