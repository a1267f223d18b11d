use std::sync::Arc;

use chrono::NaiveDate;
use hearth_common::MatchPolicy;
use hearth_core::{
    Account, Friend, Intent, IntentKind, Ledger, Mutation, Payer, Reminder, TransactionKind,
    format_amount, new_tx_id, parse_date, parse_time, split_share,
};
use tracing::{debug, info};

use crate::error::CommandError;
use crate::gate::{self, PendingAction};
use crate::resolve::resolve;
use crate::session::Session;
use crate::sync::SyncEngine;

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Executed(String),
    Clarify(String),
    PendingConfirmation(String, PendingAction),
    Failed(String),
}

impl Outcome {
    pub fn message(&self) -> &str {
        match self {
            Self::Executed(message)
            | Self::Clarify(message)
            | Self::PendingConfirmation(message, _)
            | Self::Failed(message) => message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerClass {
    /// Replies from local state.
    Read,
    /// Mutates immediately.
    Write,
    /// Mutates only after an explicit yes.
    Destructive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldShape {
    PositiveAmount,
    Number,
    Text,
    Date,
    List,
    /// An id or name; the intent-wide target hint also counts.
    Target,
    /// At least one of the keys is present.
    AnyOf,
}

#[derive(Debug, Clone, Copy)]
pub struct Requirement {
    pub keys: &'static [&'static str],
    pub shape: FieldShape,
    pub question: &'static str,
}

const fn need(
    keys: &'static [&'static str],
    shape: FieldShape,
    question: &'static str,
) -> Requirement {
    Requirement {
        keys,
        shape,
        question,
    }
}

/// What a handler decided to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    Reply(String),
    Mutate {
        mutation: Mutation,
        /// Confirmation question, shown for destructive handlers.
        prompt: String,
        success: String,
    },
}

pub struct PlanContext<'a> {
    pub ledger: &'a Ledger,
    pub today: NaiveDate,
    pub currency: &'a str,
    pub policy: MatchPolicy,
}

impl PlanContext<'_> {
    fn money(&self, amount: f64) -> String {
        format_amount(self.currency, amount)
    }

    fn account(
        &self,
        intent: &Intent,
        id_key: &str,
        name_key: &str,
    ) -> Result<&Account, CommandError> {
        resolve(
            &self.ledger.accounts,
            intent.text(id_key),
            intent.text(name_key),
            self.policy,
        )
    }

    fn friend(&self, id: Option<&str>, hint: Option<&str>) -> Result<&Friend, CommandError> {
        resolve(&self.ledger.friends, id, hint, self.policy)
    }

    fn reminder(&self, intent: &Intent) -> Result<&Reminder, CommandError> {
        resolve(
            &self.ledger.reminders,
            intent.text("reminder_id"),
            intent.hint_for("reminder"),
            self.policy,
        )
    }
}

pub type PlanFn = fn(&PlanContext<'_>, &Intent) -> Result<Plan, CommandError>;

pub struct Handler {
    pub kind: IntentKind,
    pub class: HandlerClass,
    pub required: &'static [Requirement],
    pub plan: PlanFn,
}

const AMOUNT: Requirement = need(&["amount"], FieldShape::PositiveAmount, "How much was it?");

pub static HANDLERS: &[Handler] = &[
    Handler {
        kind: IntentKind::AddExpense,
        class: HandlerClass::Write,
        required: &[AMOUNT],
        plan: plan_expense,
    },
    Handler {
        kind: IntentKind::AddIncome,
        class: HandlerClass::Write,
        required: &[AMOUNT],
        plan: plan_income,
    },
    Handler {
        kind: IntentKind::AddSubscription,
        class: HandlerClass::Write,
        required: &[AMOUNT],
        plan: plan_subscription,
    },
    Handler {
        kind: IntentKind::Transfer,
        class: HandlerClass::Write,
        required: &[
            AMOUNT,
            need(
                &["from_account_id", "from"],
                FieldShape::Text,
                "Which account should the money leave from?",
            ),
            need(
                &["to_account_id", "to"],
                FieldShape::Text,
                "Which account should the money go to?",
            ),
        ],
        plan: plan_transfer,
    },
    Handler {
        kind: IntentKind::SplitBill,
        class: HandlerClass::Write,
        required: &[
            AMOUNT,
            need(
                &["participants"],
                FieldShape::List,
                "Who are you splitting it with?",
            ),
        ],
        plan: plan_split,
    },
    Handler {
        kind: IntentKind::SettleFriend,
        class: HandlerClass::Write,
        required: &[need(
            &["friend_id", "friend"],
            FieldShape::Target,
            "Which friend are you settling with?",
        )],
        plan: plan_settle,
    },
    Handler {
        kind: IntentKind::SetBalance,
        class: HandlerClass::Destructive,
        required: &[need(
            &["balance"],
            FieldShape::Number,
            "What should the new balance be?",
        )],
        plan: plan_set_balance,
    },
    Handler {
        kind: IntentKind::AddAccount,
        class: HandlerClass::Write,
        required: &[need(
            &["name"],
            FieldShape::Text,
            "What should the account be called?",
        )],
        plan: plan_add_account,
    },
    Handler {
        kind: IntentKind::DeleteAccount,
        class: HandlerClass::Destructive,
        required: &[need(
            &["account_id", "account"],
            FieldShape::Target,
            "Which account should I delete?",
        )],
        plan: plan_delete_account,
    },
    Handler {
        kind: IntentKind::ListAccounts,
        class: HandlerClass::Read,
        required: &[],
        plan: plan_list_accounts,
    },
    Handler {
        kind: IntentKind::AddFriend,
        class: HandlerClass::Write,
        required: &[need(&["name"], FieldShape::Text, "What is your friend's name?")],
        plan: plan_add_friend,
    },
    Handler {
        kind: IntentKind::ListFriends,
        class: HandlerClass::Read,
        required: &[],
        plan: plan_list_friends,
    },
    Handler {
        kind: IntentKind::ListTransactions,
        class: HandlerClass::Read,
        required: &[],
        plan: plan_list_transactions,
    },
    Handler {
        kind: IntentKind::DeleteTransaction,
        class: HandlerClass::Destructive,
        required: &[need(
            &["transaction_id", "transaction"],
            FieldShape::Target,
            "Which transaction should I delete?",
        )],
        plan: plan_delete_transaction,
    },
    Handler {
        kind: IntentKind::AddReminder,
        class: HandlerClass::Write,
        required: &[
            need(
                &["title"],
                FieldShape::Text,
                "What should I remind you about?",
            ),
            need(
                &["date"],
                FieldShape::Date,
                "When? Send a date as YYYY-MM-DD, today or tomorrow.",
            ),
        ],
        plan: plan_add_reminder,
    },
    Handler {
        kind: IntentKind::ListReminders,
        class: HandlerClass::Read,
        required: &[],
        plan: plan_list_reminders,
    },
    Handler {
        kind: IntentKind::EditReminder,
        class: HandlerClass::Destructive,
        required: &[
            need(
                &["reminder_id", "reminder"],
                FieldShape::Target,
                "Which reminder should I change?",
            ),
            need(
                &["title", "date", "time"],
                FieldShape::AnyOf,
                "What should change: the title, date or time?",
            ),
        ],
        plan: plan_edit_reminder,
    },
    Handler {
        kind: IntentKind::DeleteReminder,
        class: HandlerClass::Destructive,
        required: &[need(
            &["reminder_id", "reminder"],
            FieldShape::Target,
            "Which reminder should I delete?",
        )],
        plan: plan_delete_reminder,
    },
    Handler {
        kind: IntentKind::CompleteReminder,
        class: HandlerClass::Write,
        required: &[need(
            &["reminder_id", "reminder"],
            FieldShape::Target,
            "Which reminder is done?",
        )],
        plan: plan_complete_reminder,
    },
    Handler {
        kind: IntentKind::Chat,
        class: HandlerClass::Read,
        required: &[],
        plan: plan_chat,
    },
];

pub fn handler_for(kind: IntentKind) -> Option<&'static Handler> {
    HANDLERS.iter().find(|handler| handler.kind == kind)
}

/// First unmet requirement, as the question to ask the user.
pub fn check_required(
    handler: &Handler,
    intent: &Intent,
    today: NaiveDate,
) -> Result<(), CommandError> {
    for requirement in handler.required {
        let met = match requirement.shape {
            FieldShape::PositiveAmount => requirement
                .keys
                .iter()
                .any(|key| intent.number(key).is_some_and(|n| n > 0.0)),
            FieldShape::Number => requirement
                .keys
                .iter()
                .any(|key| intent.number(key).is_some()),
            FieldShape::Text => requirement.keys.iter().any(|key| intent.text(key).is_some()),
            FieldShape::Date => requirement
                .keys
                .iter()
                .any(|key| intent.date(key, today).is_some()),
            FieldShape::List => requirement
                .keys
                .iter()
                .any(|key| !intent.list(key).is_empty()),
            FieldShape::Target => {
                intent.target_hint.is_some()
                    || requirement.keys.iter().any(|key| intent.text(key).is_some())
            }
            FieldShape::AnyOf => requirement.keys.iter().any(|key| intent.has(key)),
        };
        if !met {
            return Err(CommandError::validation(requirement.question));
        }
    }
    Ok(())
}

/// Routes completed intents through the handler table.
pub struct Dispatcher {
    sync: Arc<SyncEngine>,
    currency: String,
    policy: MatchPolicy,
}

impl Dispatcher {
    pub fn new(sync: Arc<SyncEngine>, currency: impl Into<String>, policy: MatchPolicy) -> Self {
        Self {
            sync,
            currency: currency.into(),
            policy,
        }
    }

    pub fn sync(&self) -> &Arc<SyncEngine> {
        &self.sync
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub async fn dispatch(
        &self,
        session: &mut Session,
        intent: Intent,
        today: NaiveDate,
    ) -> Outcome {
        let Some(handler) = handler_for(intent.kind) else {
            return Outcome::Clarify("I can't do that yet.".to_string());
        };
        debug!(session = %session.key, kind = intent.kind.as_str(), "dispatching intent");
        if let Err(err) = check_required(handler, &intent, today) {
            return err.into_outcome();
        }

        let ledger = match self.sync.view() {
            Ok(ledger) => ledger,
            Err(err) => return CommandError::from(err).into_outcome(),
        };
        let ctx = PlanContext {
            ledger: &ledger,
            today,
            currency: &self.currency,
            policy: self.policy,
        };
        let plan = match (handler.plan)(&ctx, &intent) {
            Ok(plan) => plan,
            Err(err) => return err.into_outcome(),
        };

        match (handler.class, plan) {
            (_, Plan::Reply(text)) => Outcome::Executed(text),
            (
                HandlerClass::Destructive,
                Plan::Mutate {
                    mutation,
                    prompt,
                    success,
                },
            ) => {
                let action = PendingAction::new(mutation, prompt.clone(), success);
                let proposed = gate::propose(session, action).clone();
                info!(
                    session = %session.key,
                    kind = proposed.kind.as_str(),
                    "confirmation requested"
                );
                Outcome::PendingConfirmation(prompt, proposed)
            }
            (
                _,
                Plan::Mutate {
                    mutation, success, ..
                },
            ) => match self.sync.apply(&mutation).await {
                Ok(_) => Outcome::Executed(success),
                Err(err) => CommandError::from(err).into_outcome(),
            },
        }
    }
}

fn plan_expense(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    plan_entry(ctx, intent, TransactionKind::Expense)
}

fn plan_income(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    plan_entry(ctx, intent, TransactionKind::Income)
}

fn plan_subscription(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    plan_entry(ctx, intent, TransactionKind::Subscription)
}

fn plan_entry(
    ctx: &PlanContext<'_>,
    intent: &Intent,
    kind: TransactionKind,
) -> Result<Plan, CommandError> {
    let amount = positive(intent, "amount")?;
    let account = resolve(
        &ctx.ledger.accounts,
        intent.text("account_id"),
        intent.hint_for("account"),
        ctx.policy,
    )?;
    let purpose = intent
        .text("purpose")
        .unwrap_or(match kind {
            TransactionKind::Income => "Income",
            TransactionKind::Subscription => "Subscription",
            _ => "General",
        })
        .to_string();
    let date = intent.date("date", ctx.today).unwrap_or(ctx.today);
    let tx_id = new_tx_id();
    let account_id = account.id.clone();
    let (mutation, after) = match kind {
        TransactionKind::Income => (
            Mutation::Income {
                tx_id,
                amount,
                account_id,
                purpose: purpose.clone(),
                date,
            },
            account.balance + amount,
        ),
        TransactionKind::Subscription => (
            Mutation::Subscription {
                tx_id,
                amount,
                account_id,
                purpose: purpose.clone(),
                date,
            },
            account.balance - amount,
        ),
        _ => (
            Mutation::Expense {
                tx_id,
                amount,
                account_id,
                purpose: purpose.clone(),
                date,
            },
            account.balance - amount,
        ),
    };
    let success = format!(
        "{} of {} for {}. {} balance: {}.",
        kind.as_str(),
        ctx.money(amount),
        purpose,
        account.name,
        ctx.money(after)
    );
    Ok(Plan::Mutate {
        mutation,
        prompt: String::new(),
        success,
    })
}

fn plan_transfer(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let amount = positive(intent, "amount")?;
    let from = ctx.account(intent, "from_account_id", "from")?;
    let to = ctx.account(intent, "to_account_id", "to")?;
    if from.id == to.id {
        return Err(CommandError::validation(
            "Pick two different accounts for a transfer.",
        ));
    }
    let purpose = intent
        .text("purpose")
        .map(str::to_string)
        .unwrap_or_else(|| format!("Transfer to {}", to.name));
    let success = format!(
        "Transferred {} from {} to {}.",
        ctx.money(amount),
        from.name,
        to.name
    );
    Ok(Plan::Mutate {
        mutation: Mutation::Transfer {
            tx_id: new_tx_id(),
            amount,
            from_account_id: from.id.clone(),
            to_account_id: to.id.clone(),
            purpose,
            date: intent.date("date", ctx.today).unwrap_or(ctx.today),
        },
        prompt: String::new(),
        success,
    })
}

fn is_self(name: &str) -> bool {
    matches!(
        name.trim().to_lowercase().as_str(),
        "me" | "i" | "self" | "myself" | "you"
    )
}

fn plan_split(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let amount = positive(intent, "amount")?;
    let names = intent.list("participants");
    let mut participants = Vec::with_capacity(names.len());
    for name in &names {
        let friend = ctx.friend(None, Some(name.as_str()))?;
        if participants.iter().any(|f: &&Friend| f.id == friend.id) {
            return Err(CommandError::validation(format!(
                "{} is listed more than once.",
                friend.name
            )));
        }
        participants.push(friend);
    }
    let participant_ids: Vec<String> = participants.iter().map(|f| f.id.clone()).collect();
    let joined = participants
        .iter()
        .map(|f| f.name.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let share = split_share(amount, participants.len());
    let purpose = intent.text("purpose").unwrap_or("Split bill").to_string();
    let date = intent.date("date", ctx.today).unwrap_or(ctx.today);

    let payer_name = intent.text("payer").filter(|name| !is_self(name));
    let (payer, account_id, who) = match payer_name {
        None => {
            let account = resolve(
                &ctx.ledger.accounts,
                intent.text("account_id"),
                intent.text("account"),
                ctx.policy,
            )?;
            (Payer::User, Some(account.id.clone()), "You".to_string())
        }
        Some(name) => {
            let friend = ctx.friend(intent.text("payer_id"), Some(name))?;
            if participant_ids.contains(&friend.id) {
                return Err(CommandError::validation(format!(
                    "{} paid, so leave them out of the participants.",
                    friend.name
                )));
            }
            (Payer::Friend(friend.id.clone()), None, friend.name.clone())
        }
    };

    let success = format!(
        "{who} paid {} for {purpose}, split with {joined}. Each share: {}.",
        ctx.money(amount),
        ctx.money(share)
    );
    Ok(Plan::Mutate {
        mutation: Mutation::Split {
            tx_id: new_tx_id(),
            amount,
            payer,
            account_id,
            participant_ids,
            purpose,
            date,
        },
        prompt: String::new(),
        success,
    })
}

fn plan_settle(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let friend = ctx.friend(intent.text("friend_id"), intent.hint_for("friend"))?;
    let account = resolve(
        &ctx.ledger.accounts,
        intent.text("account_id"),
        intent.text("account"),
        ctx.policy,
    )?;
    let net = friend.net_balance;
    if net.abs() < hearth_core::MONEY_EPSILON {
        return Err(CommandError::validation(format!(
            "You and {} are already settled.",
            friend.name
        )));
    }
    let success = if net > 0.0 {
        format!(
            "{} paid you {} into {}. All settled.",
            friend.name,
            ctx.money(net),
            account.name
        )
    } else {
        format!(
            "You paid {} {} from {}. All settled.",
            friend.name,
            ctx.money(-net),
            account.name
        )
    };
    Ok(Plan::Mutate {
        mutation: Mutation::Settlement {
            tx_id: new_tx_id(),
            friend_id: friend.id.clone(),
            account_id: account.id.clone(),
            date: ctx.today,
        },
        prompt: String::new(),
        success,
    })
}

fn plan_set_balance(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let new_balance = intent
        .number("balance")
        .ok_or_else(|| CommandError::validation("What should the new balance be?"))?;
    let account = resolve(
        &ctx.ledger.accounts,
        intent.text("account_id"),
        intent.hint_for("account"),
        ctx.policy,
    )?;
    Ok(Plan::Mutate {
        mutation: Mutation::BalanceOverwrite {
            tx_id: new_tx_id(),
            account_id: account.id.clone(),
            new_balance,
            date: ctx.today,
        },
        prompt: format!(
            "Set {} balance from {} to {}?",
            account.name,
            ctx.money(account.balance),
            ctx.money(new_balance)
        ),
        success: format!("{} balance set to {}.", account.name, ctx.money(new_balance)),
    })
}

fn plan_add_account(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let name = required_text(intent, "name", "What should the account be called?")?;
    if ctx
        .ledger
        .accounts
        .iter()
        .any(|account| account.name.eq_ignore_ascii_case(name))
    {
        return Err(CommandError::validation(format!(
            "An account named {name} already exists."
        )));
    }
    let kind = intent.text("type").unwrap_or("bank").to_lowercase();
    let opening = intent.number("balance").unwrap_or(0.0);
    let account = Account::new(name, kind.clone(), opening);
    Ok(Plan::Mutate {
        success: format!(
            "Added account {name} ({kind}) with {}.",
            ctx.money(opening)
        ),
        mutation: Mutation::CreateAccount(account),
        prompt: String::new(),
    })
}

fn plan_delete_account(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let account = resolve(
        &ctx.ledger.accounts,
        intent.text("account_id"),
        intent.hint_for("account"),
        ctx.policy,
    )?;
    Ok(Plan::Mutate {
        mutation: Mutation::DeleteAccount {
            account_id: account.id.clone(),
        },
        prompt: format!(
            "Delete account \"{}\" (balance {})? Its transactions are kept.",
            account.name,
            ctx.money(account.balance)
        ),
        success: format!("Deleted account {}.", account.name),
    })
}

fn plan_list_accounts(ctx: &PlanContext<'_>, _intent: &Intent) -> Result<Plan, CommandError> {
    if ctx.ledger.accounts.is_empty() {
        return Ok(Plan::Reply("No accounts yet.".to_string()));
    }
    let mut lines = vec!["Accounts:".to_string()];
    for account in &ctx.ledger.accounts {
        lines.push(format!(
            "• {} ({}): {}",
            account.name,
            account.kind,
            ctx.money(account.balance)
        ));
    }
    let total: f64 = ctx.ledger.accounts.iter().map(|a| a.balance).sum();
    lines.push(format!("Total: {}", ctx.money(total)));
    Ok(Plan::Reply(lines.join("\n")))
}

fn plan_add_friend(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let name = required_text(intent, "name", "What is your friend's name?")?;
    if ctx
        .ledger
        .friends
        .iter()
        .any(|friend| friend.name.eq_ignore_ascii_case(name))
    {
        return Err(CommandError::validation(format!(
            "{name} is already in your friends."
        )));
    }
    Ok(Plan::Mutate {
        mutation: Mutation::CreateFriend(Friend::new(name)),
        prompt: String::new(),
        success: format!("Added friend {name}."),
    })
}

fn plan_list_friends(ctx: &PlanContext<'_>, _intent: &Intent) -> Result<Plan, CommandError> {
    if ctx.ledger.friends.is_empty() {
        return Ok(Plan::Reply("No friends yet.".to_string()));
    }
    let mut lines = vec!["Friends:".to_string()];
    for friend in &ctx.ledger.friends {
        let net = friend.net_balance;
        let line = if net.abs() < hearth_core::MONEY_EPSILON {
            format!("• {}: settled", friend.name)
        } else if net > 0.0 {
            format!("• {} owes you {}", friend.name, ctx.money(net))
        } else {
            format!("• You owe {} {}", friend.name, ctx.money(-net))
        };
        lines.push(line);
    }
    Ok(Plan::Reply(lines.join("\n")))
}

fn plan_list_transactions(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    if ctx.ledger.transactions.is_empty() {
        return Ok(Plan::Reply("No transactions yet.".to_string()));
    }
    let limit = intent
        .number("limit")
        .filter(|n| *n >= 1.0)
        .map(|n| n as usize)
        .unwrap_or(10);
    let mut recent: Vec<_> = ctx.ledger.transactions.iter().enumerate().collect();
    recent.sort_by(|(ia, a), (ib, b)| b.date.cmp(&a.date).then(ib.cmp(ia)));
    let mut lines = vec!["Recent transactions:".to_string()];
    for (_, tx) in recent.into_iter().take(limit) {
        lines.push(format!(
            "• {} {} {} {}",
            tx.date,
            tx.kind.as_str(),
            ctx.money(tx.amount),
            tx.purpose
        ));
    }
    Ok(Plan::Reply(lines.join("\n")))
}

fn plan_delete_transaction(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let tx = resolve(
        &ctx.ledger.transactions,
        intent.text("transaction_id"),
        intent.hint_for("transaction"),
        ctx.policy,
    )?;
    Ok(Plan::Mutate {
        mutation: Mutation::DeleteTransaction {
            transaction_id: tx.id.clone(),
        },
        prompt: format!(
            "Delete {} of {} for {} on {}? Account balances will not change.",
            tx.kind.as_str(),
            ctx.money(tx.amount),
            tx.purpose,
            tx.date
        ),
        success: format!("Deleted transaction: {}.", tx.purpose),
    })
}

fn plan_add_reminder(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let title = required_text(intent, "title", "What should I remind you about?")?;
    let date = intent.date("date", ctx.today).ok_or_else(|| {
        CommandError::validation("When? Send a date as YYYY-MM-DD, today or tomorrow.")
    })?;
    let time = match intent.text("time") {
        None => None,
        Some(raw) if raw.eq_ignore_ascii_case("skip") => None,
        Some(raw) => Some(parse_time(raw).ok_or_else(|| {
            CommandError::validation("That isn't a time I understand. Use HH:MM.")
        })?),
    };
    let reminder = Reminder::new(title, date, time);
    let success = format!("Reminder set: {} on {}.", reminder.title, reminder.due_label());
    Ok(Plan::Mutate {
        mutation: Mutation::CreateReminder(reminder),
        prompt: String::new(),
        success,
    })
}

fn plan_list_reminders(ctx: &PlanContext<'_>, _intent: &Intent) -> Result<Plan, CommandError> {
    let mut open: Vec<&Reminder> = ctx.ledger.reminders.iter().filter(|r| !r.done).collect();
    if open.is_empty() {
        return Ok(Plan::Reply("No open reminders.".to_string()));
    }
    open.sort_by(|a, b| (a.date, a.time).cmp(&(b.date, b.time)));
    let mut lines = vec!["Reminders:".to_string()];
    for reminder in open {
        lines.push(format!("• {} {}", reminder.due_label(), reminder.title));
    }
    Ok(Plan::Reply(lines.join("\n")))
}

fn plan_edit_reminder(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let reminder = ctx.reminder(intent)?;
    let title = intent.text("title").map(str::to_string);
    let date = match intent.text("date") {
        Some(raw) => Some(parse_date(raw, ctx.today).ok_or_else(|| {
            CommandError::validation("That isn't a date I understand. Use YYYY-MM-DD.")
        })?),
        None => None,
    };
    let time = match intent.text("time") {
        Some(raw) => Some(parse_time(raw).ok_or_else(|| {
            CommandError::validation("That isn't a time I understand. Use HH:MM.")
        })?),
        None => None,
    };

    let mut changes = Vec::new();
    if let Some(title) = &title {
        changes.push(format!("title \"{title}\""));
    }
    if let Some(date) = date {
        changes.push(format!("date {date}"));
    }
    if let Some(time) = time {
        changes.push(format!("time {}", time.format("%H:%M")));
    }
    if changes.is_empty() {
        return Err(CommandError::validation(
            "What should change: the title, date or time?",
        ));
    }
    Ok(Plan::Mutate {
        mutation: Mutation::EditReminder {
            reminder_id: reminder.id.clone(),
            title,
            date,
            time,
        },
        prompt: format!(
            "Update reminder \"{}\" with {}?",
            reminder.title,
            changes.join(" and ")
        ),
        success: format!("Updated reminder \"{}\".", reminder.title),
    })
}

fn plan_delete_reminder(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let reminder = ctx.reminder(intent)?;
    Ok(Plan::Mutate {
        mutation: Mutation::DeleteReminder {
            reminder_id: reminder.id.clone(),
        },
        prompt: format!(
            "Delete reminder \"{}\" ({})?",
            reminder.title,
            reminder.due_label()
        ),
        success: format!("Deleted reminder \"{}\".", reminder.title),
    })
}

fn plan_complete_reminder(ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let reminder = ctx.reminder(intent)?;
    if reminder.done {
        return Err(CommandError::validation(format!(
            "\"{}\" is already done.",
            reminder.title
        )));
    }
    Ok(Plan::Mutate {
        mutation: Mutation::CompleteReminder {
            reminder_id: reminder.id.clone(),
        },
        prompt: String::new(),
        success: format!("Marked \"{}\" as done.", reminder.title),
    })
}

fn plan_chat(_ctx: &PlanContext<'_>, intent: &Intent) -> Result<Plan, CommandError> {
    let reply = intent
        .reply_text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or("I'm not sure what to do with that. Try \"spent 200 on lunch\" or /help.");
    Ok(Plan::Reply(reply.to_string()))
}

fn positive(intent: &Intent, key: &str) -> Result<f64, CommandError> {
    intent
        .number(key)
        .filter(|n| *n > 0.0)
        .ok_or_else(|| CommandError::validation("The amount must be a number greater than zero."))
}

fn required_text<'a>(
    intent: &'a Intent,
    key: &str,
    question: &str,
) -> Result<&'a str, CommandError> {
    intent
        .text(key)
        .ok_or_else(|| CommandError::validation(question))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(ledger: &Ledger) -> PlanContext<'_> {
        PlanContext {
            ledger,
            today: NaiveDate::from_ymd_opt(2026, 6, 1).expect("date"),
            currency: "₹",
            policy: MatchPolicy::First,
        }
    }

    #[test]
    fn every_intent_kind_has_exactly_one_handler() {
        let kinds = [
            IntentKind::AddExpense,
            IntentKind::AddIncome,
            IntentKind::AddSubscription,
            IntentKind::Transfer,
            IntentKind::SplitBill,
            IntentKind::SettleFriend,
            IntentKind::SetBalance,
            IntentKind::AddAccount,
            IntentKind::DeleteAccount,
            IntentKind::ListAccounts,
            IntentKind::AddFriend,
            IntentKind::ListFriends,
            IntentKind::ListTransactions,
            IntentKind::DeleteTransaction,
            IntentKind::AddReminder,
            IntentKind::ListReminders,
            IntentKind::EditReminder,
            IntentKind::DeleteReminder,
            IntentKind::CompleteReminder,
            IntentKind::Chat,
        ];
        for kind in kinds {
            let count = HANDLERS.iter().filter(|h| h.kind == kind).count();
            assert_eq!(count, 1, "{}", kind.as_str());
        }
        assert_eq!(HANDLERS.len(), kinds.len());
    }

    #[test]
    fn destructive_classification_matches_the_table() {
        let destructive: Vec<IntentKind> = HANDLERS
            .iter()
            .filter(|h| h.class == HandlerClass::Destructive)
            .map(|h| h.kind)
            .collect();
        assert_eq!(
            destructive,
            vec![
                IntentKind::SetBalance,
                IntentKind::DeleteAccount,
                IntentKind::DeleteTransaction,
                IntentKind::EditReminder,
                IntentKind::DeleteReminder,
            ]
        );
        assert_eq!(
            handler_for(IntentKind::CompleteReminder).map(|h| h.class),
            Some(HandlerClass::Write)
        );
    }

    #[test]
    fn missing_required_fields_ask_the_matching_question() {
        let today = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
        let handler = handler_for(IntentKind::AddReminder).expect("handler");
        let intent = Intent::new(IntentKind::AddReminder)
            .with_field("title", "Pay Rent")
            .with_field("date", "someday");
        let err = check_required(handler, &intent, today).expect_err("bad date");
        assert!(err.to_string().starts_with("When?"));

        let handler = handler_for(IntentKind::EditReminder).expect("handler");
        let intent = Intent::new(IntentKind::EditReminder).with_target_hint("rent");
        let err = check_required(handler, &intent, today).expect_err("no change");
        assert!(err.to_string().starts_with("What should change"));
    }

    #[test]
    fn expense_plan_predicts_balance_after() {
        let mut ledger = Ledger::new();
        ledger.accounts.push(Account::new("Cash", "wallet", 1000.0));
        let intent = Intent::new(IntentKind::AddExpense)
            .with_field("amount", 500)
            .with_field("purpose", "lunch");
        let Plan::Mutate { success, mutation, .. } =
            plan_expense(&ctx(&ledger), &intent).expect("plan")
        else {
            panic!("expected mutation");
        };
        assert_eq!(success, "EXPENSE of ₹500 for lunch. Cash balance: ₹500.");
        assert_eq!(mutation.kind(), hearth_core::MutationKind::Expense);
    }

    #[test]
    fn split_plan_rejects_payer_among_participants() {
        let mut ledger = Ledger::new();
        ledger.friends.push(Friend::new("Asha"));
        ledger.friends.push(Friend::new("Ben"));
        let intent = Intent::new(IntentKind::SplitBill)
            .with_field("amount", 600)
            .with_field("participants", "Asha, Ben")
            .with_field("payer", "Asha");
        let err = plan_split(&ctx(&ledger), &intent).expect_err("payer listed");
        assert!(err.to_string().contains("Asha paid"));
    }

    #[test]
    fn list_transactions_shows_newest_first() {
        let mut ledger = Ledger::new();
        let older = NaiveDate::from_ymd_opt(2026, 5, 1).expect("date");
        let newer = NaiveDate::from_ymd_opt(2026, 5, 2).expect("date");
        ledger.transactions.push(hearth_core::Transaction::new(
            TransactionKind::Income,
            10.0,
            "old",
            older,
        ));
        ledger.transactions.push(hearth_core::Transaction::new(
            TransactionKind::Expense,
            20.0,
            "new",
            newer,
        ));
        let Plan::Reply(text) = plan_list_transactions(
            &ctx(&ledger),
            &Intent::new(IntentKind::ListTransactions).with_field("limit", 1),
        )
        .expect("plan") else {
            panic!("expected reply");
        };
        assert!(text.contains("new"));
        assert!(!text.contains("old"));
    }
}
