use hearth_common::MatchPolicy;
use hearth_core::{Account, Friend, Reminder, Transaction};

use crate::error::CommandError;

/// A record a target hint can be matched against.
pub trait Named {
    const ENTITY: &'static str;

    fn id(&self) -> &str;
    fn label(&self) -> &str;
}

impl Named for Account {
    const ENTITY: &'static str = "an account";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl Named for Friend {
    const ENTITY: &'static str = "a friend";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.name
    }
}

impl Named for Reminder {
    const ENTITY: &'static str = "a reminder";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.title
    }
}

impl Named for Transaction {
    const ENTITY: &'static str = "a transaction";

    fn id(&self) -> &str {
        &self.id
    }

    fn label(&self) -> &str {
        &self.purpose
    }
}

/// Picks one record: exact id first, then a case-insensitive substring of the
/// label, then (with no hint at all) the first record in collection order.
pub fn resolve<'a, T: Named>(
    items: &'a [T],
    id: Option<&str>,
    hint: Option<&str>,
    policy: MatchPolicy,
) -> Result<&'a T, CommandError> {
    if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
        return items
            .iter()
            .find(|item| item.id() == id)
            .ok_or_else(|| CommandError::NotFound {
                entity: T::ENTITY,
                hint: id.to_string(),
            });
    }

    let Some(hint) = hint.map(str::trim).filter(|hint| !hint.is_empty()) else {
        return match (items, policy) {
            ([], _) => Err(CommandError::validation(format!(
                "You don't have {} yet.",
                plural(T::ENTITY)
            ))),
            ([only], _) => Ok(only),
            ([first, ..], MatchPolicy::First) => Ok(first),
            (many, MatchPolicy::Clarify) => Err(ambiguous::<T>(many.iter())),
        };
    };

    let needle = hint.to_lowercase();
    let matches: Vec<&T> = items
        .iter()
        .filter(|item| item.label().to_lowercase().contains(&needle))
        .collect();
    match (matches.as_slice(), policy) {
        ([], _) => Err(CommandError::NotFound {
            entity: T::ENTITY,
            hint: hint.to_string(),
        }),
        ([only], _) => Ok(*only),
        ([first, ..], MatchPolicy::First) => Ok(*first),
        (many, MatchPolicy::Clarify) => {
            let exact: Vec<&&T> = many
                .iter()
                .filter(|item| item.label().to_lowercase() == needle)
                .collect();
            match exact.as_slice() {
                [only] => Ok(**only),
                _ => Err(ambiguous::<T>(many.iter().copied())),
            }
        }
    }
}

fn ambiguous<'a, T: Named + 'a>(items: impl Iterator<Item = &'a T>) -> CommandError {
    let names: Vec<String> = items.map(|item| format!("\"{}\"", item.label())).collect();
    CommandError::validation(format!(
        "Which one did you mean: {}? Please be more specific.",
        names.join(", ")
    ))
}

fn plural(entity: &str) -> String {
    let noun = entity
        .trim_start_matches("an ")
        .trim_start_matches("a ");
    format!("any {noun}s")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn reminders() -> Vec<Reminder> {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
        vec![
            Reminder::new("Pay Rent", date, None),
            Reminder::new("Rent agreement renewal", date, None),
            Reminder::new("Call mom", date, None),
        ]
    }

    #[test]
    fn substring_match_is_case_insensitive_first_wins() {
        let items = reminders();
        let hit = resolve(&items, None, Some("RENT"), MatchPolicy::First).expect("match");
        assert_eq!(hit.title, "Pay Rent");
        let hit = resolve(&items, None, Some("mom"), MatchPolicy::Clarify).expect("match");
        assert_eq!(hit.title, "Call mom");
    }

    #[test]
    fn clarify_policy_asks_when_hint_is_ambiguous() {
        let items = reminders();
        let err = resolve(&items, None, Some("rent"), MatchPolicy::Clarify).expect_err("ambiguous");
        let CommandError::Validation(message) = err else {
            panic!("expected validation error");
        };
        assert!(message.contains("\"Pay Rent\""));
        assert!(message.contains("\"Rent agreement renewal\""));
    }

    #[test]
    fn clarify_policy_prefers_a_unique_exact_label() {
        let date = NaiveDate::from_ymd_opt(2026, 6, 1).expect("date");
        let items = vec![
            Reminder::new("Gym fees", date, None),
            Reminder::new("Gym", date, None),
        ];
        let hit = resolve(&items, None, Some("gym"), MatchPolicy::Clarify).expect("exact");
        assert_eq!(hit.title, "Gym");
    }

    #[test]
    fn explicit_id_wins_and_must_exist() {
        let items = reminders();
        let hit = resolve(&items, Some(&items[2].id), Some("rent"), MatchPolicy::First)
            .expect("by id");
        assert_eq!(hit.title, "Call mom");
        let err = resolve(&items, Some("nope"), None, MatchPolicy::First).expect_err("missing");
        assert!(matches!(err, CommandError::NotFound { .. }));
    }

    #[test]
    fn no_hint_defaults_to_first_record() {
        let accounts = vec![
            Account::new("Cash", "wallet", 1.0),
            Account::new("Bank", "bank", 2.0),
        ];
        let hit = resolve(&accounts, None, None, MatchPolicy::First).expect("first");
        assert_eq!(hit.name, "Cash");
        assert!(resolve(&accounts, None, None, MatchPolicy::Clarify).is_err());
        let none: Vec<Account> = Vec::new();
        let err = resolve(&none, None, None, MatchPolicy::First).expect_err("empty");
        assert_eq!(
            err,
            CommandError::Validation("You don't have any accounts yet.".to_string())
        );
    }

    #[test]
    fn unmatched_hint_is_not_found() {
        let items = reminders();
        let err = resolve(&items, None, Some("dentist"), MatchPolicy::First).expect_err("none");
        assert_eq!(
            err.to_string(),
            "I couldn't find a reminder matching \"dentist\"."
        );
    }
}
