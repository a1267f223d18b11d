use hearth_core::LedgerError;
use thiserror::Error;

use crate::dispatch::Outcome;
use crate::sync::SyncError;

/// Failures recovered at the dispatcher and gate boundary. None of them leave
/// the local ledger out of step with the store.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),
    #[error("I couldn't find {entity} matching \"{hint}\".")]
    NotFound { entity: &'static str, hint: String },
    #[error("Couldn't save that ({0}). Nothing was changed, please try again.")]
    Persistence(String),
    #[error("Nothing to confirm.")]
    StaleConfirmation,
}

impl CommandError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn into_outcome(self) -> Outcome {
        match self {
            Self::Persistence(_) => Outcome::Failed(self.to_string()),
            _ => Outcome::Clarify(self.to_string()),
        }
    }
}

impl From<SyncError> for CommandError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Rejected(LedgerError::NotFound { entity, id }) => {
                Self::NotFound { entity, hint: id }
            }
            SyncError::Rejected(other) => Self::Validation(capitalize(&other.to_string())),
            persistence => Self::Persistence(persistence.to_string()),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => format!("{}{}.", first.to_uppercase(), chars.as_str()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn persistence_becomes_failed_everything_else_clarifies() {
        let failed = CommandError::Persistence("disk full".to_string()).into_outcome();
        assert!(matches!(failed, Outcome::Failed(ref msg) if msg.contains("disk full")));
        let stale = CommandError::StaleConfirmation.into_outcome();
        assert_eq!(stale, Outcome::Clarify("Nothing to confirm.".to_string()));
    }

    #[test]
    fn ledger_rejections_read_as_sentences() {
        let err = CommandError::from(SyncError::Rejected(LedgerError::SameAccount));
        assert_eq!(
            err,
            CommandError::Validation("Cannot transfer an account into itself.".to_string())
        );
    }
}
