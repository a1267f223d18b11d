use hearth_core::{Mutation, MutationKind};
use tracing::{debug, info};

use crate::dispatch::Outcome;
use crate::error::CommandError;
use crate::session::Session;
use crate::sync::SyncEngine;

/// A destructive mutation waiting for an explicit yes or no.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingAction {
    pub kind: MutationKind,
    pub target_id: String,
    pub payload: Mutation,
    pub prompt: String,
    pub success_message: String,
}

impl PendingAction {
    pub fn new(payload: Mutation, prompt: String, success_message: String) -> Self {
        Self {
            kind: payload.kind(),
            target_id: payload.target_id().to_string(),
            payload,
            prompt,
            success_message,
        }
    }
}

/// Stores `action` as the session's only pending action.
pub fn propose(session: &mut Session, action: PendingAction) -> &PendingAction {
    if let Some(previous) = session.pending.take() {
        debug!(
            session = %session.key,
            replaced = previous.kind.as_str(),
            "unresolved confirmation replaced"
        );
    }
    session.pending.insert(action)
}

/// Answers the pending confirmation. The action leaves the session before it
/// runs, so a repeated yes finds nothing.
pub async fn resolve(session: &mut Session, accepted: bool, sync: &SyncEngine) -> Outcome {
    let Some(action) = session.pending.take() else {
        return CommandError::StaleConfirmation.into_outcome();
    };
    if !accepted {
        info!(session = %session.key, kind = action.kind.as_str(), "confirmation declined");
        return Outcome::Executed("Okay, cancelled. Nothing was changed.".to_string());
    }

    info!(
        session = %session.key,
        kind = action.kind.as_str(),
        target = %action.target_id,
        "confirmation accepted"
    );
    match sync.apply(&action.payload).await {
        Ok(_) => Outcome::Executed(action.success_message),
        Err(err) => {
            let err = CommandError::from(err);
            match err {
                CommandError::NotFound { .. } => Outcome::Clarify(
                    "That record no longer exists, so nothing was changed.".to_string(),
                ),
                other => other.into_outcome(),
            }
        }
    }
}
