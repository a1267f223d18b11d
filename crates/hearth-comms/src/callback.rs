use hearth_gateway::{Choice, Reply, ReplyStatus};

use crate::telegram::{InlineButton, InlineKeyboard};

/// Inline button payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    Pick(String),
    Confirm(bool),
    Cancel,
    Done(String),
}

impl CallbackAction {
    pub fn parse(data: &str) -> Option<Self> {
        match data.trim() {
            "cancel" => Some(Self::Cancel),
            "confirm:yes" => Some(Self::Confirm(true)),
            "confirm:no" => Some(Self::Confirm(false)),
            other => {
                if let Some(value) = other.strip_prefix("pick:").filter(|v| !v.is_empty()) {
                    return Some(Self::Pick(value.to_string()));
                }
                other
                    .strip_prefix("done:")
                    .filter(|id| !id.is_empty())
                    .map(|id| Self::Done(id.to_string()))
            }
        }
    }

    pub fn encode(&self) -> String {
        match self {
            Self::Pick(value) => format!("pick:{value}"),
            Self::Confirm(true) => "confirm:yes".to_string(),
            Self::Confirm(false) => "confirm:no".to_string(),
            Self::Cancel => "cancel".to_string(),
            Self::Done(id) => format!("done:{id}"),
        }
    }
}

fn button(choice: &Choice, confirming: bool) -> InlineButton {
    let action = match choice.value.as_str() {
        "cancel" => CallbackAction::Cancel,
        "yes" if confirming => CallbackAction::Confirm(true),
        "no" if confirming => CallbackAction::Confirm(false),
        value => CallbackAction::Pick(value.to_string()),
    };
    InlineButton {
        text: choice.label.clone(),
        callback_data: action.encode(),
    }
}

pub fn keyboard_for(reply: &Reply) -> Option<InlineKeyboard> {
    if reply.choices.is_empty() {
        return None;
    }
    let confirming = reply.status == ReplyStatus::PendingConfirmation;
    Some(InlineKeyboard::column(
        reply.choices.iter().map(|choice| button(choice, confirming)),
    ))
}

pub fn mark_done_keyboard(reminder_id: &str) -> InlineKeyboard {
    InlineKeyboard::column([InlineButton {
        text: "Mark done".to_string(),
        callback_data: CallbackAction::Done(reminder_id.to_string()).encode(),
    }])
}
