mod bot;
mod callback;
mod menu;
mod telegram;

pub use bot::TelegramBot;
pub use callback::{CallbackAction, keyboard_for, mark_done_keyboard};
pub use menu::MenuTracker;
pub use telegram::{
    BotIdentity, CallbackQuery, Chat, InlineButton, InlineKeyboard, Message, TelegramClient,
    Update, User,
};
