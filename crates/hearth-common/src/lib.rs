pub mod config;
pub mod logging;

pub const APP_NAME: &str = "Hearth";

pub use config::{
    ConfigError, DecoderConfig, DispatchConfig, HearthConfig, MatchPolicy, StoreBackend,
    StoreConfig, TelegramConfig, WebConfig,
};
