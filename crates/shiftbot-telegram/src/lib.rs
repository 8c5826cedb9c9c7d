//! `shiftbot-telegram`: Telegram front end. Handles commands and report intake,
//! and provides the document transport used by the dispatch scheduler.

pub mod adapter;
pub mod context;
pub mod error;
pub mod handler;
pub mod send;
pub mod transport;

pub use adapter::TelegramAdapter;
pub use context::BotContext;
pub use error::TelegramError;
pub use handler::Command;
pub use transport::TelegramTransport;
