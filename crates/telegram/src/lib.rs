pub mod commands;
pub mod format;

pub use commands::{start_bot, BotDeps, Command};
