// Slash commands
pub mod logging;
