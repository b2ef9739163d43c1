// Data models
pub mod embed;
pub mod event;
pub mod guild;
