// Bot features
pub mod embed_renderer;
pub mod log_settings;
pub mod member_log;
pub mod settings_manager;
