// External services
pub mod database;
