pub mod backup_exchange;
pub mod core;
pub mod notify;
pub mod projects;
pub mod reports;
pub mod setup;
pub mod upload;
