/// Shared modules for the perpetual-futures screener
pub mod alert;
pub mod config;
pub mod history;
pub mod metrics;
