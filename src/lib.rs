pub mod accounts;
pub mod audit;
pub mod auth;
pub mod automation;
pub mod config;
pub mod insights;
pub mod output;
pub mod server;
pub mod store;
