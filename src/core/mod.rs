pub mod catalog;
pub mod config;
pub mod exchange;
pub mod message;
pub mod preferences;
pub mod provider;
pub mod session;
