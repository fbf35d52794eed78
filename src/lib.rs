pub mod auth;
pub mod config;
pub mod eligibility;
pub mod intake;
pub mod output;
pub mod server;
pub mod storage;
