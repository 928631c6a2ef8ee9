//! Line Chat: multi-user line-protocol chat with a background job pool.

pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
pub mod server;
pub mod worker;
