//! CLI command handlers
//!
//! Each backup operation has its own module. All of them work directly on
//! the data directory and expect the server to be stopped.

pub mod export;
pub mod import;
pub mod inspect;
