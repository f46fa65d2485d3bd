//! HTTP request handlers.

pub mod backup;
pub mod health;
pub mod photos;
pub mod projects;

pub use backup::*;
pub use health::*;
pub use photos::*;
pub use projects::*;
