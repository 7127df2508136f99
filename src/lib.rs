//! SessionCap library
//!
//! Configuration and command plumbing behind the `sessioncap` binary; exposed
//! for integration testing.

pub mod cli;
pub mod config;

pub use config::{AppConfig, HostConfig};
