//! timetravel command line
//!
//! Exposes the CLI modules for integration testing

pub mod cli;
pub mod config;

pub use config::Config;
