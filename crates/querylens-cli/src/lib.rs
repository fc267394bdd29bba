//! querylens command-line interface.
//!
//! The binary lives in `main.rs`; configuration loading, tracing setup and
//! the subcommands are exposed here so they can be tested.

pub mod cli;
pub mod commands;
pub mod config;
pub mod observability;
pub mod output;
