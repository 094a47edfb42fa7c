//! CLI module for deferral - command-line interface and subcommands.
//!
//! A thin caller over the library: it builds a scheduler from configuration
//! and drives a demo unit of work through a completion handle.

pub mod commands;

pub use commands::Cli;
