//! Subcommand implementations.

pub mod activities;
pub mod cache;
pub mod ride;
