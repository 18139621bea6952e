//! Core library for Go VV, an e-bike ride tracker.
//!
//! - `cache`: offline cache manager for the web app
//! - `telemetry`: simulated GPS rides with distance and speed accounting
//! - `api`: client for the activity backend
//! - `models`: activity and dashboard types shared by all of the above

pub mod api;
pub mod cache;
pub mod config;
pub mod models;
pub mod telemetry;
pub mod utils;

pub use config::Config;
