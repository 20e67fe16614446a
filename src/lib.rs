#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # cosmosdb-mongo
//!
//! File-backed driver around [`cosmosdb_mongo_reconciler`]: TOML
//! configuration, a versioned JSON state file and a local emulator of the
//! control plane.

pub mod cli;
pub mod commands;
pub mod config;
pub mod emulator;
pub mod state_file;

pub use cosmosdb_mongo_reconciler;
