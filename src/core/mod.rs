//! Core modules: storage plumbing shared by every catalog subsystem.
//!
//! Errors, identity, settings, the SQLite pool and broker, schema constants
//! and time helpers live here.

pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod pool;
pub mod schemas;
pub mod store;
pub mod time;
