//! Storage module for persistent data storage
//!
//! Provides SQLite-based persistence for documents, embedded passages and
//! the per-user answer history.

mod database;

pub use database::{PassageStore, StoreStats};
