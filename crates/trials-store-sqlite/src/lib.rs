//! SQLite backend for the clinical-trial store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on dedicated
//! connection threads without blocking the async runtime. Every write runs as
//! one `BEGIN IMMEDIATE` transaction built from the synchronous helpers in
//! [`resolver`], [`relations`] and [`locations`].

mod encode;
mod locks;
mod query;
mod schema;
mod store;
mod upsert;

pub mod config;
pub mod error;
pub mod locations;
pub mod relations;
pub mod resolver;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
