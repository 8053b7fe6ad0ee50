//! Core types and trait definitions for the clinical-trial store.
//!
//! No database code lives here. Storage backends implement
//! [`store::TrialStore`]; ingestion runners depend only on the trait.

// Backends implement the trait with native `async fn`; the trait itself
// spells out the `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod entity;
pub mod error;
pub mod location;
pub mod normalize;
pub mod store;
pub mod trial;

pub use error::{Error, ErrorKind, Result};
pub use normalize::normalize;
