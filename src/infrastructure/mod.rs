//! Infrastructure layer providing external service integrations.
//!
//! This module contains the persistence codec and file access.

pub mod persistence;

pub use persistence::*;
