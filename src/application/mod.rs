//! Application layer managing state and user workflows.
//!
//! This module coordinates between the domain layer and presentation layer,
//! tracking the selection, edit buffers, prompts and status messages.

pub mod state;

pub use state::*;
