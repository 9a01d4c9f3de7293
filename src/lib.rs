//! gridcalc - a formula-driven grid calculator.
//!
//! Cells hold literal text or `=` formulas that may reference other cells by
//! name. Every edit recalculates the whole grid, and circular references are
//! reported per cell instead of aborting the pass.

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
pub use application::*;
