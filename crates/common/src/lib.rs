//! Common types for calder.
//!
//! This crate holds the small, dependency-light types shared by the
//! workspace crates. It contains pure data types with no I/O or side
//! effects.

pub mod types;

pub use types::*;
