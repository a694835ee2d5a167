//! Utilities
//!
//! Common utilities used throughout the library.

pub mod error;

pub use error::*;
