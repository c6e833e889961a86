//! # hyAway Common Library
//!
//! Shared code for the hyAway preference core:
//! - Error types
//! - Configuration loading and root folder resolution
//! - Tag parsing and listing order
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod tags;
pub mod time;

pub use error::{Error, Result};
pub use tags::Tag;
