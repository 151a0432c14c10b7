//! Foundation module - Core utilities and types
//!
//! - Math type aliases
//! - Frame timing
//! - Logging setup

pub mod math;
pub mod time;
pub mod logging;
