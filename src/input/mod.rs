//! Interactive input handling
//!
//! This module contains the multi-line input assembler.

pub mod multiline;

pub use multiline::{is_complete_command, MultiLineBuffer};
