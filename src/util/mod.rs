//! Utility modules

pub mod path;
pub mod shell;
