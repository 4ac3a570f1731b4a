//! Shared utilities

pub mod fs;
pub mod process;
pub mod retry;
