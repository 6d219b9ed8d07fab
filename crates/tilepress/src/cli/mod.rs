//! Command implementations for the tilepress CLI.

pub mod config;
pub mod filters;
pub mod process;
