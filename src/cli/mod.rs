//! CLI module for mnemobuddy
//!
//! Handles command-line argument parsing and configuration overrides.

pub mod args;

pub use args::{Args, BackendArg, Commands, Verbosity};
