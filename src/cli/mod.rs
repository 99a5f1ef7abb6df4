//! Command-line front end: argument handling, logging setup and prompts.
//! Nothing here runs inside the per-segment path.

pub mod commands;
pub mod error;
pub mod logging;
pub mod prompt;
