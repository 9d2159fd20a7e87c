//! Command implementations for the CLI
//!
//! - run: Fetch usage, render the PDF report and email it
//! - config: Configuration display and validation

pub mod config;
pub mod run;
