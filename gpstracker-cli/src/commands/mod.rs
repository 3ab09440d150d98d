//! CLI command implementations.
//!
//! # Command Modules
//!
//! - [`replay`] - Replay a recorded track through the tracker
//! - [`simulate`] - Drive a synthetic straight-line track
//! - [`check`] - Validate and initialize configuration files

pub mod check;
pub mod common;
pub mod output;
pub mod replay;
pub mod simulate;
