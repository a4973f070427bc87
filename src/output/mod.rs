//! Output module for reporting on the sweep database
//!
//! This module handles reading back aggregate statistics and scan run
//! history for display.

pub mod stats;

pub use stats::{load_statistics, print_statistics, SweepStatistics};
