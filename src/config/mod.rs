//! Configuration module for Bazaar-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use bazaar_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("bazaar.toml")).unwrap();
//! println!("Link scans use {} workers", config.scan.link_workers);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{Config, FailurePolicyKind, OutputConfig, ScanConfig, SiteConfig};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash};
