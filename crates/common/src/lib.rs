//! # Logbay Common Library
//!
//! Shared infrastructure used by every Logbay crate.
//!
//! This crate provides:
//! - The configuration record (`AppConfig`/`PointConfig`) and its TOML loader
//! - Endpoint kind enums and the `Consumer` trait
//! - The bounded message pipeline with the drop-on-full offer policy
//! - Custom error types
//! - Structured logging setup with startup log-file rotation

// Module declarations
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, LoggerConfig, PointConfig};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use pipeline::{MessageReceiver, MessageSender};
pub use types::{Consumer, DigestKind, IngestKind};
