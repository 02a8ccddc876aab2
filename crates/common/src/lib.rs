//! Fundscope Common Library
//!
//! Shared code for the Fundscope services including:
//! - Fundraising data model and fiscal year handling
//! - Tabular data source and text generation clients
//! - Data context cache
//! - Question parsing, analysis and narrative synthesis
//! - Error types, configuration and metrics

pub mod cache;
pub mod config;
pub mod engine;
pub mod errors;
pub mod llm;
pub mod metrics;
pub mod models;
pub mod source;

// Re-export commonly used types
pub use cache::DataContextCache;
pub use config::AppConfig;
pub use engine::QueryOrchestrator;
pub use errors::{AppError, Result};
pub use llm::TextGenerator;
pub use source::DataSource;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
