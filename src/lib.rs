//! Flood Monitor - Eyewitness flood report pipeline
//!
//! A Rust library for collecting social-media posts about floods,
//! classifying which of them are firsthand reports, and counting reports per
//! location and day.
//!
//! # Features
//!
//! - Idempotent ingestion from a recent-search API, deduplicated on
//!   author, text and timestamp
//! - Incremental classification through a chat-completions API that only
//!   touches unclassified messages and survives per-item failures
//! - A location x day report aggregate, updated incrementally or rebuilt
//! - CSV-backed tables readable by the existing dashboard

/// Location x day report counts
pub mod aggregate;
/// Classifier collaborator and reply parsing
pub mod classifier;
/// Configuration management
pub mod config;
/// Error types
pub mod error;
/// Table listings in TXT, CSV and JSON
pub mod file_writer;
/// Logging setup and utilities
pub mod logging;
/// Metrics collection
pub mod metrics;
/// Data models and structures
pub mod models;
/// Ingestion and classification stages
pub mod pipeline;
/// Table schema definitions
pub mod schema;
/// Message-search collaborator
pub mod search;
/// CSV table files
mod storage;
/// Ingested message table
pub mod store;
/// Input validation and normalization
pub mod validation;

// Re-export key components for easier access
pub use aggregate::LocationAggregate;
pub use error::{MonitorError, Result};
pub use models::{Classification, DedupKey, LocationReportBucket, Message, OutputFormat, ParsedReply};
pub use pipeline::{ClassificationStage, ClassificationSummary, IngestionStage, IngestionSummary};
pub use store::MessageStore;
