//! gavel-gather - Municipal event gathering pipeline
//!
//! Composes interchangeable capability modules (source scraper, audio
//! extraction, transcription, object storage, document database) into a
//! single idempotent gather run: discover candidate events, derive or
//! retrieve transcripts, and merge the resulting entity graph into the
//! shared document store without ever duplicating state.

pub mod config;
pub mod models;
pub mod modules;
pub mod services;
pub mod types;
pub mod utils;

pub use config::GatherConfig;
pub use services::{GatherDeps, GatherOptions, Orchestrator};
