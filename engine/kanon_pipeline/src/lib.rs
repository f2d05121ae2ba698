//! Suppression and the end-to-end anonymization pipeline.
//!
//! The [`Pipeline`] sequences grouping, risk measurement, generalization,
//! suppression and a final closeness audit over an in-memory record set,
//! producing a [`PipelineOutcome`] with the final records and the full metric
//! trail.
pub mod config;
pub mod pipeline;
pub mod suppress;

pub use config::PipelineConfig;
pub use pipeline::*;
pub use suppress::*;
