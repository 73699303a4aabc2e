// Regression - app/mod.rs
//
// Application layer: ingestion passes and their scheduling.
// Dependencies: core layer, platform::fs for whole-file reads.

pub mod ingest;
pub mod scheduler;
