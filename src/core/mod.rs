// Regression - core/mod.rs
//
// Core ingestion logic: record reconstruction, classification, extraction.
// Dependencies: chrono, regex, serde, uuid. No filesystem access.
// Must NOT depend on: platform, app.

pub mod export;
pub mod grouper;
pub mod metadata;
pub mod model;
pub mod severity;
pub mod store;
pub mod timestamp;
