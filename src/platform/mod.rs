// Regression - platform/mod.rs
//
// Platform layer: directories, config.toml, file reads, durable storage.
// Dependencies: standard library, directories, toml, serde_json.
// Must NOT depend on: app.

pub mod config;
pub mod fs;
pub mod store;
