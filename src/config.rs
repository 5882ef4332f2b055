// src/config.rs
pub mod cli;
pub mod tracker;

pub use tracker::{load_tracker_config, BackendConfig, StoreConfig, TrackerConfig};
