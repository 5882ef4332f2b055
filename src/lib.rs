#![allow(non_snake_case)]

// Library surface shared by the `watcher` binary and the integration tests.
pub mod api;
pub mod channel;
pub mod config;
pub mod data_model;
pub mod error;
pub mod presentation;
pub mod reducer;
pub mod store;
pub mod tracker;
pub mod utils;
pub mod watch_logic;

pub use error::{Result, TrackerError};
pub use tracker::ProcessingTracker;
