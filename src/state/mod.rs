//! Persistent application state

pub mod config;

pub use config::{Config, SinkKind};
