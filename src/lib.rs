pub mod audio;
pub mod config;
pub mod detection;
pub mod error;
pub mod exercise;
pub mod heuristics;
pub mod models;
pub mod pipeline;
pub mod server;
pub mod transcript;

pub use error::{CoachError, Result};
