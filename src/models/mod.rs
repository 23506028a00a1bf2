//! Data models shared by the engine and its collaborators.

pub mod chart;
pub mod engine;
pub mod replay;
pub mod score;
pub mod settings;
pub mod stats;
