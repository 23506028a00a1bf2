//! State management module.
//!
//! - `RhythmEngine` - Active gameplay
//! - `GameTrack` - One lane of live notes
//! - `TimingLineManager` - Scrolling beat lines

pub mod game;

// Re-exports for convenient access
pub use game::timing_lines::TimingLineManager;
pub use game::track::GameTrack;
pub use game::{EngineEvent, EngineState, GameAction, RhythmEngine};
