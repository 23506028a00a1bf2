//! Timing synchronization and judgement engine for vertical-scroll rhythm
//! charts.

pub mod error;
pub mod logic;
pub mod models;
pub mod shared;
pub mod state;
pub mod system;

pub use error::{AudioError, EngineError};
pub use models::chart::Chart;
pub use models::settings::EngineSettings;
pub use state::{EngineEvent, EngineState, GameAction, RhythmEngine};
