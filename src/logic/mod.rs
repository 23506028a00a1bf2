//! Audio plumbing and schedule generation around the engine.

pub mod audio;
pub mod audio_thread;
pub mod autoplay;
