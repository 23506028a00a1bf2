//! Error types surfaced by chart loading and the audio backend.

use std::path::PathBuf;
use thiserror::Error;

use crate::state::game::EngineState;

/// Errors raised while loading a chart into the engine or driving its state machine.
#[derive(Debug, Error, PartialEq)]
pub enum EngineError {
    #[error("chart has no BPM changes")]
    EmptyBpmList,

    #[error("BPM change {index} is not strictly after the previous one")]
    UnsortedBpm { index: usize },

    #[error("BPM change {index} has invalid value {value}")]
    InvalidBpm { index: usize, value: f64 },

    #[error("scroll velocity change {index} is not strictly after the previous one")]
    UnsortedSv { index: usize },

    #[error("chart has no notes")]
    EmptyNoteList,

    #[error("note {index} has a non-finite start time")]
    InvalidNoteTime { index: usize },

    #[error("note {index} uses lane {lane} but the chart has {lanes} lanes")]
    LaneOutOfRange {
        index: usize,
        lane: usize,
        lanes: usize,
    },

    #[error("hold note {index} ends at {end} before it starts at {start}")]
    InvalidHold { index: usize, start: f64, end: f64 },

    #[error("hold note {index} has a non-finite end time")]
    InvalidHoldEnd { index: usize },

    #[error("audio length {0} is not a finite, non-negative duration")]
    InvalidAudioLength(f64),

    #[error("invalid lane count: {0}")]
    InvalidLaneCount(usize),

    #[error("engine is {actual:?}, expected {expected:?}")]
    InvalidState {
        expected: EngineState,
        actual: EngineState,
    },
}

/// Errors raised by an audio backend.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("cannot open {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },

    #[error("audio thread disconnected")]
    Disconnected,
}
