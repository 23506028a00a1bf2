//! Render snapshots handed to a render sink.
//!
//! Snapshots are immutable captures of engine state. The engine decides what
//! is drawable and where; the sink only draws.

use crate::models::engine::note::NoteState;
use crate::models::score::ScoreSummary;
use crate::state::game::EngineState;

/// A drawable note. Y values are in virtual pixels, growing downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteSprite {
    pub lane: usize,
    pub head_y: f64,
    /// Tail position for long notes.
    pub tail_y: Option<f64>,
    pub state: NoteState,
}

/// Snapshot of gameplay state for rendering.
#[derive(Clone, Debug)]
pub struct GameplaySnapshot {
    pub state: EngineState,
    /// Game clock in ms (audio clock plus the configured offset).
    pub audio_time: f64,
    pub track_position: f64,
    pub notespeed: f64,
    pub hit_position: f64,
    pub bpm: f64,

    pub notes: Vec<NoteSprite>,
    /// Beat lines currently on screen.
    pub timing_lines: Vec<f64>,
    /// Per-lane key held state.
    pub keys_held: Vec<bool>,

    pub score: ScoreSummary,
}

/// Consumer of per-frame snapshots.
pub trait RenderSink {
    fn submit(&mut self, snapshot: GameplaySnapshot);
}

impl RenderSink for Vec<GameplaySnapshot> {
    fn submit(&mut self, snapshot: GameplaySnapshot) {
        self.push(snapshot);
    }
}

impl RenderSink for crossbeam_channel::Sender<GameplaySnapshot> {
    fn submit(&mut self, snapshot: GameplaySnapshot) {
        // A full channel means the renderer is behind; drop the frame.
        let _ = self.try_send(snapshot);
    }
}
