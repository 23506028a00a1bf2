//! Snapshot creation for RhythmEngine - create_snapshot, render

use super::RhythmEngine;
use crate::shared::snapshot::{GameplaySnapshot, NoteSprite, RenderSink};

/// Lines are kept slightly past the judgement line.
const LINE_MARGIN: f64 = 10.0;

impl RhythmEngine {
    /// Virtual-pixel Y of a track position. Grows downwards; the judgement
    /// line sits at `hit_position`.
    pub fn position_to_y(&self, track_position: f64) -> f64 {
        let hit_position = self.settings.hit_position as f64;
        hit_position + (self.track_position - track_position) * self.notespeed() / 100.0
    }

    /// Creates a snapshot of the current game state for rendering.
    pub fn create_snapshot(&self) -> GameplaySnapshot {
        let hit_position = self.settings.hit_position as f64;

        let notes = self
            .tracks
            .iter()
            .flat_map(|track| track.notes())
            .filter(|note| note.is_drawable() && !note.is_removable())
            .map(|note| NoteSprite {
                lane: note.lane(),
                head_y: self.position_to_y(note.initial_track_position()),
                tail_y: note
                    .is_hold()
                    .then(|| self.position_to_y(note.end_track_position())),
                state: note.state(),
            })
            .collect();

        let timing_lines = self
            .timing_lines
            .iter()
            .flat_map(|lines| lines.lines())
            .map(|line| self.position_to_y(line.offset()))
            .filter(|y| (0.0..hit_position + LINE_MARGIN).contains(y))
            .collect();

        GameplaySnapshot {
            state: self.state,
            audio_time: self.audio_game_position,
            track_position: self.track_position,
            notespeed: self.notespeed(),
            hit_position,
            bpm: self.current_bpm,
            notes,
            timing_lines,
            keys_held: self.tracks.iter().map(|track| track.is_pressed()).collect(),
            score: self.score.summary(),
        }
    }

    /// Submits this frame's snapshot to `sink`.
    pub fn render(&self, sink: &mut dyn RenderSink) {
        sink.submit(self.create_snapshot());
    }
}
