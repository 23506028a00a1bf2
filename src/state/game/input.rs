//! Input handling for RhythmEngine - handle_input, key dispatch, autoplay

use super::track::TrackSinks;
use super::{EngineState, RhythmEngine};
use crate::models::engine::note::NoteContext;
use crate::models::replay::ReplayHitType;
use crate::models::settings::{MAX_SCROLL_SPEED, MIN_SCROLL_SPEED};

/// Scroll speed change per step.
const SCROLL_SPEED_STEP: u32 = 10;

/// Gameplay actions accepted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameAction {
    Hit { lane: usize },
    Release { lane: usize },
    ScrollSpeedUp,
    ScrollSpeedDown,
}

impl RhythmEngine {
    /// Handles a gameplay input action.
    ///
    /// Lane input is ignored while a schedule drives the lanes.
    pub fn handle_input(&mut self, action: GameAction) {
        match action {
            GameAction::Hit { lane } => {
                if !self.is_autoplay {
                    self.on_key_down(lane);
                }
            }
            GameAction::Release { lane } => {
                if !self.is_autoplay {
                    self.on_key_up(lane);
                }
            }
            GameAction::ScrollSpeedUp => {
                self.set_scroll_speed(self.settings.scroll_speed.saturating_add(SCROLL_SPEED_STEP));
            }
            GameAction::ScrollSpeedDown => {
                self.set_scroll_speed(self.settings.scroll_speed.saturating_sub(SCROLL_SPEED_STEP));
            }
        }
    }

    pub fn set_scroll_speed(&mut self, speed: u32) {
        let speed = speed.clamp(MIN_SCROLL_SPEED, MAX_SCROLL_SPEED);
        if speed != self.settings.scroll_speed {
            log::debug!("ENGINE: Scroll speed {}", speed);
        }
        self.settings.scroll_speed = speed;
    }

    /// Presses `lane` at the current game position.
    pub fn on_key_down(&mut self, lane: usize) {
        let ctx = self.note_context();
        self.key_down_at(lane, &ctx);
    }

    /// Releases `lane` at the current game position.
    pub fn on_key_up(&mut self, lane: usize) {
        let ctx = self.note_context();
        self.key_up_at(lane, &ctx);
    }

    fn key_down_at(&mut self, lane: usize, ctx: &NoteContext) {
        if self.state != EngineState::Playing {
            return;
        }
        let Some(track) = self.tracks.get_mut(lane) else {
            log::debug!("ENGINE: Key down on missing lane {}", lane);
            return;
        };
        let mut sinks = TrackSinks {
            score: &mut self.score,
            keysounds: &mut *self.keysounds,
            events: &mut self.events,
            keysound_volume: self.settings.keysound_volume,
        };
        track.on_key_down(ctx, &mut sinks);
    }

    fn key_up_at(&mut self, lane: usize, ctx: &NoteContext) {
        if self.state != EngineState::Playing {
            return;
        }
        let Some(track) = self.tracks.get_mut(lane) else {
            log::debug!("ENGINE: Key up on missing lane {}", lane);
            return;
        };
        let mut sinks = TrackSinks {
            score: &mut self.score,
            keysounds: &mut *self.keysounds,
            events: &mut self.events,
            keysound_volume: self.settings.keysound_volume,
        };
        track.on_key_up(ctx, &mut sinks);
    }

    /// Plays every auto sample the audio clock has reached, once each.
    pub(crate) fn update_auto_samples(&mut self) {
        while let Some(sample) = self.auto_samples.front() {
            if self.audio_position < sample.start_time {
                break;
            }
            let volume = sample.volume * self.settings.keysound_volume;
            self.keysounds.play(sample.index, volume);
            self.auto_samples.pop_front();
        }
    }

    /// Replays scheduled key events at their own timestamps, in time order.
    pub(crate) fn update_autoplay(&mut self) {
        let base = self.note_context();
        while let Some(frame) = self.autoplay.front().copied() {
            if self.audio_game_position < frame.time {
                break;
            }
            self.autoplay.pop_front();

            let ctx = base.at(frame.time);
            match frame.kind {
                ReplayHitType::KeyDown => self.key_down_at(frame.lane, &ctx),
                ReplayHitType::KeyUp => self.key_up_at(frame.lane, &ctx),
            }
        }
    }
}
