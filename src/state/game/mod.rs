//! Core gameplay engine for vertical-scroll rhythm charts.
//!
//! The `RhythmEngine` handles all real-time gameplay logic including:
//! - Audio, game and track clocks under variable playback rate
//! - Note spawning inside the prebuffer window
//! - Key dispatch into per-lane tracks and autoplay
//! - Score, combo and life tracking
//! - Beat-line recycling

mod input;
mod notes;
mod snapshot;

pub mod timing_lines;
pub mod track;

pub use input::GameAction;

use crate::error::{AudioError, EngineError};
use crate::logic::audio::{AudioDevice, AudioStream, KeysoundCache};
use crate::models::chart::{AutoSample, TimingInfo};
use crate::models::engine::hit_window::HitWindow;
use crate::models::engine::note::{NoteContext, NoteDesc};
use crate::models::engine::timing::{ScrollMode, TimingConverter};
use crate::models::replay::ReplayFrame;
use crate::models::score::ScoreManager;
use crate::models::settings::EngineSettings;
use crate::models::stats::{HoldEvent, NoteHitInfo};
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use timing_lines::{LineContext, TimingLineManager};
use track::{GameTrack, TrackSinks};

/// Audio clock value when `start` is called, in ms.
pub const START_OFFSET_MS: f64 = -3000.0;
/// Audio played past the chart length before the game ends, in ms.
pub const END_PADDING_MS: f64 = 2500.0;
/// Spawn lead time, divided by the notespeed.
const SPAWN_LEAD: f64 = 3000.0;
/// Reference width the scroll speed is tuned for.
const SCROLL_FACTOR: f64 = 1920.0 / 1366.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Nothing loaded.
    PreParing,
    /// Loaded, waiting for `start`.
    NotGame,
    Playing,
    /// Finished or stopped. Terminal until the next load.
    PosGame,
}

/// Listener output, drained by the caller once per frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EngineEvent {
    Key {
        lane: usize,
        pressed: bool,
    },
    HitEffect {
        lane: usize,
        is_hold: bool,
        is_release: bool,
    },
    Judgement(NoteHitInfo),
    Jam {
        combo: u32,
    },
    LongNote {
        lane: usize,
        event: HoldEvent,
        combo: u32,
    },
}

type OpenResult = Result<Box<dyn AudioStream>, AudioError>;

/// Main gameplay engine driving tracks, clocks and scoring.
pub struct RhythmEngine {
    settings: EngineSettings,
    audio: Arc<dyn AudioDevice>,
    keysounds: Box<dyn KeysoundCache>,
    state: EngineState,

    tracks: Vec<GameTrack>,
    /// Notes not yet spawned, in start-time order.
    note_descs: VecDeque<NoteDesc>,
    converter: TimingConverter,
    timing_lines: Option<TimingLineManager>,
    score: ScoreManager,

    /// Scheduled key events, replayed in time order.
    autoplay: VecDeque<ReplayFrame>,
    is_autoplay: bool,
    auto_samples: VecDeque<AutoSample>,

    audio_path: Option<PathBuf>,
    audio_length: f64,
    audio_rx: Option<Receiver<OpenResult>>,
    stream: Option<Box<dyn AudioStream>>,
    started_audio: bool,

    audio_position: f64,
    audio_game_position: f64,
    visual_position: f64,
    track_position: f64,
    bpm_index: usize,
    sv_index: usize,
    current_bpm: f64,
    current_sv_multiplier: f64,
    virtual_resolution: (f64, f64),
    virtual_scale: f64,

    events: Vec<EngineEvent>,
}

impl RhythmEngine {
    pub fn new(
        settings: EngineSettings,
        audio: Arc<dyn AudioDevice>,
        keysounds: Box<dyn KeysoundCache>,
    ) -> Self {
        let settings = settings.sanitized();
        let mut engine = Self {
            settings,
            audio,
            keysounds,
            state: EngineState::PreParing,
            tracks: Vec::new(),
            note_descs: VecDeque::new(),
            converter: TimingConverter::new(&[], &[], 1.0, ScrollMode::Velocity),
            timing_lines: None,
            score: ScoreManager::new(),
            autoplay: VecDeque::new(),
            is_autoplay: false,
            auto_samples: VecDeque::new(),
            audio_path: None,
            audio_length: 0.0,
            audio_rx: None,
            stream: None,
            started_audio: false,
            audio_position: 0.0,
            audio_game_position: 0.0,
            visual_position: 0.0,
            track_position: 0.0,
            bpm_index: 0,
            sv_index: 0,
            current_bpm: 0.0,
            current_sv_multiplier: 1.0,
            virtual_resolution: (0.0, 0.0),
            virtual_scale: 1.0,
            events: Vec::new(),
        };
        let [width, height] = engine.settings.resolution;
        engine.set_resolution(width, height);
        engine
    }

    /// Opens the music stream in the background and begins the pre-roll.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::NotGame {
            return Err(EngineError::InvalidState {
                expected: EngineState::NotGame,
                actual: self.state,
            });
        }

        self.audio_position = START_OFFSET_MS;
        self.started_audio = false;

        if let Some(path) = self.audio_path.clone() {
            let (tx, rx) = bounded(1);
            let device = Arc::clone(&self.audio);
            let spawned = thread::Builder::new()
                .name("Audio Open".to_string())
                .spawn(move || {
                    let _ = tx.send(device.open(&path));
                });
            match spawned {
                Ok(_) => self.audio_rx = Some(rx),
                Err(e) => log::error!("AUDIO: Failed to spawn open task: {}", e),
            }
        } else {
            log::warn!("ENGINE: Chart has no audio, running on the visual clock");
        }

        self.update_game_position();
        self.state = EngineState::Playing;
        log::info!("ENGINE: Playing ({} notes pending)", self.note_descs.len());
        Ok(())
    }

    /// Advances every clock by `delta` seconds and ticks the gameplay.
    pub fn update(&mut self, delta: f64) {
        if self.state != EngineState::Playing {
            return;
        }

        self.poll_audio();

        self.audio_position += delta * self.rate() * 1000.0;

        if !self.started_audio && self.audio_position >= 0.0 {
            self.started_audio = true;
            match self.stream.as_mut() {
                Some(stream) => stream.play(),
                None if self.audio_rx.is_some() => {
                    log::warn!("AUDIO: Stream not ready at 0 ms, playback will start late");
                }
                None => {}
            }
        }

        if self.audio_position > self.audio_length + END_PADDING_MS {
            self.state = EngineState::PosGame;
            if let Some(stream) = self.stream.as_mut() {
                stream.stop();
            }
            log::info!(
                "ENGINE: Finished at {:.0} ms, score {}",
                self.audio_position,
                self.score.score()
            );
            return;
        }

        self.update_game_position();
        self.spawn_notes();
        self.update_timing_lines();
        self.update_tracks();
        self.update_auto_samples();
        self.update_autoplay();
    }

    fn poll_audio(&mut self) {
        let Some(rx) = &self.audio_rx else {
            return;
        };

        match rx.try_recv() {
            Ok(Ok(mut stream)) => {
                stream.set_rate(self.rate() as f32);
                stream.set_volume(self.settings.audio_volume);
                if self.started_audio {
                    log::warn!(
                        "AUDIO: Stream arrived {:.0} ms into the song",
                        self.audio_position
                    );
                    stream.play();
                }
                self.stream = Some(stream);
                self.audio_rx = None;
            }
            Ok(Err(e)) => {
                log::warn!("AUDIO: {}, continuing without music", e);
                self.audio_rx = None;
            }
            Err(TryRecvError::Empty) => {}
            Err(TryRecvError::Disconnected) => {
                log::warn!("AUDIO: Open task ended without a result");
                self.audio_rx = None;
            }
        }
    }

    /// Recomputes the game, visual and track positions from the audio clock.
    fn update_game_position(&mut self) {
        self.audio_game_position = self.audio_position + self.settings.audio_offset_ms;
        self.visual_position = self.audio_game_position;

        let bpms = self.converter.bpms();
        while self.bpm_index + 1 < bpms.len()
            && self.visual_position >= bpms[self.bpm_index + 1].start_time
        {
            self.bpm_index += 1;
        }
        self.current_bpm = bpms.get(self.bpm_index).map(|bpm| bpm.value).unwrap_or(0.0);

        let svs = self.converter.svs();
        while self.sv_index < svs.len() && self.visual_position >= svs[self.sv_index].start_time {
            self.sv_index += 1;
        }
        self.current_sv_multiplier = self.converter.multiplier_at_index(self.sv_index);
        self.track_position = self
            .converter
            .position_at_index(self.visual_position, self.sv_index);
    }

    fn update_timing_lines(&mut self) {
        let ctx = self.line_context();
        if let Some(lines) = self.timing_lines.as_mut() {
            lines.update(&ctx);
        }
    }

    fn update_tracks(&mut self) {
        let ctx = self.note_context();
        let mut sinks = TrackSinks {
            score: &mut self.score,
            keysounds: &mut *self.keysounds,
            events: &mut self.events,
            keysound_volume: self.settings.keysound_volume,
        };
        for track in self.tracks.iter_mut() {
            track.update(&ctx, &mut sinks);
        }
    }

    /// Forces the terminal state and stops the music.
    pub fn stop(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            stream.stop();
        }
        if self.state != EngineState::PreParing {
            self.state = EngineState::PosGame;
        }
    }

    /// Drops every track, note and line. Safe to call repeatedly.
    pub fn release(&mut self) {
        for track in self.tracks.iter_mut() {
            track.release();
        }
        self.tracks.clear();
        self.note_descs.clear();
        if let Some(lines) = self.timing_lines.as_mut() {
            lines.release();
        }
        self.timing_lines = None;
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        self.audio_rx = None;
        self.autoplay.clear();
        self.auto_samples.clear();
        self.events.clear();
        self.state = EngineState::PreParing;
    }

    /// True once the background audio open has resolved, or none is in flight.
    pub fn ready(&self) -> bool {
        self.audio_rx.is_none()
    }

    /// Recomputes the virtual resolution used by the notespeed.
    pub fn set_resolution(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::warn!("ENGINE: Ignoring resolution {}x{}", width, height);
            return;
        }
        let (w, h) = (width as f64, height as f64);
        let ratio = width as f32 / height as f32;
        self.virtual_resolution = if ratio >= 16.0 / 9.0 {
            (w * ratio as f64, h)
        } else {
            (w, h / ratio as f64)
        };
        self.virtual_scale = self.virtual_resolution.1 / h;
        self.settings.resolution = [width, height];
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn rate(&self) -> f64 {
        self.settings.song_rate
    }

    pub fn lanes(&self) -> usize {
        self.tracks.len()
    }

    pub fn tracks(&self) -> &[GameTrack] {
        &self.tracks
    }

    /// Raw audio clock in ms.
    pub fn audio_position(&self) -> f64 {
        self.audio_position
    }

    /// Audio clock plus the configured offset.
    pub fn game_audio_position(&self) -> f64 {
        self.audio_game_position
    }

    pub fn visual_position(&self) -> f64 {
        self.visual_position
    }

    pub fn track_position(&self) -> f64 {
        self.track_position
    }

    /// Track units to virtual pixels, times 100.
    pub fn notespeed(&self) -> f64 {
        let speed = self.settings.scroll_speed as f64 / 10.0;
        speed / (20.0 * self.rate()) * SCROLL_FACTOR * self.virtual_scale
    }

    /// Negative spawn margin in track units.
    pub fn prebuffer_timing(&self) -> f64 {
        -300000.0 / self.notespeed()
    }

    pub fn virtual_resolution(&self) -> (f64, f64) {
        self.virtual_resolution
    }

    /// Judgement windows scaled for the current scroll velocity.
    pub fn timing_window(&self) -> HitWindow {
        self.settings
            .judgement
            .scaled_for_sv(self.current_sv_multiplier)
    }

    pub fn bpms(&self) -> &[TimingInfo] {
        self.converter.bpms()
    }

    pub fn svs(&self) -> &[TimingInfo] {
        self.converter.svs()
    }

    pub fn current_bpm(&self) -> f64 {
        self.current_bpm
    }

    pub fn current_sv_multiplier(&self) -> f64 {
        self.current_sv_multiplier
    }

    /// BPM in effect at any chart time.
    pub fn bpm_at(&self, offset: f64) -> f64 {
        self.converter.bpm_at(offset)
    }

    pub fn score_manager(&self) -> &ScoreManager {
        &self.score
    }

    pub fn timing_lines(&self) -> Option<&TimingLineManager> {
        self.timing_lines.as_ref()
    }

    /// Notes still waiting to spawn.
    pub fn pending_notes(&self) -> usize {
        self.note_descs.len()
    }

    pub fn is_autoplay(&self) -> bool {
        self.is_autoplay
    }

    /// Takes every event buffered since the last drain.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn note_context(&self) -> NoteContext {
        NoteContext {
            audio_position: self.audio_game_position,
            track_position: self.track_position,
            prebuffer: self.prebuffer_timing(),
            window: self.timing_window(),
            rate: self.rate(),
        }
    }

    fn line_context(&self) -> LineContext {
        LineContext {
            track_position: self.track_position,
            audio_position: self.audio_game_position,
            notespeed: self.notespeed(),
            prebuffer: self.prebuffer_timing(),
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::{EngineEvent, EngineState, RhythmEngine};
    use crate::logic::audio::{KeysoundCache, SilentAudio};
    use crate::models::chart::{Chart, NoteInfo};
    use crate::models::settings::EngineSettings;
    use std::sync::{Arc, Mutex};

    /// Keysound cache whose history stays readable after the engine takes it.
    #[derive(Clone, Default)]
    pub struct SharedKeysounds {
        played: Arc<Mutex<Vec<u32>>>,
        stopped: Arc<Mutex<Vec<u32>>>,
    }

    impl SharedKeysounds {
        pub fn played(&self) -> Vec<u32> {
            self.played.lock().unwrap().clone()
        }

        pub fn stopped(&self) -> Vec<u32> {
            self.stopped.lock().unwrap().clone()
        }
    }

    impl KeysoundCache for SharedKeysounds {
        fn play(&mut self, index: u32, _volume: f32) {
            self.played.lock().unwrap().push(index);
        }

        fn stop(&mut self, index: u32) {
            self.stopped.lock().unwrap().push(index);
        }
    }

    pub fn engine_with(settings: EngineSettings) -> (RhythmEngine, SharedKeysounds) {
        let keysounds = SharedKeysounds::default();
        let engine = RhythmEngine::new(
            settings,
            Arc::new(SilentAudio),
            Box::new(keysounds.clone()),
        );
        (engine, keysounds)
    }

    /// Four lanes, one tap every 500 ms from 1000 to 4500, lanes 0 to 3 twice.
    pub fn simple_chart() -> Chart {
        let mut chart = Chart::new(4, 120.0);
        chart.title = "simple".to_string();
        chart.notes = (0..8)
            .map(|i| NoteInfo::normal(1000.0 + i as f64 * 500.0, i % 4))
            .collect();
        chart
    }

    /// Ticks at 10 ms until the engine leaves `Playing`, collecting events.
    pub fn run_to_end(engine: &mut RhythmEngine) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        for _ in 0..100_000 {
            if engine.state() != EngineState::Playing {
                break;
            }
            engine.update(0.01);
            events.extend(engine.drain_events());
        }
        events
    }
}
