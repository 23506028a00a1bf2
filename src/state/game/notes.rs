//! Chart loading and note spawning.

use super::timing_lines::TimingLineManager;
use super::track::GameTrack;
use super::{EngineState, RhythmEngine, SPAWN_LEAD, START_OFFSET_MS};
use crate::error::EngineError;
use crate::logic::autoplay::create_autoplay;
use crate::models::chart::{AutoSample, Chart};
use crate::models::engine::note::NoteDesc;
use crate::models::engine::timing::{ScrollMode, TimingConverter};
use crate::models::replay::ReplayData;
use crate::models::score::ScoreManager;
use crate::models::settings::LaneMod;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::VecDeque;

/// Notes preallocated per lane pool.
const PREALLOCATED_NOTES: usize = 32;

/// Rearranges lanes in place.
pub(crate) fn apply_lane_mod(chart: &mut Chart, lane_mod: LaneMod, seed: Option<u64>) {
    let lanes = chart.lanes;
    let mapping: Vec<usize> = match lane_mod {
        LaneMod::None => return,
        LaneMod::Mirror => (0..lanes).rev().collect(),
        LaneMod::Random => {
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };
            let mut lanes: Vec<usize> = (0..lanes).collect();
            lanes.shuffle(&mut rng);
            lanes
        }
    };

    for note in chart.notes.iter_mut() {
        note.lane = mapping[note.lane];
    }
    chart.sort();
}

impl RhythmEngine {
    /// Loads a chart, replacing whatever was loaded before.
    ///
    /// On error the engine is left in `PreParing` with no tracks. A replay,
    /// when given, drives every lane in place of player input.
    pub fn load(&mut self, chart: &Chart, replay: Option<ReplayData>) -> Result<(), EngineError> {
        self.release();

        let mut chart = chart.clone();
        chart.sort();
        if let Err(e) = chart.validate() {
            log::error!("ENGINE: Failed to load chart {:?}: {}", chart.title, e);
            return Err(e);
        }

        apply_lane_mod(&mut chart, self.settings.lane_mod, self.settings.random_seed);
        self.schedule_keysounds(&mut chart);

        let mode = if self.settings.no_sv {
            ScrollMode::Static
        } else {
            ScrollMode::Velocity
        };
        self.converter =
            TimingConverter::new(&chart.bpms, &chart.svs, chart.initial_sv_multiplier, mode);

        let mut per_lane = vec![0usize; chart.lanes];
        let converter = &self.converter;
        self.note_descs = chart
            .notes
            .iter()
            .map(|note| {
                per_lane[note.lane] += 1;
                let end_time = note.end_time();
                NoteDesc {
                    lane: note.lane,
                    start_time: note.start_time,
                    end_time,
                    initial_track_position: converter.position_at(note.start_time),
                    end_track_position: converter.position_at(note.last_time()),
                    keysound: note.keysound,
                    volume: note.volume,
                }
            })
            .collect();
        self.tracks = per_lane
            .iter()
            .enumerate()
            .map(|(lane, count)| GameTrack::with_capacity(lane, (*count).min(PREALLOCATED_NOTES)))
            .collect();

        self.is_autoplay = self.settings.autoplay || replay.is_some();
        self.autoplay = match replay {
            Some(mut replay) => {
                replay.sort();
                replay.frames.into()
            }
            None if self.settings.autoplay => create_autoplay(&chart).frames.into(),
            None => VecDeque::new(),
        };
        self.auto_samples = chart.auto_samples.iter().copied().collect();

        self.audio_path = chart.audio_path.clone();
        self.audio_length = chart.length();
        self.score = ScoreManager::new();

        self.started_audio = false;
        self.bpm_index = 0;
        self.sv_index = 0;
        self.audio_position = START_OFFSET_MS;
        self.update_game_position();

        let ctx = self.line_context();
        self.timing_lines = Some(if chart.custom_measures.is_empty() {
            TimingLineManager::new(&chart.bpms, &self.converter, self.audio_length, &ctx)
        } else {
            TimingLineManager::with_custom_measures(&chart.custom_measures, &self.converter, &ctx)
        });

        self.state = EngineState::NotGame;
        log::info!(
            "ENGINE: Loaded {:?} ({} lanes, {} notes, {} auto samples, length {:.0} ms)",
            chart.title,
            chart.lanes,
            self.note_descs.len(),
            self.auto_samples.len(),
            self.audio_length
        );
        Ok(())
    }

    /// Moves note keysounds onto the auto-sample schedule when they cannot
    /// follow input.
    fn schedule_keysounds(&self, chart: &mut Chart) {
        let offset_active = self.settings.audio_offset_ms != 0.0;
        if !self.settings.auto_sound && !offset_active {
            return;
        }

        let mut moved = 0;
        for note in chart.notes.iter_mut() {
            if let Some(index) = note.keysound.take() {
                chart.auto_samples.push(AutoSample {
                    start_time: note.start_time,
                    index,
                    volume: note.volume,
                });
                moved += 1;
            }
        }
        if moved > 0 {
            chart.sort();
            log::debug!("ENGINE: Scheduled {} keysounds as auto samples", moved);
        }
    }

    /// Hands every note inside the spawn window to its track.
    pub(crate) fn spawn_notes(&mut self) {
        let lead = SPAWN_LEAD / self.notespeed();
        let prebuffer = self.prebuffer_timing();

        while let Some(desc) = self.note_descs.front() {
            let due = self.audio_game_position + lead > desc.start_time
                || self.track_position - desc.initial_track_position > prebuffer;
            if !due {
                break;
            }
            let Some(desc) = self.note_descs.pop_front() else {
                break;
            };
            match self.tracks.get_mut(desc.lane) {
                Some(track) => track.add_note(&desc),
                None => log::warn!("TRACK: No track for lane {}", desc.lane),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{engine_with, simple_chart};
    use super::*;
    use crate::models::chart::NoteInfo;
    use crate::models::settings::EngineSettings;

    #[test]
    fn test_load_failure_stays_preparing() {
        let (mut engine, _) = engine_with(EngineSettings::default());
        let mut chart = simple_chart();
        chart.notes.clear();

        assert_eq!(engine.load(&chart, None), Err(EngineError::EmptyNoteList));
        assert_eq!(engine.state(), EngineState::PreParing);
        assert_eq!(engine.lanes(), 0);
        assert!(engine.timing_lines().is_none());
    }

    #[test]
    fn test_failed_reload_drops_previous_chart() {
        let (mut engine, _) = engine_with(EngineSettings::default());
        engine.load(&simple_chart(), None).unwrap();
        assert_eq!(engine.state(), EngineState::NotGame);

        let mut broken = simple_chart();
        broken.notes.push(NoteInfo::normal(500.0, 9));
        assert!(matches!(
            engine.load(&broken, None),
            Err(EngineError::LaneOutOfRange { lane: 9, .. })
        ));
        assert_eq!(engine.state(), EngineState::PreParing);
        assert_eq!(engine.pending_notes(), 0);
    }

    #[test]
    fn test_load_rejects_unbounded_chart_length() {
        let (mut engine, _) = engine_with(EngineSettings::default());
        let mut chart = simple_chart();
        chart.notes.push(NoteInfo::hold(5000.0, f64::INFINITY, 0));
        assert!(matches!(
            engine.load(&chart, None),
            Err(EngineError::InvalidHoldEnd { .. })
        ));
        assert_eq!(engine.state(), EngineState::PreParing);

        let mut chart = simple_chart();
        chart.audio_length = Some(f64::NAN);
        assert!(matches!(
            engine.load(&chart, None),
            Err(EngineError::InvalidAudioLength(_))
        ));
        assert!(engine.timing_lines().is_none());
    }

    #[test]
    fn test_load_prepares_tracks_and_clock() {
        let (mut engine, _) = engine_with(EngineSettings::default());
        engine.load(&simple_chart(), None).unwrap();

        assert_eq!(engine.lanes(), 4);
        assert_eq!(engine.pending_notes(), 8);
        assert_eq!(engine.audio_position(), START_OFFSET_MS);
        assert_eq!(engine.track_position(), START_OFFSET_MS * 100.0);
        assert!(!engine.is_autoplay());
    }

    #[test]
    fn test_notes_spawn_inside_lead_window() {
        let (mut engine, _) = engine_with(EngineSettings::default());
        engine.load(&simple_chart(), None).unwrap();
        engine.start().unwrap();

        // Lead is about 1334 ms at the default speed; the first note is at 1000.
        engine.update(0.0);
        assert_eq!(engine.pending_notes(), 8);

        while engine.audio_position() < -300.0 {
            engine.update(0.01);
        }
        assert_eq!(engine.pending_notes(), 7);
        assert_eq!(engine.tracks()[0].notes().len(), 1);
    }

    #[test]
    fn test_mirror_reverses_lanes() {
        let mut chart = simple_chart();
        apply_lane_mod(&mut chart, LaneMod::Mirror, None);
        let lanes: Vec<usize> = chart.notes.iter().map(|n| n.lane).collect();
        assert_eq!(lanes, vec![3, 2, 1, 0, 3, 2, 1, 0]);
    }

    #[test]
    fn test_random_is_a_seeded_permutation() {
        let mut a = simple_chart();
        let mut b = simple_chart();
        apply_lane_mod(&mut a, LaneMod::Random, Some(7));
        apply_lane_mod(&mut b, LaneMod::Random, Some(7));
        assert_eq!(a.notes, b.notes);

        let mut first_four: Vec<usize> = a.notes[..4].iter().map(|n| n.lane).collect();
        first_four.sort();
        assert_eq!(first_four, vec![0, 1, 2, 3]);
        // Same permutation for every row.
        for i in 0..4 {
            assert_eq!(a.notes[i].lane, a.notes[i + 4].lane);
        }
    }

    #[test]
    fn test_offset_moves_keysounds_to_samples() {
        let settings = EngineSettings {
            audio_offset_ms: 20.0,
            ..EngineSettings::default()
        };
        let (engine, _) = engine_with(settings);
        let mut chart = simple_chart();
        chart.notes[0].keysound = Some(3);

        engine.schedule_keysounds(&mut chart);
        assert_eq!(chart.notes[0].keysound, None);
        assert_eq!(chart.auto_samples.len(), 1);
        assert_eq!(chart.auto_samples[0].start_time, 1000.0);
        assert_eq!(chart.auto_samples[0].index, 3);
    }
}
