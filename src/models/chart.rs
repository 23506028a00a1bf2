//! In-memory chart model consumed by the engine.
//!
//! Charts arrive already parsed. The engine only sorts and validates them
//! before building its tracks.

use crate::error::EngineError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

/// Maximum number of lanes a chart may declare.
pub const MAX_LANES: usize = 7;

/// A BPM or scroll-velocity change.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingInfo {
    /// Chart time in milliseconds.
    pub start_time: f64,
    #[serde(default)]
    pub beat: f64,
    /// BPM for tempo changes, multiplier for scroll-velocity changes.
    pub value: f64,
    /// Beats per measure.
    #[serde(default = "default_time_signature")]
    pub time_signature: f64,
}

fn default_time_signature() -> f64 {
    4.0
}

impl TimingInfo {
    pub fn new(start_time: f64, value: f64) -> Self {
        Self {
            start_time,
            beat: 0.0,
            value,
            time_signature: default_time_signature(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NoteKind {
    Normal,
    Hold { end_time: f64 },
}

/// A single note as stored in the chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteInfo {
    pub start_time: f64,
    pub kind: NoteKind,
    pub lane: usize,
    /// Keysound sample index, if any.
    #[serde(default)]
    pub keysound: Option<u32>,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

fn default_volume() -> f32 {
    1.0
}

impl NoteInfo {
    pub fn normal(start_time: f64, lane: usize) -> Self {
        Self {
            start_time,
            kind: NoteKind::Normal,
            lane,
            keysound: None,
            volume: 1.0,
        }
    }

    pub fn hold(start_time: f64, end_time: f64, lane: usize) -> Self {
        Self {
            start_time,
            kind: NoteKind::Hold { end_time },
            lane,
            keysound: None,
            volume: 1.0,
        }
    }

    pub fn with_keysound(mut self, index: u32) -> Self {
        self.keysound = Some(index);
        self
    }

    pub fn is_hold(&self) -> bool {
        matches!(self.kind, NoteKind::Hold { .. })
    }

    /// End time for holds, `None` for normal notes.
    pub fn end_time(&self) -> Option<f64> {
        match self.kind {
            NoteKind::Normal => None,
            NoteKind::Hold { end_time } => Some(end_time),
        }
    }

    /// The time a note stops mattering to the chart length.
    pub fn last_time(&self) -> f64 {
        self.end_time().unwrap_or(self.start_time)
    }

    fn sort_key(&self) -> (f64, f64) {
        (self.start_time, self.end_time().unwrap_or(-1.0))
    }
}

/// A sample triggered at a fixed chart time regardless of input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AutoSample {
    pub start_time: f64,
    pub index: u32,
    #[serde(default = "default_volume")]
    pub volume: f32,
}

/// A keysound file registered under a sample index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeysoundFile {
    pub index: u32,
    pub path: PathBuf,
}

/// An already-parsed chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    #[serde(default)]
    pub title: String,
    pub lanes: usize,
    pub base_bpm: f64,
    #[serde(default = "default_sv_multiplier")]
    pub initial_sv_multiplier: f64,
    pub bpms: Vec<TimingInfo>,
    #[serde(default)]
    pub svs: Vec<TimingInfo>,
    pub notes: Vec<NoteInfo>,
    #[serde(default)]
    pub auto_samples: Vec<AutoSample>,
    /// Explicit measure line times. Beat spacing is derived from BPMs when empty.
    #[serde(default)]
    pub custom_measures: Vec<f64>,
    #[serde(default)]
    pub audio_path: Option<PathBuf>,
    /// Keysound files referenced by note and auto-sample indices.
    #[serde(default)]
    pub samples: Vec<KeysoundFile>,
    /// Audio length in ms. Derived from the notes when absent.
    #[serde(default)]
    pub audio_length: Option<f64>,
}

fn default_sv_multiplier() -> f64 {
    1.0
}

fn cmp_f64(a: f64, b: f64) -> Ordering {
    a.total_cmp(&b)
}

impl Chart {
    pub fn new(lanes: usize, bpm: f64) -> Self {
        Self {
            title: String::new(),
            lanes,
            base_bpm: bpm,
            initial_sv_multiplier: 1.0,
            bpms: vec![TimingInfo::new(0.0, bpm)],
            svs: Vec::new(),
            notes: Vec::new(),
            auto_samples: Vec::new(),
            custom_measures: Vec::new(),
            audio_path: None,
            samples: Vec::new(),
            audio_length: None,
        }
    }

    /// Resolves relative audio and keysound paths against `dir`.
    pub fn resolve_paths(&mut self, dir: &Path) {
        let paths = self
            .audio_path
            .iter_mut()
            .chain(self.samples.iter_mut().map(|sample| &mut sample.path));
        for path in paths {
            if path.is_relative() {
                *path = dir.join(&*path);
            }
        }
    }

    /// Chart length in ms.
    pub fn length(&self) -> f64 {
        if let Some(length) = self.audio_length {
            return length;
        }
        self.notes
            .iter()
            .map(NoteInfo::last_time)
            .fold(0.0, f64::max)
    }

    /// Sorts every timeline. Notes are ordered by `(start, end)`, stable on ties.
    pub fn sort(&mut self) {
        self.bpms.sort_by(|a, b| cmp_f64(a.start_time, b.start_time));
        self.svs.sort_by(|a, b| cmp_f64(a.start_time, b.start_time));
        self.notes.sort_by(|a, b| {
            let (a_start, a_end) = a.sort_key();
            let (b_start, b_end) = b.sort_key();
            cmp_f64(a_start, b_start).then(cmp_f64(a_end, b_end))
        });
        self.auto_samples
            .sort_by(|a, b| cmp_f64(a.start_time, b.start_time));
        self.custom_measures.sort_by(|a, b| cmp_f64(*a, *b));
    }

    /// Checks the invariants the engine relies on. Expects a sorted chart.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.lanes == 0 || self.lanes > MAX_LANES {
            return Err(EngineError::InvalidLaneCount(self.lanes));
        }

        if self.bpms.is_empty() {
            return Err(EngineError::EmptyBpmList);
        }
        for (index, bpm) in self.bpms.iter().enumerate() {
            if !bpm.value.is_finite() || bpm.value == 0.0 || !bpm.start_time.is_finite() {
                return Err(EngineError::InvalidBpm {
                    index,
                    value: bpm.value,
                });
            }
            if index > 0 && bpm.start_time <= self.bpms[index - 1].start_time {
                return Err(EngineError::UnsortedBpm { index });
            }
        }

        for index in 1..self.svs.len() {
            if self.svs[index].start_time <= self.svs[index - 1].start_time {
                return Err(EngineError::UnsortedSv { index });
            }
        }

        if self.notes.is_empty() {
            return Err(EngineError::EmptyNoteList);
        }
        for (index, note) in self.notes.iter().enumerate() {
            if !note.start_time.is_finite() {
                return Err(EngineError::InvalidNoteTime { index });
            }
            if note.lane >= self.lanes {
                return Err(EngineError::LaneOutOfRange {
                    index,
                    lane: note.lane,
                    lanes: self.lanes,
                });
            }
            if let Some(end) = note.end_time() {
                if !end.is_finite() {
                    return Err(EngineError::InvalidHoldEnd { index });
                }
                if end < note.start_time {
                    return Err(EngineError::InvalidHold {
                        index,
                        start: note.start_time,
                        end,
                    });
                }
            }
        }

        if let Some(length) = self.audio_length
            && !(length.is_finite() && length >= 0.0)
        {
            return Err(EngineError::InvalidAudioLength(length));
        }

        Ok(())
    }
}
