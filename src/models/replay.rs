//! Serializable key schedules used for autoplay and replays.

use serde::{Deserialize, Serialize};

/// Current replay format version.
pub const REPLAY_FORMAT_VERSION: u8 = 1;

/// Press or release. Presses sort before releases at equal times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReplayHitType {
    KeyDown,
    KeyUp,
}

/// A single scheduled key event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ReplayFrame {
    /// Chart time in ms.
    pub time: f64,
    pub lane: usize,
    pub kind: ReplayHitType,
}

impl ReplayFrame {
    pub fn key_down(time: f64, lane: usize) -> Self {
        Self {
            time,
            lane,
            kind: ReplayHitType::KeyDown,
        }
    }

    pub fn key_up(time: f64, lane: usize) -> Self {
        Self {
            time,
            lane,
            kind: ReplayHitType::KeyUp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayData {
    pub version: u8,
    /// Frames in time order.
    pub frames: Vec<ReplayFrame>,
}

impl ReplayData {
    pub fn new(frames: Vec<ReplayFrame>) -> Self {
        let mut data = Self {
            version: REPLAY_FORMAT_VERSION,
            frames,
        };
        data.sort();
        data
    }

    /// Stable sort by time, presses first on ties.
    pub fn sort(&mut self) {
        self.frames
            .sort_by(|a, b| a.time.total_cmp(&b.time).then(a.kind.cmp(&b.kind)));
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn to_json(&self) -> Result<String, String> {
        serde_json::to_string(self).map_err(|e| e.to_string())
    }

    pub fn from_json(json: &str) -> Result<Self, String> {
        let mut data: Self = serde_json::from_str(json).map_err(|e| e.to_string())?;
        if data.version > REPLAY_FORMAT_VERSION {
            log::warn!(
                "REPLAY: Format version {} is newer than supported {}",
                data.version,
                REPLAY_FORMAT_VERSION
            );
        }
        data.sort();
        Ok(data)
    }
}

impl Default for ReplayData {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
