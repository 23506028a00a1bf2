//! Judgement window thresholds.

use crate::models::stats::Judgement;
use serde::{Deserialize, Serialize};

/// Lower and upper bounds of the scroll-velocity window scale.
const MIN_SV_SCALE: f64 = 0.1;
const MAX_SV_SCALE: f64 = 2.0;

/// Four ascending absolute-time thresholds in ms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HitWindow {
    pub cool: f64,
    pub good: f64,
    pub bad: f64,
    pub early_miss: f64,
}

impl HitWindow {
    pub fn new() -> Self {
        Self {
            cool: 25.0,
            good: 97.0,
            bad: 150.0,
            early_miss: 200.0,
        }
    }

    pub fn from_custom(cool: f64, good: f64, bad: f64, early_miss: f64) -> Self {
        Self {
            cool,
            good,
            bad,
            early_miss,
        }
    }

    /// True when the thresholds are positive and ascending.
    pub fn is_valid(&self) -> bool {
        self.cool > 0.0
            && self.cool < self.good
            && self.good < self.bad
            && self.bad < self.early_miss
    }

    /// Windows scaled for the local scroll velocity.
    ///
    /// Faster scroll tightens every threshold.
    pub fn scaled_for_sv(&self, sv_multiplier: f64) -> Self {
        let factor = (2.0 - sv_multiplier).clamp(MIN_SV_SCALE, MAX_SV_SCALE);
        Self {
            cool: self.cool * factor,
            good: self.good * factor,
            bad: self.bad * factor,
            early_miss: self.early_miss * factor,
        }
    }

    /// Judges an absolute time difference already scaled by the song rate.
    /// Returns `None` outside every window.
    pub fn time_to_result(&self, diff_ms: f64) -> Option<Judgement> {
        let diff = diff_ms.abs();
        if diff <= self.cool {
            Some(Judgement::Cool)
        } else if diff <= self.good {
            Some(Judgement::Good)
        } else if diff <= self.bad {
            Some(Judgement::Bad)
        } else if diff <= self.early_miss {
            Some(Judgement::Miss)
        } else {
            None
        }
    }

    /// Judges the distance between `time` and `reference` at `rate`.
    pub fn judge(&self, time: f64, reference: f64, rate: f64) -> Option<Judgement> {
        self.time_to_result((time - reference) / rate)
    }
}

impl Default for HitWindow {
    fn default() -> Self {
        Self::new()
    }
}
