//! Score, life, combo and jam-gauge accumulation.
//!
//! `ScoreManager` is a reducer: its state depends only on the ordered stream
//! of judgements and long-note events fed into it.

use crate::models::stats::{HitStats, HoldEvent, Judgement, NoteHitInfo};

pub const MAX_LIFE: f64 = 100.0;
pub const MAX_PILLS: u32 = 5;
pub const MAX_JAM_GAUGE: u32 = 100;
/// Consecutive cools needed for one pill.
pub const COOLS_PER_PILL: u32 = 16;

/// What a single judgement changed, for event listeners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreOutcome {
    /// The judgement as scored. A pill may have upgraded Bad to Cool.
    pub info: NoteHitInfo,
    pub pill_used: bool,
    /// New jam combo when the gauge filled on this hit.
    pub jam_combo: Option<u32>,
    /// False for misses once life is depleted.
    pub notify: bool,
}

/// Flat copy of the counters, for snapshots and results.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScoreSummary {
    pub score: u32,
    pub stats: HitStats,
    pub combo: u32,
    pub max_combo: u32,
    pub jam_combo: u32,
    pub max_jam_combo: u32,
    pub ln_combo: u32,
    pub ln_max_combo: u32,
    pub life: f64,
    pub pills: u32,
}

#[derive(Debug, Clone)]
pub struct ScoreManager {
    stats: HitStats,
    score: u32,
    combo: u32,
    max_combo: u32,
    jam_gauge: u32,
    jam_combo: u32,
    max_jam_combo: u32,
    cool_combo: u32,
    pills: u32,
    ln_combo: u32,
    ln_max_combo: u32,
    life: f64,
}

impl ScoreManager {
    pub fn new() -> Self {
        Self {
            stats: HitStats::new(),
            score: 0,
            combo: 0,
            max_combo: 0,
            jam_gauge: 0,
            jam_combo: 0,
            max_jam_combo: 0,
            cool_combo: 0,
            pills: 0,
            ln_combo: 0,
            ln_max_combo: 0,
            life: MAX_LIFE,
        }
    }

    /// Life only moves while the player is alive.
    fn add_life(&mut self, amount: f64) {
        if self.life > 0.0 {
            self.life = (self.life + amount).clamp(0.0, MAX_LIFE);
        }
    }

    pub fn on_hit(&mut self, info: NoteHitInfo) -> ScoreOutcome {
        let mut info = info;
        let mut pill_used = false;

        match info.result {
            Judgement::Cool => {
                self.add_life(1.0);
                self.jam_gauge += 5;
                self.score += 100;
            }
            Judgement::Good => {
                self.add_life(0.5);
                self.jam_gauge += 2;
                self.score += 50;
            }
            Judgement::Bad => {
                if self.pills > 0 {
                    self.pills -= 1;
                    self.score += 100;
                    info.result = Judgement::Cool;
                    pill_used = true;
                } else {
                    self.add_life(-1.0);
                    self.score += 25;
                }
                self.jam_gauge += 1;
            }
            Judgement::Miss => {
                self.add_life(-5.0);
                self.combo = 0;
                self.jam_combo = 0;
                self.jam_gauge = 0;
                self.score = self.score.saturating_sub(25);
            }
        }
        self.stats.record(info.result);
        self.jam_gauge = self.jam_gauge.min(MAX_JAM_GAUGE);

        if info.result == Judgement::Cool {
            self.cool_combo += 1;
            if self.cool_combo >= COOLS_PER_PILL {
                self.cool_combo = 0;
                self.pills = (self.pills + 1).min(MAX_PILLS);
            }
        } else {
            self.cool_combo = 0;
        }

        if info.result.keeps_combo() {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }

        let mut jam_combo = None;
        if self.jam_gauge >= MAX_JAM_GAUGE {
            self.jam_gauge = 0;
            self.jam_combo += 1;
            self.max_jam_combo = self.max_jam_combo.max(self.jam_combo);
            jam_combo = Some(self.jam_combo);
        }

        ScoreOutcome {
            info,
            pill_used,
            jam_combo,
            notify: !(info.result.is_miss() && self.life <= 0.0),
        }
    }

    pub fn on_long_note(&mut self, event: HoldEvent) {
        match event {
            HoldEvent::Add => self.ln_combo += 1,
            HoldEvent::Break => self.ln_combo = 0,
        }
        self.ln_max_combo = self.ln_max_combo.max(self.ln_combo);
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn stats(&self) -> HitStats {
        self.stats
    }

    pub fn combo(&self) -> u32 {
        self.combo
    }

    pub fn max_combo(&self) -> u32 {
        self.max_combo
    }

    pub fn jam_gauge(&self) -> u32 {
        self.jam_gauge
    }

    pub fn jam_combo(&self) -> u32 {
        self.jam_combo
    }

    pub fn max_jam_combo(&self) -> u32 {
        self.max_jam_combo
    }

    pub fn cool_combo(&self) -> u32 {
        self.cool_combo
    }

    pub fn pills(&self) -> u32 {
        self.pills
    }

    pub fn ln_combo(&self) -> u32 {
        self.ln_combo
    }

    pub fn ln_max_combo(&self) -> u32 {
        self.ln_max_combo
    }

    pub fn life(&self) -> f64 {
        self.life
    }

    pub fn summary(&self) -> ScoreSummary {
        ScoreSummary {
            score: self.score,
            stats: self.stats,
            combo: self.combo,
            max_combo: self.max_combo,
            jam_combo: self.jam_combo,
            max_jam_combo: self.max_jam_combo,
            ln_combo: self.ln_combo,
            ln_max_combo: self.ln_max_combo,
            life: self.life,
            pills: self.pills,
        }
    }
}

impl Default for ScoreManager {
    fn default() -> Self {
        Self::new()
    }
}
