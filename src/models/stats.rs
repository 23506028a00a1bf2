//! Judgement types and the hit records flowing from notes to scoring.

/// Hit judgement types from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Judgement {
    /// Tightest window.
    Cool,
    Good,
    Bad,
    /// Inside the early-miss window, or forced when a note times out.
    Miss,
}

impl Judgement {
    pub fn is_miss(self) -> bool {
        self == Judgement::Miss
    }

    /// Whether this judgement keeps the combo going.
    pub fn keeps_combo(self) -> bool {
        matches!(self, Judgement::Cool | Judgement::Good)
    }
}

/// Long-note combo events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HoldEvent {
    /// One 100 ms tick of a held long note.
    Add,
    /// The hold chain was broken.
    Break,
}

/// A committed judgement on a note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteHitInfo {
    pub lane: usize,
    pub result: Judgement,
    /// Signed distance to the reference time in ms (negative when early).
    pub offset_ms: f64,
    /// True for tail judgements of long notes.
    pub is_release: bool,
    pub is_hold: bool,
    /// Forced by a timeout rather than by input. No hit effect is shown.
    pub ignore: bool,
}

/// Per-judgement counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct HitStats {
    pub cool: u32,
    pub good: u32,
    pub bad: u32,
    pub miss: u32,
}

impl HitStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, judgement: Judgement) {
        match judgement {
            Judgement::Cool => self.cool += 1,
            Judgement::Good => self.good += 1,
            Judgement::Bad => self.bad += 1,
            Judgement::Miss => self.miss += 1,
        }
    }

    pub fn total(&self) -> u32 {
        self.cool + self.good + self.bad + self.miss
    }
}
