//! Per-note judgement state machine.
//!
//! A note never mutates itself while checking a judgement. `check_hit` and
//! `check_release` are pure; the owning track commits an accepted result
//! through `on_hit`/`on_release`, so each input commits at most once.

use crate::models::engine::hit_window::HitWindow;
use crate::models::engine::pool::Poolable;
use crate::models::stats::{HoldEvent, Judgement, NoteHitInfo};

/// Interval between long-note combo ticks, in ms.
pub const HOLD_TICK_MS: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    NormalNote,
    HoldPre,
    HoldOnHolding,
    HoldMissedActive,
    HoldPassed,
    DoRemove,
}

/// Spawn data for one note, with track positions resolved at load.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteDesc {
    pub lane: usize,
    pub start_time: f64,
    pub end_time: Option<f64>,
    pub initial_track_position: f64,
    pub end_track_position: f64,
    pub keysound: Option<u32>,
    pub volume: f32,
}

/// Per-frame engine values a note reads.
#[derive(Debug, Clone, Copy)]
pub struct NoteContext {
    /// Game audio position (audio clock plus offset) in ms.
    pub audio_position: f64,
    pub track_position: f64,
    /// Negative spawn margin in track units.
    pub prebuffer: f64,
    pub window: HitWindow,
    pub rate: f64,
}

impl NoteContext {
    /// Same frame values evaluated at another audio time.
    pub fn at(&self, audio_position: f64) -> Self {
        Self {
            audio_position,
            ..*self
        }
    }
}

/// Side effects a note asks its track to carry out.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NoteEvent {
    Judged(NoteHitInfo),
    Hold(HoldEvent),
    StopKeysound(u32),
}

#[derive(Debug, Clone)]
pub struct Note {
    lane: usize,
    start_time: f64,
    end_time: Option<f64>,
    initial_track_position: f64,
    end_track_position: f64,
    keysound: Option<u32>,
    volume: f32,

    state: NoteState,
    drawable: bool,
    removable: bool,
    did_hit_head: bool,
    did_hit_tail: bool,
    /// Time up to which long-note ticks have been paid out.
    last_score_time: Option<f64>,
    last_result: Option<Judgement>,
}

impl Default for Note {
    fn default() -> Self {
        Self {
            lane: 0,
            start_time: 0.0,
            end_time: None,
            initial_track_position: 0.0,
            end_track_position: 0.0,
            keysound: None,
            volume: 1.0,
            state: NoteState::DoRemove,
            drawable: false,
            removable: true,
            did_hit_head: false,
            did_hit_tail: false,
            last_score_time: None,
            last_result: None,
        }
    }
}

impl Poolable for Note {
    fn reset(&mut self) {
        self.release();
    }
}

impl Note {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-initialises every mutable field from `desc`.
    pub fn load(&mut self, desc: &NoteDesc) {
        self.lane = desc.lane;
        self.start_time = desc.start_time;
        self.end_time = desc.end_time;
        self.initial_track_position = desc.initial_track_position;
        self.end_track_position = desc.end_track_position;
        self.keysound = desc.keysound;
        self.volume = desc.volume;

        self.state = if desc.end_time.is_some() {
            NoteState::HoldPre
        } else {
            NoteState::NormalNote
        };
        self.drawable = false;
        self.removable = false;
        self.did_hit_head = false;
        self.did_hit_tail = false;
        self.last_score_time = None;
        self.last_result = None;
    }

    /// Forces the terminal state.
    pub fn release(&mut self) {
        self.state = NoteState::DoRemove;
        self.removable = true;
        self.drawable = false;
        self.last_score_time = None;
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn end_time(&self) -> Option<f64> {
        self.end_time
    }

    pub fn is_hold(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn initial_track_position(&self) -> f64 {
        self.initial_track_position
    }

    pub fn end_track_position(&self) -> f64 {
        self.end_track_position
    }

    pub fn keysound(&self) -> Option<u32> {
        self.keysound
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn state(&self) -> NoteState {
        self.state
    }

    pub fn is_drawable(&self) -> bool {
        self.drawable
    }

    pub fn is_removable(&self) -> bool {
        self.removable
    }

    pub fn did_hit_head(&self) -> bool {
        self.did_hit_head
    }

    pub fn did_hit_tail(&self) -> bool {
        self.did_hit_tail
    }

    pub fn last_result(&self) -> Option<Judgement> {
        self.last_result
    }

    fn tail_time(&self) -> f64 {
        self.end_time.unwrap_or(self.start_time)
    }

    /// Time the next judgement is measured against.
    fn hit_time(&self) -> f64 {
        match self.state {
            NoteState::NormalNote | NoteState::HoldPre => self.start_time,
            _ => self.tail_time(),
        }
    }

    fn is_missed(&self, ctx: &NoteContext) -> bool {
        ctx.audio_position > self.hit_time() + ctx.window.bad
    }

    pub fn update(&mut self, ctx: &NoteContext, events: &mut Vec<NoteEvent>) {
        if self.removable {
            return;
        }

        if !self.drawable && ctx.track_position - self.initial_track_position > ctx.prebuffer {
            self.drawable = true;
        }

        match self.state {
            NoteState::NormalNote | NoteState::HoldPre => {
                if self.is_missed(ctx) {
                    self.commit_hit(Judgement::Miss, ctx, true, events);
                }
            }
            NoteState::HoldOnHolding => {
                self.pay_hold_ticks(ctx, events);
                if self.is_missed(ctx) {
                    self.commit_release(Judgement::Miss, ctx, true, events);
                    self.state = NoteState::DoRemove;
                }
            }
            NoteState::HoldMissedActive | NoteState::HoldPassed => {
                if self.is_missed(ctx) {
                    self.state = NoteState::DoRemove;
                }
            }
            NoteState::DoRemove => {}
        }

        if self.state == NoteState::DoRemove {
            self.removable = true;
        }
    }

    fn pay_hold_ticks(&mut self, ctx: &NoteContext, events: &mut Vec<NoteEvent>) {
        let Some(mut last) = self.last_score_time else {
            return;
        };
        let horizon = ctx.audio_position.min(self.tail_time());
        while horizon - last >= HOLD_TICK_MS {
            last += HOLD_TICK_MS;
            events.push(NoteEvent::Hold(HoldEvent::Add));
        }
        self.last_score_time = Some(last);
    }

    /// Judgement a key press would receive now, without committing it.
    pub fn check_hit(&self, ctx: &NoteContext) -> Option<Judgement> {
        if self.removable {
            return None;
        }
        let reference = match self.state {
            NoteState::NormalNote | NoteState::HoldPre => self.start_time,
            NoteState::HoldMissedActive => self.tail_time(),
            _ => return None,
        };
        ctx.window.judge(ctx.audio_position, reference, ctx.rate)
    }

    /// Judgement a key release would receive now, without committing it.
    pub fn check_release(&self, ctx: &NoteContext) -> Option<Judgement> {
        if self.removable || !self.is_hold() {
            return None;
        }
        let result = ctx.window.judge(ctx.audio_position, self.tail_time(), ctx.rate);
        match self.state {
            // Letting go before the tail window breaks the hold.
            NoteState::HoldOnHolding => Some(result.unwrap_or(Judgement::Miss)),
            NoteState::HoldMissedActive => result.map(|_| Judgement::Bad),
            _ => None,
        }
    }

    pub fn on_hit(&mut self, result: Judgement, ctx: &NoteContext, events: &mut Vec<NoteEvent>) {
        self.commit_hit(result, ctx, false, events);
    }

    pub fn on_release(
        &mut self,
        result: Judgement,
        ctx: &NoteContext,
        events: &mut Vec<NoteEvent>,
    ) {
        self.commit_release(result, ctx, false, events);
    }

    fn hit_info(
        &self,
        result: Judgement,
        ctx: &NoteContext,
        reference: f64,
        is_release: bool,
        forced: bool,
    ) -> NoteHitInfo {
        NoteHitInfo {
            lane: self.lane,
            result,
            offset_ms: ctx.audio_position - reference,
            is_release,
            is_hold: self.is_hold(),
            ignore: forced,
        }
    }

    fn commit_hit(
        &mut self,
        result: Judgement,
        ctx: &NoteContext,
        forced: bool,
        events: &mut Vec<NoteEvent>,
    ) {
        match self.state {
            NoteState::NormalNote => {
                self.did_hit_head = true;
                self.last_result = Some(result);
                events.push(NoteEvent::Judged(
                    self.hit_info(result, ctx, self.start_time, false, forced),
                ));
                self.state = NoteState::DoRemove;
                self.removable = true;
            }
            NoteState::HoldPre => {
                self.did_hit_head = true;
                self.last_result = Some(result);
                events.push(NoteEvent::Judged(
                    self.hit_info(result, ctx, self.start_time, false, forced),
                ));
                if result.is_miss() {
                    self.state = NoteState::HoldMissedActive;
                    events.push(NoteEvent::Hold(HoldEvent::Break));
                } else {
                    self.state = NoteState::HoldOnHolding;
                    self.last_score_time = Some(ctx.audio_position.max(self.start_time));
                }
            }
            NoteState::HoldMissedActive => {
                self.did_hit_tail = true;
                self.last_result = Some(result);
                events.push(NoteEvent::Judged(
                    self.hit_info(result, ctx, self.tail_time(), true, forced),
                ));
                events.push(NoteEvent::Hold(HoldEvent::Break));
                self.state = NoteState::HoldPassed;
            }
            _ => {}
        }
    }

    fn commit_release(
        &mut self,
        result: Judgement,
        ctx: &NoteContext,
        forced: bool,
        events: &mut Vec<NoteEvent>,
    ) {
        if !matches!(
            self.state,
            NoteState::HoldOnHolding | NoteState::HoldMissedActive
        ) {
            return;
        }

        self.last_score_time = None;
        self.last_result = Some(result);
        events.push(NoteEvent::Judged(
            self.hit_info(result, ctx, self.tail_time(), true, forced),
        ));

        if result.is_miss() {
            if let Some(keysound) = self.keysound {
                events.push(NoteEvent::StopKeysound(keysound));
            }
            self.state = NoteState::HoldMissedActive;
            events.push(NoteEvent::Hold(HoldEvent::Break));
        } else {
            self.did_hit_tail = true;
            self.state = NoteState::HoldPassed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> HitWindow {
        HitWindow::from_custom(40.0, 120.0, 180.0, 200.0)
    }

    fn ctx(audio: f64) -> NoteContext {
        NoteContext {
            audio_position: audio,
            track_position: audio * 100.0,
            prebuffer: -100_000.0,
            window: window(),
            rate: 1.0,
        }
    }

    fn normal(start: f64) -> Note {
        let mut note = Note::new();
        note.load(&NoteDesc {
            lane: 2,
            start_time: start,
            end_time: None,
            initial_track_position: start * 100.0,
            end_track_position: start * 100.0,
            keysound: Some(4),
            volume: 1.0,
        });
        note
    }

    fn hold(start: f64, end: f64) -> Note {
        let mut note = Note::new();
        note.load(&NoteDesc {
            lane: 1,
            start_time: start,
            end_time: Some(end),
            initial_track_position: start * 100.0,
            end_track_position: end * 100.0,
            keysound: Some(9),
            volume: 1.0,
        });
        note
    }

    fn judgements(events: &[NoteEvent]) -> Vec<NoteHitInfo> {
        events
            .iter()
            .filter_map(|event| match event {
                NoteEvent::Judged(info) => Some(*info),
                _ => None,
            })
            .collect()
    }

    fn count_hold(events: &[NoteEvent], kind: HoldEvent) -> usize {
        events
            .iter()
            .filter(|event| **event == NoteEvent::Hold(kind))
            .count()
    }

    #[test]
    fn test_load_sets_initial_state() {
        assert_eq!(normal(1000.0).state(), NoteState::NormalNote);
        assert_eq!(hold(1000.0, 2000.0).state(), NoteState::HoldPre);
        assert!(!normal(1000.0).is_removable());
        assert!(Note::new().is_removable());
    }

    #[test]
    fn test_normal_note_times_out_once() {
        let mut note = normal(1000.0);
        let mut events = Vec::new();

        note.update(&ctx(1180.0), &mut events);
        assert!(events.is_empty());
        assert_eq!(note.state(), NoteState::NormalNote);

        note.update(&ctx(1181.0), &mut events);
        note.update(&ctx(1300.0), &mut events);
        note.update(&ctx(1400.0), &mut events);

        let judged = judgements(&events);
        assert_eq!(judged.len(), 1);
        assert_eq!(judged[0].result, Judgement::Miss);
        assert!(judged[0].ignore);
        assert_eq!(note.state(), NoteState::DoRemove);
        assert!(note.is_removable());
    }

    #[test]
    fn test_check_does_not_mutate() {
        let note = normal(1000.0);
        let before = note.clone();
        assert_eq!(note.check_hit(&ctx(1030.0)), Some(Judgement::Cool));
        assert_eq!(note.check_hit(&ctx(900.0)), Some(Judgement::Good));
        assert_eq!(note.check_hit(&ctx(700.0)), None);
        assert_eq!(note.check_release(&ctx(1000.0)), None);
        assert_eq!(note.state(), before.state());
        assert_eq!(note.last_result(), None);
    }

    #[test]
    fn test_normal_hit_commits_once() {
        let mut note = normal(1000.0);
        let mut events = Vec::new();
        let context = ctx(1010.0);
        let result = note.check_hit(&context).unwrap();
        note.on_hit(result, &context, &mut events);
        assert_eq!(note.check_hit(&context), None);
        note.on_hit(result, &context, &mut events);

        let judged = judgements(&events);
        assert_eq!(judged.len(), 1);
        assert_eq!(judged[0].offset_ms, 10.0);
        assert!(!judged[0].ignore);
        assert!(note.is_removable());
    }

    #[test]
    fn test_hold_ticks_every_100ms() {
        let mut note = hold(1000.0, 2050.0);
        let mut events = Vec::new();
        note.on_hit(Judgement::Cool, &ctx(1000.0), &mut events);
        assert_eq!(note.state(), NoteState::HoldOnHolding);

        let mut audio = 1000.0;
        while audio < 2100.0 {
            audio += 16.0;
            note.update(&ctx(audio), &mut events);
        }
        assert_eq!(count_hold(&events, HoldEvent::Add), 10);
        assert_eq!(count_hold(&events, HoldEvent::Break), 0);
    }

    #[test]
    fn test_hold_ticks_with_exact_length() {
        let mut note = hold(0.0, 1000.0);
        let mut events = Vec::new();
        note.on_hit(Judgement::Cool, &ctx(-10.0), &mut events);
        note.update(&ctx(999.0), &mut events);
        assert_eq!(count_hold(&events, HoldEvent::Add), 9);
        note.update(&ctx(1003.0), &mut events);
        assert_eq!(count_hold(&events, HoldEvent::Add), 10);
        note.update(&ctx(1150.0), &mut events);
        assert_eq!(count_hold(&events, HoldEvent::Add), 10);
    }

    #[test]
    fn test_hold_head_miss_stays_interceptable() {
        let mut note = hold(1000.0, 3000.0);
        let mut events = Vec::new();
        note.update(&ctx(1181.0), &mut events);

        assert_eq!(note.state(), NoteState::HoldMissedActive);
        assert!(!note.is_removable());
        assert_eq!(judgements(&events)[0].result, Judgement::Miss);
        assert_eq!(count_hold(&events, HoldEvent::Break), 1);

        // Pressing again near the tail judges the tail.
        assert_eq!(note.check_hit(&ctx(2000.0)), None);
        let tail = ctx(2990.0);
        assert_eq!(note.check_hit(&tail), Some(Judgement::Cool));
        note.on_hit(Judgement::Cool, &tail, &mut events);
        assert_eq!(note.state(), NoteState::HoldPassed);
        assert!(note.did_hit_tail());
    }

    #[test]
    fn test_hold_release_paths() {
        let mut note = hold(1000.0, 2000.0);
        let mut events = Vec::new();
        note.on_hit(Judgement::Good, &ctx(1050.0), &mut events);

        // Early release is a miss and breaks the hold.
        let early = ctx(1500.0);
        assert_eq!(note.check_release(&early), Some(Judgement::Miss));
        note.on_release(Judgement::Miss, &early, &mut events);
        assert_eq!(note.state(), NoteState::HoldMissedActive);
        assert!(events.contains(&NoteEvent::StopKeysound(9)));
        assert_eq!(count_hold(&events, HoldEvent::Break), 1);

        // Releasing again near the tail from a missed hold scores Bad.
        let tail = ctx(1990.0);
        assert_eq!(note.check_release(&tail), Some(Judgement::Bad));
        note.on_release(Judgement::Bad, &tail, &mut events);
        assert_eq!(note.state(), NoteState::HoldPassed);
    }

    #[test]
    fn test_hold_release_on_time_passes() {
        let mut note = hold(1000.0, 2000.0);
        let mut events = Vec::new();
        note.on_hit(Judgement::Cool, &ctx(1000.0), &mut events);
        let tail = ctx(2005.0);
        assert_eq!(note.check_release(&tail), Some(Judgement::Cool));
        note.on_release(Judgement::Cool, &tail, &mut events);
        assert_eq!(note.state(), NoteState::HoldPassed);
        assert!(note.did_hit_tail());

        note.update(&ctx(2181.0), &mut events);
        assert!(note.is_removable());
        assert_eq!(judgements(&events).len(), 2);
    }

    #[test]
    fn test_hold_timeout_while_holding_releases_as_miss() {
        let mut note = hold(1000.0, 2000.0);
        let mut events = Vec::new();
        note.on_hit(Judgement::Cool, &ctx(1000.0), &mut events);
        note.update(&ctx(2181.0), &mut events);

        let judged = judgements(&events);
        assert_eq!(judged.len(), 2);
        assert_eq!(judged[1].result, Judgement::Miss);
        assert!(judged[1].is_release);
        assert_eq!(count_hold(&events, HoldEvent::Break), 1);
        assert_eq!(note.state(), NoteState::DoRemove);
    }

    #[test]
    fn test_hold_timeout_from_missed_is_silent() {
        let mut note = hold(1000.0, 2000.0);
        let mut events = Vec::new();
        note.update(&ctx(1181.0), &mut events);
        let before = events.len();
        note.update(&ctx(2181.0), &mut events);
        assert_eq!(events.len(), before);
        assert!(note.is_removable());
    }

    #[test]
    fn test_drawable_once_inside_prebuffer() {
        let mut note = normal(5000.0);
        let mut events = Vec::new();
        let mut context = ctx(0.0);
        context.track_position = 0.0;
        note.update(&context, &mut events);
        assert!(!note.is_drawable());

        context.track_position = 400_001.0;
        note.update(&context, &mut events);
        assert!(note.is_drawable());
    }

    #[test]
    fn test_release_forces_terminal_state() {
        let mut note = hold(1000.0, 2000.0);
        note.release();
        assert_eq!(note.state(), NoteState::DoRemove);
        assert!(note.is_removable());
        assert_eq!(note.check_hit(&ctx(1000.0)), None);
    }
}
