//! Recyclable beat-line queue for the scrolling guide lines.

use crate::models::chart::TimingInfo;
use crate::models::engine::pool::{Pool, Poolable};
use crate::models::engine::timing::TimingConverter;
use std::collections::VecDeque;

/// BPM cap used when spacing beat lines.
const MAX_LINE_BPM: f64 = 9999.0;

/// A line waiting to come into range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingLineDesc {
    pub start_time: f64,
    /// Track position of the line.
    pub offset: f64,
}

/// A line inside the render range.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TimingLine {
    start_time: f64,
    offset: f64,
    /// Engine track position minus the line offset.
    track_position: f64,
}

impl Poolable for TimingLine {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

impl TimingLine {
    fn load(&mut self, desc: &TimingLineDesc, track_position: f64) {
        self.start_time = desc.start_time;
        self.offset = desc.offset;
        self.track_position = track_position - desc.offset;
    }

    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    pub fn track_position(&self) -> f64 {
        self.track_position
    }
}

/// Engine values the line queue reads each tick.
#[derive(Debug, Clone, Copy)]
pub struct LineContext {
    pub track_position: f64,
    pub audio_position: f64,
    pub notespeed: f64,
    pub prebuffer: f64,
}

impl LineContext {
    /// Lines further past the judgement line than this are recycled.
    pub fn recycle_threshold(&self) -> f64 {
        (300000.0 / 4.0) / self.notespeed
    }
}

pub struct TimingLineManager {
    pending: VecDeque<TimingLineDesc>,
    active: VecDeque<TimingLine>,
    pool: Pool<TimingLine>,
    produced: usize,
    retired: usize,
}

impl TimingLineManager {
    /// Lines every measure of every BPM segment. Each segment stops 1 ms
    /// before the next change, the last one 1 ms before `length`.
    pub fn new(
        bpms: &[TimingInfo],
        converter: &TimingConverter,
        length: f64,
        ctx: &LineContext,
    ) -> Self {
        let mut times = Vec::new();
        for (i, bpm) in bpms.iter().enumerate() {
            let target = bpms
                .get(i + 1)
                .map(|next| next.start_time - 1.0)
                .unwrap_or(length - 1.0);
            let ms_per_beat = 60000.0 / bpm.value.abs().min(MAX_LINE_BPM);
            let increment = bpm.time_signature * ms_per_beat;
            if !(increment > 0.0) || !increment.is_finite() {
                continue;
            }

            let mut song_pos = bpm.start_time;
            while song_pos < target {
                times.push(song_pos);
                song_pos += increment;
            }
        }
        Self::from_times(&times, converter, ctx)
    }

    /// Lines at explicit chart times.
    pub fn with_custom_measures(
        measures: &[f64],
        converter: &TimingConverter,
        ctx: &LineContext,
    ) -> Self {
        Self::from_times(measures, converter, ctx)
    }

    fn from_times(times: &[f64], converter: &TimingConverter, ctx: &LineContext) -> Self {
        let recycle = ctx.recycle_threshold();
        let mut pending: Vec<TimingLineDesc> = times
            .iter()
            .map(|&start_time| TimingLineDesc {
                start_time,
                offset: converter.position_at(start_time),
            })
            .filter(|desc| {
                !(ctx.track_position - desc.offset > recycle && desc.start_time < ctx.audio_position)
            })
            .collect();
        pending.sort_by(|a, b| a.offset.total_cmp(&b.offset));

        let produced = pending.len();
        let mut manager = Self {
            pending: pending.into(),
            active: VecDeque::new(),
            pool: Pool::new(),
            produced,
            retired: 0,
        };
        manager.promote(ctx);
        manager
    }

    pub fn update(&mut self, ctx: &LineContext) {
        let recycle = ctx.recycle_threshold();

        for line in self.active.iter_mut() {
            line.track_position = ctx.track_position - line.offset;
        }

        while let Some(front) = self.active.front() {
            if !(front.track_position > recycle && front.start_time < ctx.audio_position) {
                break;
            }
            let Some(mut line) = self.active.pop_front() else {
                break;
            };
            self.retired += 1;

            match self.pending.pop_front() {
                Some(desc) => {
                    line.load(&desc, ctx.track_position);
                    self.active.push_back(line);
                }
                None => self.pool.release(line),
            }
        }

        self.promote(ctx);
    }

    fn promote(&mut self, ctx: &LineContext) {
        while let Some(desc) = self.pending.front() {
            if ctx.track_position - desc.offset <= ctx.prebuffer {
                break;
            }
            let Some(desc) = self.pending.pop_front() else {
                break;
            };
            let mut line = self.pool.acquire();
            line.load(&desc, ctx.track_position);
            self.active.push_back(line);
        }
    }

    pub fn lines(&self) -> impl Iterator<Item = &TimingLine> {
        self.active.iter()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Lines queued at construction.
    pub fn produced(&self) -> usize {
        self.produced
    }

    /// Lines recycled out of the active queue.
    pub fn retired(&self) -> usize {
        self.retired
    }

    pub fn release(&mut self) {
        self.retired += self.active.len() + self.pending.len();
        while let Some(line) = self.active.pop_front() {
            self.pool.release(line);
        }
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::engine::timing::ScrollMode;

    const NOTESPEED: f64 = 2.0;

    fn ctx(audio: f64) -> LineContext {
        LineContext {
            track_position: audio * 100.0,
            audio_position: audio,
            notespeed: NOTESPEED,
            prebuffer: -300000.0 / NOTESPEED,
        }
    }

    fn setup(bpms: &[TimingInfo]) -> TimingConverter {
        TimingConverter::new(bpms, &[], 1.0, ScrollMode::Velocity)
    }

    fn balanced(manager: &TimingLineManager) -> bool {
        manager.produced() == manager.retired() + manager.active_len() + manager.pending_len()
    }

    #[test]
    fn test_lines_follow_measures() {
        let bpms = vec![TimingInfo::new(0.0, 120.0)];
        let converter = setup(&bpms);
        let manager = TimingLineManager::new(&bpms, &converter, 10000.0, &ctx(0.0));
        // One line every 2000 ms at 120 BPM in 4/4.
        assert_eq!(manager.produced(), 5);
        let first: Vec<f64> = manager.lines().map(|l| l.start_time()).collect();
        assert_eq!(first, vec![0.0]);
        assert!(balanced(&manager));
    }

    #[test]
    fn test_segments_stop_before_next_change() {
        let bpms = vec![TimingInfo::new(0.0, 120.0), TimingInfo::new(4000.0, 240.0)];
        let converter = setup(&bpms);
        let manager = TimingLineManager::new(&bpms, &converter, 6000.0, &ctx(0.0));
        // 0, 2000 from the first segment, then 4000, 5000 from the second.
        assert_eq!(manager.produced(), 4);
    }

    #[test]
    fn test_last_segment_stops_before_length() {
        let bpms = vec![TimingInfo::new(0.0, 120.0)];
        let converter = setup(&bpms);
        let manager = TimingLineManager::new(&bpms, &converter, 8000.5, &ctx(0.0));
        // 8000 falls inside the final millisecond and gets no line.
        assert_eq!(manager.produced(), 4);
    }

    #[test]
    fn test_non_positive_increment_is_skipped() {
        let mut zero = TimingInfo::new(0.0, 120.0);
        zero.time_signature = 0.0;
        let bpms = vec![zero, TimingInfo::new(4000.0, 120.0)];
        let converter = setup(&bpms);
        let manager = TimingLineManager::new(&bpms, &converter, 8000.0, &ctx(0.0));
        assert_eq!(manager.produced(), 2);
    }

    #[test]
    fn test_lines_behind_recycle_window_are_skipped() {
        let bpms = vec![TimingInfo::new(0.0, 120.0)];
        let converter = setup(&bpms);
        let manager = TimingLineManager::new(&bpms, &converter, 10000.0, &ctx(5000.0));
        // Recycle window is 375 ms; 0, 2000 and 4000 are already gone.
        assert_eq!(manager.produced(), 2);
    }

    #[test]
    fn test_full_playthrough_accounts_for_every_line() {
        let bpms = vec![TimingInfo::new(0.0, 150.0), TimingInfo::new(10000.0, 200.0)];
        let converter = setup(&bpms);
        let mut manager = TimingLineManager::new(&bpms, &converter, 30000.0, &ctx(0.0));
        let produced = manager.produced();

        let mut seen = Vec::new();
        let mut audio = 0.0;
        while audio < 32000.0 {
            manager.update(&ctx(audio));
            assert!(balanced(&manager));
            for line in manager.lines() {
                if !seen.contains(&line.start_time().to_bits()) {
                    seen.push(line.start_time().to_bits());
                }
            }
            audio += 16.0;
        }

        assert_eq!(manager.pending_len(), 0);
        assert_eq!(manager.active_len(), 0);
        assert_eq!(manager.retired(), produced);
        assert_eq!(seen.len(), produced);
    }

    #[test]
    fn test_custom_measures() {
        let bpms = vec![TimingInfo::new(0.0, 120.0)];
        let converter = setup(&bpms);
        let mut manager = TimingLineManager::with_custom_measures(
            &[0.0, 1500.0, 2500.0],
            &converter,
            &ctx(0.0),
        );
        assert_eq!(manager.produced(), 3);
        manager.update(&ctx(300.0));
        assert_eq!(manager.active_len(), 2);
        assert_eq!(manager.pending_len(), 1);
        assert_eq!(manager.retired(), 0);
        manager.release();
        manager.release();
        assert!(balanced(&manager));
    }
}
