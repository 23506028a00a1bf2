//! Chart time to scroll position conversion.
//!
//! Positions are measured in scroll units: 100 units per millisecond at a
//! scroll-velocity multiplier of 1.0.

use crate::models::chart::TimingInfo;

/// Scroll units per millisecond at multiplier 1.0.
pub const UNITS_PER_MS: f64 = 100.0;

/// How chart time maps onto scroll position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMode {
    /// Scroll velocity changes are accumulated.
    #[default]
    Velocity,
    /// Constant scroll, scroll velocity changes ignored.
    Static,
}

/// Precomputed offset to position mapping for one chart.
#[derive(Debug, Clone)]
pub struct TimingConverter {
    mode: ScrollMode,
    initial_multiplier: f64,
    bpms: Vec<TimingInfo>,
    svs: Vec<TimingInfo>,
    /// Cumulative position at each scroll-velocity change.
    markers: Vec<f64>,
}

impl TimingConverter {
    /// Builds the converter. Both lists must be sorted by start time.
    pub fn new(
        bpms: &[TimingInfo],
        svs: &[TimingInfo],
        initial_multiplier: f64,
        mode: ScrollMode,
    ) -> Self {
        let svs = match mode {
            ScrollMode::Velocity => svs.to_vec(),
            ScrollMode::Static => Vec::new(),
        };

        let mut markers = Vec::with_capacity(svs.len());
        if let Some(first) = svs.first() {
            let mut position = (first.start_time * initial_multiplier * UNITS_PER_MS).round();
            markers.push(position);
            for pair in svs.windows(2) {
                position +=
                    ((pair[1].start_time - pair[0].start_time) * pair[0].value * UNITS_PER_MS)
                        .round();
                markers.push(position);
            }
        }

        Self {
            mode,
            initial_multiplier,
            bpms: bpms.to_vec(),
            svs,
            markers,
        }
    }

    pub fn mode(&self) -> ScrollMode {
        self.mode
    }

    pub fn markers(&self) -> &[f64] {
        &self.markers
    }

    pub fn bpms(&self) -> &[TimingInfo] {
        &self.bpms
    }

    pub fn svs(&self) -> &[TimingInfo] {
        &self.svs
    }

    /// Index of the first scroll-velocity change strictly after `offset`.
    pub fn segment_index(&self, offset: f64) -> usize {
        self.svs.partition_point(|sv| sv.start_time <= offset)
    }

    /// Scroll position at `offset`.
    pub fn position_at(&self, offset: f64) -> f64 {
        self.position_at_index(offset, self.segment_index(offset))
    }

    /// Scroll position at `offset` with a known segment index.
    pub fn position_at_index(&self, offset: f64, index: usize) -> f64 {
        match self.mode {
            ScrollMode::Static => offset * UNITS_PER_MS,
            ScrollMode::Velocity => {
                if index == 0 {
                    return offset * self.initial_multiplier * UNITS_PER_MS;
                }
                let index = index.min(self.svs.len());
                let sv = &self.svs[index - 1];
                self.markers[index - 1] + (offset - sv.start_time) * sv.value * UNITS_PER_MS
            }
        }
    }

    /// Scroll-velocity multiplier in effect at segment `index`.
    pub fn multiplier_at_index(&self, index: usize) -> f64 {
        match self.mode {
            ScrollMode::Static => 1.0,
            ScrollMode::Velocity => match index.min(self.svs.len()) {
                0 => self.initial_multiplier,
                i => self.svs[i - 1].value,
            },
        }
    }

    /// BPM in effect at `offset`. Offsets before the first change use the first BPM.
    pub fn bpm_at(&self, offset: f64) -> f64 {
        let after = self.bpms.partition_point(|bpm| bpm.start_time <= offset);
        let index = after.saturating_sub(1);
        self.bpms.get(index).map(|bpm| bpm.value).unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bpms() -> Vec<TimingInfo> {
        vec![
            TimingInfo::new(0.0, 120.0),
            TimingInfo::new(4000.0, 180.0),
            TimingInfo::new(8000.0, 90.0),
        ]
    }

    #[test]
    fn test_markers_follow_rounded_recurrence() {
        let svs = vec![
            TimingInfo::new(1000.0, 0.123456),
            TimingInfo::new(2000.0, 1.0),
            TimingInfo::new(3000.0, 2.0),
        ];
        let converter = TimingConverter::new(&bpms(), &svs, 1.0, ScrollMode::Velocity);
        // 12345.6 rounds up at the second marker.
        assert_eq!(converter.markers(), &[100000.0, 112346.0, 212346.0]);
        assert_eq!(converter.position_at(3500.0), 312346.0);
    }

    #[test]
    fn test_empty_sv_list_uses_initial_multiplier() {
        let converter = TimingConverter::new(&bpms(), &[], 1.5, ScrollMode::Velocity);
        assert_eq!(converter.position_at(1000.0), 150000.0);
        assert_eq!(converter.position_at(-200.0), -30000.0);
        assert_eq!(converter.multiplier_at_index(0), 1.5);
    }

    #[test]
    fn test_single_segment_matches_rounded_product() {
        let m = 1.25;
        let svs = vec![TimingInfo::new(0.0, m)];
        let converter = TimingConverter::new(&bpms(), &svs, m, ScrollMode::Velocity);
        for t in [0.0, 16.0, 500.0, 1234.0, 60000.0] {
            assert_eq!(converter.position_at(t), (t * m * 100.0).round());
        }
    }

    #[test]
    fn test_position_inside_later_segment() {
        let svs = vec![TimingInfo::new(1000.0, 1.0), TimingInfo::new(2000.0, 2.0)];
        let converter = TimingConverter::new(&bpms(), &svs, 0.5, ScrollMode::Velocity);
        // 1000 ms at 0.5x, 1000 ms at 1x, then 500 ms at 2x.
        assert_eq!(converter.position_at(500.0), 25000.0);
        assert_eq!(converter.position_at(1000.0), 50000.0);
        assert_eq!(converter.position_at(2000.0), 150000.0);
        assert_eq!(converter.position_at(2500.0), 250000.0);
        assert_eq!(converter.segment_index(2500.0), 2);
        assert_eq!(converter.multiplier_at_index(2), 2.0);
    }

    #[test]
    fn test_static_mode_ignores_scroll_velocity() {
        let svs = vec![TimingInfo::new(1000.0, 3.0)];
        let converter = TimingConverter::new(&bpms(), &svs, 2.0, ScrollMode::Static);
        assert_eq!(converter.position_at(2000.0), 200000.0);
        assert_eq!(converter.multiplier_at_index(5), 1.0);
        assert!(converter.markers().is_empty());
    }

    #[test]
    fn test_bpm_at() {
        let converter = TimingConverter::new(&bpms(), &[], 1.0, ScrollMode::Velocity);
        assert_eq!(converter.bpm_at(-100.0), 120.0);
        assert_eq!(converter.bpm_at(3999.0), 120.0);
        assert_eq!(converter.bpm_at(4000.0), 180.0);
        assert_eq!(converter.bpm_at(100000.0), 90.0);
    }

    proptest! {
        #[test]
        fn test_position_is_monotonic(
            starts in proptest::collection::btree_set(0u32..120_000, 1..12),
            values in proptest::collection::vec(prop_oneof![Just(0.25), Just(0.5), Just(1.0), Just(1.5), Just(2.0), Just(4.0)], 12),
            initial in prop_oneof![Just(0.5), Just(1.0), Just(2.0)],
            a in -5_000.0f64..130_000.0,
            b in -5_000.0f64..130_000.0,
        ) {
            let svs: Vec<TimingInfo> = starts
                .iter()
                .zip(values.iter())
                .map(|(start, value)| TimingInfo::new(*start as f64, *value))
                .collect();
            let converter = TimingConverter::new(&bpms(), &svs, initial, ScrollMode::Velocity);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(converter.position_at(lo) <= converter.position_at(hi));
        }
    }
}
