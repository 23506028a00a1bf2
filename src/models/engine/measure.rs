//! Time accumulation inside one measure with tempo changes and stops.
//!
//! Offsets are fractions of the measure in `0.0..1.0`. Stop values are in
//! 1/192 of a 4/4 measure.

/// Duration of `measure` measures at `bpm`, in ms.
pub fn track_duration(bpm: f64, measure: f64) -> f64 {
    ((60000.0 / bpm) * 4.0) * measure
}

/// Duration of a stop of `value` 192nds at `bpm`, in ms.
pub fn stop_duration(bpm: f64, value: f64) -> f64 {
    ((60000.0 / bpm) * 4.0) * (value / 192.0)
}

/// A tempo change or stop at a fractional position inside the measure.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureEvent {
    pub offset: f64,
    pub value: f64,
}

impl MeasureEvent {
    pub fn new(offset: f64, value: f64) -> Self {
        Self { offset, value }
    }
}

/// A timing point produced from a measure. `value` is 0 while stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasureTiming {
    pub start_time: f64,
    pub value: f64,
    pub measure_length: f64,
}

/// Accumulates tempo and stop durations for a single measure.
#[derive(Debug, Clone)]
pub struct StopAccumulator {
    measure_length: f64,
    bpms: Vec<MeasureEvent>,
    stops: Vec<MeasureEvent>,
}

impl StopAccumulator {
    pub fn new(mut bpms: Vec<MeasureEvent>, mut stops: Vec<MeasureEvent>) -> Self {
        bpms.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        stops.sort_by(|a, b| a.offset.total_cmp(&b.offset));
        Self {
            measure_length: 1.0,
            bpms,
            stops,
        }
    }

    /// Sets the measure length multiplier. Non-positive values are ignored.
    pub fn with_measure_length(mut self, length: f64) -> Self {
        if length > 0.0 {
            self.measure_length = length;
        } else {
            log::warn!("MEASURE: Ignoring invalid measure length {}", length);
        }
        self
    }

    pub fn measure_length(&self) -> f64 {
        self.measure_length
    }

    fn qualifies(event_offset: f64, offset: f64, inclusive: bool) -> bool {
        if inclusive {
            event_offset <= offset
        } else {
            event_offset < offset
        }
    }

    /// BPM in effect at `offset`, starting from `bpm` at the top of the measure.
    fn bpm_at(&self, bpm: f64, offset: f64) -> f64 {
        self.bpms
            .iter()
            .take_while(|change| change.offset <= offset)
            .last()
            .map(|change| change.value)
            .unwrap_or(bpm)
    }

    /// Time from the start of the measure to `offset`, including stops.
    ///
    /// Start-time lookups pass `inclusive = false`, release-time lookups pass `true`.
    pub fn start_time_from_offset(&self, bpm: f64, offset: f64, inclusive: bool) -> f64 {
        let changes: Vec<&MeasureEvent> = self
            .bpms
            .iter()
            .filter(|change| Self::qualifies(change.offset, offset, inclusive))
            .collect();

        let base = track_duration(bpm, self.measure_length);
        let stop_time = self.stop_time_from_offset(bpm, offset, inclusive);

        let Some(first) = changes.first() else {
            return base * offset + stop_time;
        };

        let mut position = base * first.offset;
        for (i, change) in changes.iter().enumerate() {
            let segment_end = changes.get(i + 1).map(|next| next.offset).unwrap_or(offset);
            position += track_duration(change.value, self.measure_length) * (segment_end - change.offset);
        }

        position + stop_time
    }

    /// Sum of stop durations up to `offset`, each at the BPM in effect at the stop.
    pub fn stop_time_from_offset(&self, bpm: f64, offset: f64, inclusive: bool) -> f64 {
        self.stops
            .iter()
            .take_while(|stop| Self::qualifies(stop.offset, offset, inclusive))
            .map(|stop| stop_duration(self.bpm_at(bpm, stop.offset), stop.value))
            .sum()
    }

    /// Total duration of the measure, including every stop.
    pub fn duration(&self, bpm: f64) -> f64 {
        self.start_time_from_offset(bpm, 1.0, true)
    }

    /// BPM carried into the next measure.
    pub fn end_bpm(&self, bpm: f64) -> f64 {
        self.bpm_at(bpm, 1.0)
    }

    /// Absolute timing points for a measure starting at `time_pos`.
    ///
    /// Each stop yields a zero-value point at its start and a resume point after it.
    pub fn timings(&self, time_pos: f64, bpm: f64) -> Vec<MeasureTiming> {
        let mut timings = Vec::with_capacity(self.bpms.len() + self.stops.len() * 2);

        for change in &self.bpms {
            let time = self.start_time_from_offset(bpm, change.offset, false);
            timings.push(MeasureTiming {
                start_time: time_pos + time,
                value: change.value,
                measure_length: self.measure_length,
            });
        }

        for stop in &self.stops {
            let time = self.start_time_from_offset(bpm, stop.offset, false);
            let stopped = self.stop_time_from_offset(bpm, stop.offset, true);
            timings.push(MeasureTiming {
                start_time: time_pos + time,
                value: 0.0,
                measure_length: self.measure_length,
            });
            timings.push(MeasureTiming {
                start_time: time_pos + time + stopped,
                value: self.bpm_at(bpm, stop.offset),
                measure_length: self.measure_length,
            });
        }

        timings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_durations() {
        assert_eq!(track_duration(120.0, 1.0), 2000.0);
        assert_eq!(track_duration(120.0, 0.75), 1500.0);
        assert_eq!(stop_duration(120.0, 192.0), 2000.0);
        assert_eq!(stop_duration(120.0, 48.0), 500.0);
    }

    #[test]
    fn test_plain_measure_is_linear() {
        let acc = StopAccumulator::new(Vec::new(), Vec::new());
        assert_eq!(acc.start_time_from_offset(120.0, 0.5, false), 1000.0);
        assert_eq!(acc.duration(120.0), 2000.0);
        assert_eq!(acc.end_bpm(120.0), 120.0);
    }

    #[test]
    fn test_bpm_change_accumulates_piecewise() {
        let acc = StopAccumulator::new(vec![MeasureEvent::new(0.5, 240.0)], Vec::new());
        // First half at 120 (1000 ms), second half at 240 (500 ms).
        assert_eq!(acc.duration(120.0), 1500.0);
        assert_eq!(acc.start_time_from_offset(120.0, 0.75, false), 1250.0);
        assert_eq!(acc.end_bpm(120.0), 240.0);
    }

    #[test]
    fn test_stop_inclusive_and_exclusive() {
        let acc = StopAccumulator::new(Vec::new(), vec![MeasureEvent::new(0.5, 48.0)]);
        assert_eq!(acc.stop_time_from_offset(120.0, 0.5, true), 500.0);
        assert_eq!(acc.stop_time_from_offset(120.0, 0.5, false), 0.0);
        assert_eq!(acc.start_time_from_offset(120.0, 0.5, false), 1000.0);
        assert_eq!(acc.start_time_from_offset(120.0, 0.5, true), 1500.0);
        assert_eq!(acc.duration(120.0), 2500.0);
    }

    #[test]
    fn test_stop_uses_bpm_in_effect() {
        let acc = StopAccumulator::new(
            vec![MeasureEvent::new(0.25, 240.0)],
            vec![MeasureEvent::new(0.5, 96.0)],
        );
        // Stop of half a measure at 240 BPM lasts 500 ms.
        assert_eq!(acc.stop_time_from_offset(120.0, 1.0, true), 500.0);
    }

    #[test]
    fn test_measure_length_ignores_invalid_values() {
        let acc = StopAccumulator::new(Vec::new(), Vec::new()).with_measure_length(0.5);
        assert_eq!(acc.duration(120.0), 1000.0);
        let acc = acc.with_measure_length(-1.0);
        assert_eq!(acc.measure_length(), 0.5);
    }

    #[test]
    fn test_timings_emit_stop_and_resume() {
        let acc = StopAccumulator::new(
            vec![MeasureEvent::new(0.25, 240.0)],
            vec![MeasureEvent::new(0.5, 96.0)],
        );
        let timings = acc.timings(10000.0, 120.0);
        assert_eq!(timings.len(), 3);
        assert_eq!(timings[0].start_time, 10500.0);
        assert_eq!(timings[0].value, 240.0);
        // 0.25 at 120 (500 ms) then 0.25 at 240 (250 ms).
        assert_eq!(timings[1].start_time, 10750.0);
        assert_eq!(timings[1].value, 0.0);
        assert_eq!(timings[2].start_time, 11250.0);
        assert_eq!(timings[2].value, 240.0);
    }
}
