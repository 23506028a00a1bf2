//! Builds a perfect-play key schedule from a chart.

use crate::models::chart::{Chart, NoteInfo};
use crate::models::replay::{ReplayData, ReplayFrame};

/// Delay between a tap and its release, in ms.
pub const RELEASE_DELAY_MS: f64 = 25.0;

fn release_time(note: &NoteInfo, next_in_lane: Option<&NoteInfo>) -> f64 {
    if let Some(end) = note.end_time() {
        return end;
    }

    let time = note.start_time;
    match next_in_lane {
        Some(next) if next.start_time <= time + RELEASE_DELAY_MS => {
            time + (next.start_time - time) * 0.9
        }
        _ => time + RELEASE_DELAY_MS,
    }
}

/// One press and one release per note, sorted with presses first on ties.
///
/// Expects the chart's notes to be sorted.
pub fn create_autoplay(chart: &Chart) -> ReplayData {
    let mut frames = Vec::with_capacity(chart.notes.len() * 2);
    let mut next_in_lane: Vec<Option<usize>> = vec![None; chart.notes.len()];
    let mut last_seen: Vec<Option<usize>> = vec![None; chart.lanes];

    for (index, note) in chart.notes.iter().enumerate().rev() {
        if let Some(slot) = last_seen.get_mut(note.lane) {
            next_in_lane[index] = *slot;
            *slot = Some(index);
        }
    }

    for (index, note) in chart.notes.iter().enumerate() {
        let next = next_in_lane[index].map(|i| &chart.notes[i]);
        frames.push(ReplayFrame::key_down(note.start_time, note.lane));
        frames.push(ReplayFrame::key_up(release_time(note, next), note.lane));
    }

    ReplayData::new(frames)
}
