//! One lane: live notes, the note pool and key dispatch.

use super::EngineEvent;
use crate::logic::audio::KeysoundCache;
use crate::models::engine::note::{Note, NoteContext, NoteDesc, NoteEvent};
use crate::models::engine::pool::Pool;
use crate::models::score::ScoreManager;

/// Where a track sends scoring, sound and listener output.
pub struct TrackSinks<'a> {
    pub score: &'a mut ScoreManager,
    pub keysounds: &'a mut dyn KeysoundCache,
    pub events: &'a mut Vec<EngineEvent>,
    pub keysound_volume: f32,
}

pub struct GameTrack {
    lane: usize,
    /// Live notes in spawn order.
    live: Vec<Note>,
    pool: Pool<Note>,
    /// Keysound of the most recent note that reached its start time.
    last_keysound: Option<(u32, f32)>,
    pressed: bool,
    scratch: Vec<NoteEvent>,
}

impl GameTrack {
    pub fn new(lane: usize) -> Self {
        Self {
            lane,
            live: Vec::new(),
            pool: Pool::new(),
            last_keysound: None,
            pressed: false,
            scratch: Vec::new(),
        }
    }

    /// Track with `capacity` notes allocated up front.
    pub fn with_capacity(lane: usize, capacity: usize) -> Self {
        Self {
            live: Vec::with_capacity(capacity),
            pool: Pool::with_capacity(capacity),
            ..Self::new(lane)
        }
    }

    pub fn lane(&self) -> usize {
        self.lane
    }

    pub fn notes(&self) -> &[Note] {
        &self.live
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn pool(&self) -> &Pool<Note> {
        &self.pool
    }

    /// Spawns a note, reusing a pooled one when available.
    pub fn add_note(&mut self, desc: &NoteDesc) {
        let mut note = self.pool.acquire();
        note.load(desc);
        self.live.push(note);
    }

    pub fn update(&mut self, ctx: &NoteContext, sinks: &mut TrackSinks) {
        for note in self.live.iter_mut() {
            if note.is_removable() {
                continue;
            }
            if note.start_time() <= ctx.audio_position
                && let Some(keysound) = note.keysound()
            {
                self.last_keysound = Some((keysound, note.volume()));
            }
            note.update(ctx, &mut self.scratch);
        }

        self.dispatch(sinks);
        self.recycle_removable();
    }

    pub fn on_key_down(&mut self, ctx: &NoteContext, sinks: &mut TrackSinks) {
        self.pressed = true;
        sinks.events.push(EngineEvent::Key {
            lane: self.lane,
            pressed: true,
        });

        let mut sound = self.last_keysound;
        if let Some((note, result)) = self
            .live
            .iter_mut()
            .find_map(|note| note.check_hit(ctx).map(|result| (note, result)))
        {
            note.on_hit(result, ctx, &mut self.scratch);
            sound = note.keysound().map(|keysound| (keysound, note.volume()));
        }

        if let Some((keysound, volume)) = sound {
            sinks.keysounds.play(keysound, volume * sinks.keysound_volume);
        }

        self.dispatch(sinks);
    }

    pub fn on_key_up(&mut self, ctx: &NoteContext, sinks: &mut TrackSinks) {
        self.pressed = false;
        sinks.events.push(EngineEvent::Key {
            lane: self.lane,
            pressed: false,
        });

        if let Some((note, result)) = self
            .live
            .iter_mut()
            .find_map(|note| note.check_release(ctx).map(|result| (note, result)))
        {
            note.on_release(result, ctx, &mut self.scratch);
        }

        self.dispatch(sinks);
    }

    fn dispatch(&mut self, sinks: &mut TrackSinks) {
        for event in self.scratch.drain(..) {
            match event {
                NoteEvent::Judged(info) => {
                    let outcome = sinks.score.on_hit(info);
                    if !info.ignore {
                        sinks.events.push(EngineEvent::HitEffect {
                            lane: info.lane,
                            is_hold: info.is_hold,
                            is_release: info.is_release,
                        });
                    }
                    if outcome.notify {
                        sinks.events.push(EngineEvent::Judgement(outcome.info));
                    }
                    if let Some(combo) = outcome.jam_combo {
                        sinks.events.push(EngineEvent::Jam { combo });
                    }
                }
                NoteEvent::Hold(hold) => {
                    sinks.score.on_long_note(hold);
                    sinks.events.push(EngineEvent::LongNote {
                        lane: self.lane,
                        event: hold,
                        combo: sinks.score.ln_combo(),
                    });
                }
                NoteEvent::StopKeysound(keysound) => sinks.keysounds.stop(keysound),
            }
        }
    }

    fn recycle_removable(&mut self) {
        let mut i = 0;
        while i < self.live.len() {
            if self.live[i].is_removable() {
                let note = self.live.remove(i);
                self.pool.release(note);
            } else {
                i += 1;
            }
        }
    }

    /// Returns every live note to the pool. Safe to call repeatedly.
    pub fn release(&mut self) {
        for note in self.live.drain(..) {
            self.pool.release(note);
        }
        self.scratch.clear();
        self.pressed = false;
        self.last_keysound = None;
    }
}
