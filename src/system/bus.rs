//! Channels shared between the engine thread and the audio thread.

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::AtomicU64;

/// Commands sent to the dedicated audio thread.
#[derive(Debug, Clone)]
pub enum AudioCommand {
    /// Load the music track. The worker answers on `reply`.
    Load {
        path: PathBuf,
        reply: Sender<Result<(), String>>,
    },
    Play,
    /// Stop and reset the playback position.
    Stop,
    SetSpeed { speed: f32 },
    SetVolume { volume: f32 },
    /// Decode and cache a keysound sample.
    LoadSample { index: u32, path: PathBuf },
    PlaySample { index: u32, volume: f32 },
    StopSample { index: u32 },
    /// Drop every cached sample.
    ClearSamples,
    Shutdown,
}

/// Aggregates the cross-thread communication state.
#[derive(Clone)]
pub struct SystemBus {
    /// Engine → Audio: audio commands.
    pub audio_cmd_tx: Sender<AudioCommand>,
    pub audio_cmd_rx: Receiver<AudioCommand>,

    /// Shared audio position in samples.
    /// Written by the audio thread, read by the engine thread.
    pub audio_position: Arc<AtomicU64>,

    /// Current audio sample rate.
    pub audio_sample_rate: Arc<AtomicU64>,

    /// Number of audio channels.
    pub audio_channels: Arc<AtomicU64>,
}

impl SystemBus {
    pub fn new() -> Self {
        let (audio_cmd_tx, audio_cmd_rx) = unbounded();

        Self {
            audio_cmd_tx,
            audio_cmd_rx,
            audio_position: Arc::new(AtomicU64::new(0)),
            audio_sample_rate: Arc::new(AtomicU64::new(44100)),
            audio_channels: Arc::new(AtomicU64::new(2)),
        }
    }

    /// One-shot reply channel for a request to the audio thread.
    pub fn reply_channel<T>() -> (Sender<T>, Receiver<T>) {
        bounded(1)
    }
}

impl Default for SystemBus {
    fn default() -> Self {
        Self::new()
    }
}
