//! Audio and keysound interfaces consumed by the engine.
//!
//! The engine never talks to a device directly. It receives an
//! [`AudioDevice`] and a [`KeysoundCache`] at construction. The bus-backed
//! implementations forward commands to the dedicated audio thread; the silent
//! ones keep the engine running without a device.

use crate::error::AudioError;
use crate::models::chart::KeysoundFile;
use crate::system::bus::{AudioCommand, SystemBus};
use crossbeam_channel::Sender;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How long `open` waits for the audio thread to decode a track.
const OPEN_TIMEOUT: Duration = Duration::from_secs(10);

/// An opened music stream.
pub trait AudioStream: Send {
    fn set_rate(&mut self, rate: f32);
    fn set_volume(&mut self, volume: f32);
    fn play(&mut self);
    fn stop(&mut self);
    /// Device playback position in ms.
    fn position_ms(&self) -> f64;
}

/// Opens music streams. Shared with the background task started by the engine.
pub trait AudioDevice: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioStream>, AudioError>;
}

/// Per-note sample playback keyed by keysound index.
pub trait KeysoundCache {
    fn play(&mut self, index: u32, volume: f32);
    fn stop(&mut self, index: u32);
}

/// Wrapper for sending commands to the audio thread.
#[derive(Clone)]
pub struct AudioManager {
    cmd_tx: Sender<AudioCommand>,
    position: Arc<AtomicU64>,
    sample_rate: Arc<AtomicU64>,
    channels: Arc<AtomicU64>,
}

impl AudioManager {
    pub fn new(bus: &SystemBus) -> Self {
        Self {
            cmd_tx: bus.audio_cmd_tx.clone(),
            position: bus.audio_position.clone(),
            sample_rate: bus.audio_sample_rate.clone(),
            channels: bus.audio_channels.clone(),
        }
    }

    /// Registers a keysound file under `index`.
    pub fn load_sample(&self, index: u32, path: &Path) {
        let _ = self.cmd_tx.send(AudioCommand::LoadSample {
            index,
            path: path.to_path_buf(),
        });
    }

    pub fn clear_samples(&self) {
        let _ = self.cmd_tx.send(AudioCommand::ClearSamples);
    }

    /// Replaces the cached keysounds with a chart's sample table.
    ///
    /// Commands are queued in order, so samples are decoded before any
    /// later play request reaches the audio thread.
    pub fn load_samples(&self, samples: &[KeysoundFile]) {
        self.clear_samples();
        for sample in samples {
            self.load_sample(sample.index, &sample.path);
        }
        log::debug!("AUDIO: Queued {} keysound files", samples.len());
    }

    pub fn shutdown(&self) {
        let _ = self.cmd_tx.send(AudioCommand::Shutdown);
    }

    /// Keysound cache backed by this manager's audio thread.
    pub fn keysounds(&self) -> BusKeysounds {
        BusKeysounds {
            cmd_tx: self.cmd_tx.clone(),
        }
    }

    /// Playback position computed from the sample count shared with the audio thread.
    pub fn position_ms(&self) -> f64 {
        let samples = self.position.load(Ordering::Relaxed) as f64;
        let sample_rate = self.sample_rate.load(Ordering::Relaxed).max(1) as f64;
        let channels = self.channels.load(Ordering::Relaxed).max(1) as f64;

        samples / (sample_rate * channels) * 1000.0
    }
}

impl AudioDevice for AudioManager {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioStream>, AudioError> {
        let (reply, response) = SystemBus::reply_channel();
        self.cmd_tx
            .send(AudioCommand::Load {
                path: path.to_path_buf(),
                reply,
            })
            .map_err(|_| AudioError::Disconnected)?;

        match response.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(())) => Ok(Box::new(BusStream {
                manager: self.clone(),
                path: path.to_path_buf(),
            })),
            Ok(Err(reason)) => Err(AudioError::Open {
                path: path.to_path_buf(),
                reason,
            }),
            Err(_) => Err(AudioError::Disconnected),
        }
    }
}

/// Music stream living on the audio thread.
pub struct BusStream {
    manager: AudioManager,
    path: PathBuf,
}

impl BusStream {
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn send(&self, cmd: AudioCommand) {
        let _ = self.manager.cmd_tx.send(cmd);
    }
}

impl AudioStream for BusStream {
    fn set_rate(&mut self, rate: f32) {
        self.send(AudioCommand::SetSpeed { speed: rate });
    }

    fn set_volume(&mut self, volume: f32) {
        self.send(AudioCommand::SetVolume { volume });
    }

    fn play(&mut self) {
        self.send(AudioCommand::Play);
    }

    fn stop(&mut self) {
        self.send(AudioCommand::Stop);
    }

    fn position_ms(&self) -> f64 {
        self.manager.position_ms()
    }
}

/// Keysounds played on the audio thread.
pub struct BusKeysounds {
    cmd_tx: Sender<AudioCommand>,
}

impl KeysoundCache for BusKeysounds {
    fn play(&mut self, index: u32, volume: f32) {
        let _ = self.cmd_tx.send(AudioCommand::PlaySample { index, volume });
    }

    fn stop(&mut self, index: u32) {
        let _ = self.cmd_tx.send(AudioCommand::StopSample { index });
    }
}

/// Device used when no audio output is wanted.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentAudio;

impl AudioDevice for SilentAudio {
    fn open(&self, path: &Path) -> Result<Box<dyn AudioStream>, AudioError> {
        log::debug!("AUDIO: Silent open of {:?}", path);
        Ok(Box::new(SilentStream::default()))
    }
}

#[derive(Debug, Default)]
pub struct SilentStream {
    playing: bool,
}

impl AudioStream for SilentStream {
    fn set_rate(&mut self, _rate: f32) {}

    fn set_volume(&mut self, _volume: f32) {}

    fn play(&mut self) {
        self.playing = true;
    }

    fn stop(&mut self) {
        self.playing = false;
    }

    fn position_ms(&self) -> f64 {
        0.0
    }
}

/// Keysound cache that plays nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullKeysounds;

impl KeysoundCache for NullKeysounds {
    fn play(&mut self, _index: u32, _volume: f32) {}

    fn stop(&mut self, _index: u32) {}
}
