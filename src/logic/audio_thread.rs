//! Dedicated audio thread owning the output device.
//!
//! Music decoding and keysound playback never block the engine thread.

use crate::system::bus::{AudioCommand, SystemBus};
use rodio::source::Buffered;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Duration;

type Sample = Buffered<Decoder<BufReader<File>>>;

struct AudioWorker {
    _stream: Option<OutputStream>,
    stream_handle: Option<OutputStreamHandle>,
    music: Option<Sink>,
    samples: HashMap<u32, Sample>,
    /// Keysounds currently playing, one sink per index.
    voices: HashMap<u32, Sink>,
    speed: f32,
    volume: f32,
    position_counter: Arc<AtomicU64>,
}

impl AudioWorker {
    fn new(bus: &SystemBus) -> Self {
        let (stream, stream_handle) = match OutputStream::try_default() {
            Ok((stream, handle)) => {
                log::info!("AUDIO: Device found, audio enabled");
                (Some(stream), Some(handle))
            }
            Err(e) => {
                log::warn!(
                    "AUDIO: No audio device found ({}), running in silent mode",
                    e
                );
                (None, None)
            }
        };

        Self {
            _stream: stream,
            stream_handle,
            music: None,
            samples: HashMap::new(),
            voices: HashMap::new(),
            speed: 1.0,
            volume: 1.0,
            position_counter: bus.audio_position.clone(),
        }
    }

    /// Returns false once the thread should exit.
    fn handle_command(&mut self, cmd: AudioCommand, bus: &SystemBus) -> bool {
        match cmd {
            AudioCommand::Load { path, reply } => {
                let _ = reply.send(self.load_music(&path, bus));
            }
            AudioCommand::Play => {
                if let Some(sink) = &self.music {
                    sink.play();
                }
            }
            AudioCommand::Stop => {
                if let Some(sink) = self.music.take() {
                    sink.stop();
                }
                self.position_counter.store(0, Ordering::Relaxed);
            }
            AudioCommand::SetSpeed { speed } => {
                self.speed = speed;
                if let Some(sink) = &self.music {
                    sink.set_speed(speed);
                }
            }
            AudioCommand::SetVolume { volume } => {
                self.volume = volume;
                if let Some(sink) = &self.music {
                    sink.set_volume(volume);
                }
            }
            AudioCommand::LoadSample { index, path } => match decode(&path) {
                Ok(source) => {
                    self.samples.insert(index, source.buffered());
                }
                Err(e) => log::warn!("AUDIO: Keysound {} unavailable: {}", index, e),
            },
            AudioCommand::PlaySample { index, volume } => self.play_sample(index, volume),
            AudioCommand::StopSample { index } => {
                if let Some(sink) = self.voices.remove(&index) {
                    sink.stop();
                }
            }
            AudioCommand::ClearSamples => {
                self.voices.clear();
                self.samples.clear();
            }
            AudioCommand::Shutdown => return false,
        }
        true
    }

    fn load_music(&mut self, path: &Path, bus: &SystemBus) -> Result<(), String> {
        if let Some(sink) = self.music.take() {
            sink.stop();
        }
        self.position_counter.store(0, Ordering::Relaxed);

        let source = decode(path)?;

        // Silent mode still reports success so the engine keeps its visual clock.
        let Some(stream_handle) = &self.stream_handle else {
            return Ok(());
        };

        bus.audio_sample_rate
            .store(source.sample_rate() as u64, Ordering::Relaxed);
        bus.audio_channels
            .store(source.channels() as u64, Ordering::Relaxed);

        let monitor = AudioMonitor {
            inner: source,
            position_counter: self.position_counter.clone(),
        };

        let sink = Sink::try_new(stream_handle).map_err(|e| e.to_string())?;
        sink.set_speed(self.speed);
        sink.set_volume(self.volume);
        sink.append(monitor);
        sink.pause();

        self.music = Some(sink);
        log::info!("AUDIO: Loaded {:?}", path);
        Ok(())
    }

    fn play_sample(&mut self, index: u32, volume: f32) {
        let (Some(stream_handle), Some(sample)) = (&self.stream_handle, self.samples.get(&index))
        else {
            return;
        };

        // Retriggering a keysound cuts the previous voice.
        if let Some(previous) = self.voices.remove(&index) {
            previous.stop();
        }
        self.voices.retain(|_, sink| !sink.empty());

        match Sink::try_new(stream_handle) {
            Ok(sink) => {
                sink.set_volume(volume);
                sink.set_speed(self.speed);
                sink.append(sample.clone());
                self.voices.insert(index, sink);
            }
            Err(e) => log::error!("AUDIO: Failed to create keysound sink: {}", e),
        }
    }
}

fn decode(path: &Path) -> Result<Decoder<BufReader<File>>, String> {
    let file = File::open(path).map_err(|e| format!("cannot open {:?}: {}", path, e))?;
    Decoder::new(BufReader::new(file)).map_err(|e| format!("cannot decode {:?}: {}", path, e))
}

/// Counts samples as they are pulled by the device.
struct AudioMonitor<I> {
    inner: I,
    position_counter: Arc<AtomicU64>,
}

impl<I> Iterator for AudioMonitor<I>
where
    I: Iterator,
{
    type Item = I::Item;
    fn next(&mut self) -> Option<Self::Item> {
        let item = self.inner.next();
        if item.is_some() {
            self.position_counter.fetch_add(1, Ordering::Relaxed);
        }
        item
    }
}

impl<I> Source for AudioMonitor<I>
where
    I: Source,
    I::Item: rodio::Sample,
{
    fn current_frame_len(&self) -> Option<usize> {
        self.inner.current_frame_len()
    }
    fn channels(&self) -> u16 {
        self.inner.channels()
    }
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }
    fn total_duration(&self) -> Option<Duration> {
        self.inner.total_duration()
    }
}

/// Starts the dedicated audio thread.
pub fn start_audio_thread(bus: SystemBus) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("Audio Thread".to_string())
        .spawn(move || {
            log::info!("AUDIO: Thread started");

            let mut worker = AudioWorker::new(&bus);

            while let Ok(cmd) = bus.audio_cmd_rx.recv() {
                if !worker.handle_command(cmd, &bus) {
                    break;
                }
            }

            log::info!("AUDIO: Thread stopped");
        })
}
