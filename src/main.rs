//! Headless runner: plays a chart through the engine and prints the result.

use rvsrg_sync::logic::audio::{AudioDevice, AudioManager, KeysoundCache, NullKeysounds, SilentAudio};
use rvsrg_sync::logic::audio_thread::start_audio_thread;
use rvsrg_sync::models::chart::Chart;
use rvsrg_sync::models::replay::ReplayData;
use rvsrg_sync::models::settings::EngineSettings;
use rvsrg_sync::state::{EngineEvent, EngineState, RhythmEngine};
use rvsrg_sync::system::bus::SystemBus;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use std::{env, fs, process, thread};

/// Engine ticks per second.
const TPS: u64 = 200;

struct Args {
    chart: PathBuf,
    settings: PathBuf,
    replay: Option<PathBuf>,
    silent: bool,
    /// Tick as fast as possible instead of in real time.
    fast: bool,
}

fn usage() -> ! {
    eprintln!(
        "usage: rvsrg-sync <chart.json> [--settings settings.toml] [--replay replay.json] [--silent] [--fast]"
    );
    process::exit(2);
}

fn parse_args() -> Args {
    let mut chart = None;
    let mut settings = PathBuf::from("settings.toml");
    let mut replay = None;
    let mut silent = false;
    let mut fast = false;

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--settings" => settings = args.next().map(PathBuf::from).unwrap_or_else(|| usage()),
            "--replay" => replay = Some(args.next().map(PathBuf::from).unwrap_or_else(|| usage())),
            "--silent" => silent = true,
            "--fast" => fast = true,
            _ if chart.is_none() && !arg.starts_with("--") => chart = Some(PathBuf::from(&arg)),
            _ => usage(),
        }
    }

    Args {
        chart: chart.unwrap_or_else(|| usage()),
        settings,
        replay,
        silent,
        fast: fast || silent,
    }
}

fn load_chart(path: &Path) -> Result<Chart, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("{:?}: {}", path, e))?;
    let mut chart: Chart = serde_json::from_str(&content).map_err(|e| format!("{:?}: {}", path, e))?;

    // Audio and keysound paths are relative to the chart file.
    if let Some(dir) = path.parent() {
        chart.resolve_paths(dir);
    }
    Ok(chart)
}

fn load_replay(path: &Path) -> Result<ReplayData, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("{:?}: {}", path, e))?;
    ReplayData::from_json(&content)
}

type AudioBackend = (
    Arc<dyn AudioDevice>,
    Box<dyn KeysoundCache>,
    Option<AudioManager>,
);

/// Starts the audio thread, falling back to silence when it cannot run.
fn open_audio(silent: bool) -> AudioBackend {
    if silent {
        return (Arc::new(SilentAudio), Box::new(NullKeysounds), None);
    }

    let bus = SystemBus::new();
    match start_audio_thread(bus.clone()) {
        Ok(_) => {
            let manager = AudioManager::new(&bus);
            let keysounds = manager.keysounds();
            (Arc::new(manager.clone()), Box::new(keysounds), Some(manager))
        }
        Err(e) => {
            log::warn!("MAIN: Audio thread unavailable ({}), running silent", e);
            (Arc::new(SilentAudio), Box::new(NullKeysounds), None)
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = parse_args();
    log::info!("MAIN: Booting rvsrg-sync...");

    let settings = EngineSettings::load_or_default(&args.settings);

    let chart = match load_chart(&args.chart) {
        Ok(chart) => chart,
        Err(e) => {
            log::error!("MAIN: Failed to read chart {}", e);
            process::exit(1);
        }
    };

    let replay = match args.replay.as_deref().map(load_replay).transpose() {
        Ok(replay) => replay,
        Err(e) => {
            log::error!("MAIN: Failed to read replay {}", e);
            process::exit(1);
        }
    };

    let (audio, keysounds, audio_manager) = open_audio(args.silent);
    if let Some(manager) = &audio_manager {
        manager.load_samples(&chart.samples);
    }

    let mut engine = RhythmEngine::new(settings, audio, keysounds);
    if let Err(e) = engine.load(&chart, replay) {
        log::error!("MAIN: {}", e);
        process::exit(1);
    }
    if let Err(e) = engine.start() {
        log::error!("MAIN: {}", e);
        process::exit(1);
    }

    let target_dt = Duration::from_secs_f64(1.0 / TPS as f64);
    let mut last_time = Instant::now();

    while engine.state() == EngineState::Playing {
        let dt = if args.fast {
            target_dt
        } else {
            thread::sleep(target_dt.saturating_sub(last_time.elapsed()));
            let now = Instant::now();
            let dt = now - last_time;
            last_time = now;
            dt
        };

        engine.update(dt.as_secs_f64());

        for event in engine.drain_events() {
            match event {
                EngineEvent::Judgement(info) => log::debug!(
                    "MAIN: Lane {} {:?} ({:+.1} ms)",
                    info.lane,
                    info.result,
                    info.offset_ms
                ),
                EngineEvent::Jam { combo } => log::debug!("MAIN: Jam x{}", combo),
                _ => {}
            }
        }
    }

    let summary = engine.score_manager().summary();
    match serde_json::to_string_pretty(&summary) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("MAIN: Failed to serialize result: {}", e),
    }

    engine.release();
    if let Some(manager) = audio_manager {
        manager.shutdown();
    }
    log::info!("MAIN: Done");
}
