// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::error::Error;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{crate_version, Args, Parser, Subcommand};
use duration_string::DurationString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use vibeshift::audio::{self, AudioHost};
use vibeshift::config::{Audio, EngineConfig};
use vibeshift::engine::PlaybackEngine;
use vibeshift::events::{EngineEvent, EventKind};
use vibeshift::keyboard::Driver;
use vibeshift::note::note_name;
use vibeshift::progress::render_bar;
use vibeshift::sample::Sample;
use vibeshift::session::Session;

const PROGRESS_BAR_WIDTH: usize = 24;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A pitch-shifting sample player."
)]
struct Cli {
    /// The path to an engine configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Logs every engine event.
    #[arg(long, global = true)]
    debug_logging: bool,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Lists the available audio output devices.
    Devices {},
    /// Loads a sample and prints what was decoded.
    Info {
        #[command(flatten)]
        sample: SampleArgs,
    },
    /// Plays notes from a sample, one after another.
    Play {
        #[command(flatten)]
        sample: SampleArgs,
        /// The notes to play, e.g. C4 E4 G4.
        #[arg(required = true)]
        notes: Vec<String>,
        /// Time between notes, e.g. 250ms.
        #[arg(short, long, default_value = "250ms")]
        gap: String,
    },
    /// Plays a sample from the computer keyboard.
    Keys {
        #[command(flatten)]
        sample: SampleArgs,
    },
    /// Plays notes and prints every engine event as a JSON line.
    Events {
        #[command(flatten)]
        sample: SampleArgs,
        /// The notes to play, e.g. C4 E4 G4.
        notes: Vec<String>,
    },
}

#[derive(Args)]
struct SampleArgs {
    /// A URL or path to an audio file, or a YAML/JSON sample record.
    sample: String,
    /// The output device. Overrides the configuration file.
    #[arg(short, long)]
    device: Option<String>,
    /// The MIDI note the sample was recorded at (0-127).
    #[arg(short, long, value_parser = clap::value_parser!(u8).range(0..=127))]
    root_pitch: Option<u8>,
    /// Trim start in milliseconds.
    #[arg(long)]
    trim_start: Option<f64>,
    /// Trim end in milliseconds.
    #[arg(long)]
    trim_end: Option<f64>,
}

impl SampleArgs {
    fn to_sample(&self) -> Result<Sample, Box<dyn Error>> {
        let path = Path::new(&self.sample);
        let is_record = matches!(
            path.extension().and_then(|extension| extension.to_str()),
            Some("yaml" | "yml" | "json")
        );

        let mut sample = if is_record {
            Sample::deserialize(path)?
        } else {
            let id = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .unwrap_or("sample");
            Sample::new(id, &self.sample)
        };

        if let Some(root_pitch) = self.root_pitch {
            sample = sample.with_root_pitch(root_pitch)?;
        }
        if self.trim_start.is_some() || self.trim_end.is_some() {
            let trim_start = self.trim_start.or(sample.trim_start());
            let trim_end = self.trim_end.or(sample.trim_end());
            sample = sample.with_trim(trim_start, trim_end);
        }
        Ok(sample)
    }

    fn open_host(&self, config: &EngineConfig) -> Result<Arc<dyn AudioHost>, Box<dyn Error>> {
        let audio = match &self.device {
            Some(device) => Audio::new(Some(device)),
            None => config.audio().cloned().unwrap_or_default(),
        };
        Ok(audio::get_host(&audio)?)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::deserialize(path)?,
        None => EngineConfig::default(),
    };
    let config = if cli.debug_logging {
        config.with_debug_logging(true)
    } else {
        config
    };

    let default_filter = if config.debug_logging() { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Commands::Devices {} => {
            let devices = audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Info { sample } => {
            let engine = load(&sample, &config).await?;
            let Some(info) = engine.loaded_info() else {
                return Err("sample did not load".into());
            };
            let root_pitch = engine.sample().map(|s| s.root_pitch()).unwrap_or_default();
            let trim = engine.trim();

            println!("Sample: {}", info.sample_id);
            println!("Root: {} (MIDI {})", note_name(root_pitch), root_pitch);
            println!("Duration: {:.3}s", info.buffer_duration);
            println!("Frames: {}", info.buffer_length);
            println!("Sample rate: {}", info.sample_rate);
            println!("Channels: {}", info.number_of_channels);
            println!(
                "Trim: {:.0}ms - {:.0}ms ({:.3}s)",
                trim.start_ms(),
                trim.end_ms(),
                engine.trimmed_duration()
            );
        }
        Commands::Play { sample, notes, gap } => {
            let gap: Duration = DurationString::from_string(gap.clone())
                .map_err(|e| format!("invalid gap '{}': {}", gap, e))?
                .into();
            let engine = load(&sample, &config).await?;

            for note in notes.iter() {
                engine.play(note)?;
                println!("{}", note);
                tokio::time::sleep(gap).await;
            }
            wait_for_voices(&engine).await;
        }
        Commands::Keys { sample } => {
            let mut session = Session::new();
            session.boot(io::stdout())?;

            let engine = load(&sample, &config).await?;
            engine.subscribe(EventKind::Play, |event| {
                if let EngineEvent::Play { note, .. } = event {
                    println!("{}", note);
                }
            });
            Driver::new(engine.clone()).monitor_stdin().await??;
            engine.stop_all();
        }
        Commands::Events { sample, notes } => {
            let host = sample.open_host(&config)?;
            let engine = PlaybackEngine::new(Some(sample.to_sample()?), &config, Some(host))?;
            engine.subscribe_all(|event| match serde_json::to_string(event) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(err = %e, kind = %event.kind(), "Unable to serialize event"),
            });

            engine.load_sample().await?;
            for note in notes.iter() {
                engine.play(note)?;
            }
            wait_for_voices(&engine).await;
        }
    }

    Ok(())
}

/// Opens the output, then loads the sample with a progress bar on stderr.
async fn load(args: &SampleArgs, config: &EngineConfig) -> Result<PlaybackEngine, Box<dyn Error>> {
    let host = args.open_host(config)?;
    let engine = PlaybackEngine::new(Some(args.to_sample()?), config, Some(host))?;

    let progress = engine.subscribe(EventKind::SampleLoadingProgress, |event| {
        if let EngineEvent::SampleLoadingProgress { progress } = event {
            eprint!("\r{}", render_bar(*progress, PROGRESS_BAR_WIDTH));
        }
    });
    let result = engine.load_sample().await;
    engine.unsubscribe(progress);
    eprintln!();
    result?;

    info!(status = %engine.status(), "Sample ready");
    Ok(engine)
}

/// Waits until every voice has ended, or for one trim window past the last
/// note on outputs that never finish rendering.
async fn wait_for_voices(engine: &PlaybackEngine) {
    let limit = Duration::from_secs_f64(engine.trimmed_duration()) + Duration::from_secs(1);
    let wait = async {
        while engine.is_playing() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    if tokio::time::timeout(limit, wait).await.is_err() {
        warn!("Voices still sounding, stopping them");
        engine.stop_all();
    }
}
