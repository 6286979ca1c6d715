//! mmlplay — play, inspect, or render Music Macro Language.
//!
//! Tracks are separated by commas and play together:
//!
//! ```text
//! mmlplay play "t120 l8 cdefgab>c, t120 l2 o3 c g"
//! ```

use std::io::Read;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use mmlplay::audio::{MasterBus, OfflineDevice, SynthDevice, Waveform};
use mmlplay::config::{Config, ConfigError};
use mmlplay::mml::Compiler;
use mmlplay::playback::{PlaybackError, Player, PlayerOptions, ToneDevice};

/// How often the play loop collects finished tones.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Extra wait after the last note before giving up on end notifications.
const TAIL_SECONDS: f64 = 0.5;

#[derive(Debug, Parser)]
#[command(name = "mmlplay", version, about = "Music Macro Language player")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: ~/.mmlplay/config.yaml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Play through the default audio output.
    Play {
        /// MML source, or `-` to read stdin.
        mml: String,
    },
    /// Print the tokens of every track.
    Tokens { mml: String },
    /// Print the timed instructions of every track.
    Schedule { mml: String },
    /// Render to a 16-bit WAV file.
    Render {
        mml: String,
        #[arg(short, long)]
        output: PathBuf,
        #[arg(long, default_value_t = 44_100)]
        sample_rate: u32,
        #[arg(long, default_value_t = 1)]
        channels: u16,
    },
}

/// Command-line values that take precedence over the config file.
#[derive(Debug, Args)]
struct Overrides {
    #[arg(long, global = true)]
    tempo: Option<u32>,
    #[arg(long, global = true)]
    octave: Option<i32>,
    #[arg(long, global = true)]
    length: Option<u32>,
    #[arg(long, global = true)]
    volume: Option<u32>,
    #[arg(long, global = true, value_enum)]
    waveform: Option<Waveform>,
}

impl Overrides {
    fn apply(&self, config: &mut Config) {
        let defaults = &mut config.defaults;
        defaults.tempo = self.tempo.unwrap_or(defaults.tempo);
        defaults.octave = self.octave.unwrap_or(defaults.octave);
        defaults.length = self.length.unwrap_or(defaults.length);
        defaults.volume = self.volume.unwrap_or(defaults.volume);
        config.audio.waveform = self.waveform.unwrap_or(config.audio.waveform);
    }
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Playback(#[from] PlaybackError),
    #[error("cannot read stdin: {0}")]
    Stdin(#[from] std::io::Error),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("mmlplay: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };
    cli.overrides.apply(&mut config);

    match cli.command {
        Command::Play { mml } => play(&config, &read_source(mml)?),
        Command::Tokens { mml } => {
            for (idx, tokens) in Compiler::tokenize(&read_source(mml)?).iter().enumerate() {
                let line: Vec<String> = tokens.iter().map(ToString::to_string).collect();
                println!("track {idx}: {}", line.join(" "));
            }
            Ok(())
        }
        Command::Schedule { mml } => {
            let song = Compiler::compile(&read_source(mml)?, config.defaults, 0.0);
            for track in &song.tracks {
                println!("{}:", track.id);
                for instruction in &track.instructions {
                    println!("  {instruction}");
                }
            }
            println!("end: {:.3}s", song.end());
            Ok(())
        }
        Command::Render {
            mml,
            output,
            sample_rate,
            channels,
        } => {
            let device = OfflineDevice::new(config.audio.waveform, sample_rate, channels)
                .with_master(MasterBus::new(
                    config.audio.master_volume,
                    mmlplay::audio::master::DEFAULT_CEILING,
                ));
            let mut options = PlayerOptions::from(&config);
            options.lead_in = 0.0;
            let mut player = Player::new(device, options);
            let song = player.compile_and_play(&read_source(mml)?)?;
            let frames = player.device_mut().save_wav(&output)?;
            println!(
                "wrote {} ({} tones, {:.2}s, {frames} frames)",
                output.display(),
                song.play_count(),
                frames as f64 / f64::from(sample_rate)
            );
            Ok(())
        }
    }
}

fn play(config: &Config, source: &str) -> Result<(), CliError> {
    let device = SynthDevice::new(
        config.audio.waveform,
        config.audio.master_volume,
        config.audio.sample_rate,
    )?;
    println!(
        "audio: {} Hz, {} ch",
        device.sample_rate(),
        device.channels()
    );

    let mut player = Player::new(device, PlayerOptions::from(config));
    let song = player.compile_and_play(source)?;
    println!(
        "playing {} tracks, {} tones, {:.1}s",
        song.tracks.len(),
        song.play_count(),
        song.end() - song.origin
    );

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&interrupted);
    if let Err(e) = ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst)) {
        tracing::warn!("cannot install Ctrl-C handler: {e}");
    }

    let deadline = song.end() + TAIL_SECONDS;
    while !interrupted.load(Ordering::SeqCst) {
        player.device_mut().poll_ended();
        if player.engine().active_count() == 0 || player.device().current_time() > deadline {
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    if interrupted.load(Ordering::SeqCst) {
        let stopped = player.stop_all();
        println!("stopped {stopped} tones");
        // Let the release reach the audio thread before the stream drops.
        thread::sleep(POLL_INTERVAL * 2);
    } else {
        println!("done.");
    }
    Ok(())
}

/// `-` reads the whole of stdin; anything else is the source itself.
fn read_source(arg: String) -> Result<String, CliError> {
    if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        Ok(arg)
    }
}
