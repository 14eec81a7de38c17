//! `wakeloop-cli` -- exercise the wake-word core without a microphone.
//!
//! - `wakeloop-cli detect` -- stream a WAV file through the detector and print triggers.
//! - `wakeloop-cli synth` -- write the synthetic reference audio of a phrase to WAV.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use wakeloop::{wav, BackendPreference, DetectorConfig, DetectorEvent, SyntheticPatternProvider, WakeWordDetector};

#[derive(Parser)]
#[command(name = "wakeloop-cli", about = "Wake-word detection tester", version)]
struct Cli {
    /// Enable verbose (debug-level) logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a WAV file through the detector.
    Detect(DetectArgs),

    /// Write the synthetic reference audio of a phrase.
    Synth(SynthArgs),
}

/// Detector settings shared by both subcommands.
#[derive(Args)]
struct ConfigArgs {
    /// TOML file with detector settings; missing keys keep their defaults.
    #[arg(short, long, env = "WAKELOOP_CONFIG")]
    config: Option<PathBuf>,

    /// Detection threshold (0.0 - 1.0).
    #[arg(short, long)]
    threshold: Option<f32>,

    /// Transform backend: auto, scalar or vectorized.
    #[arg(long)]
    backend: Option<BackendPreference>,
}

#[derive(Args)]
struct DetectArgs {
    /// Input WAV file, any rate and channel count.
    input: PathBuf,

    /// Trigger phrase.
    #[arg(short, long, default_value = "hey wake")]
    phrase: String,

    /// Audio per process_audio call, in milliseconds.
    #[arg(long, default_value = "32")]
    chunk_ms: u32,

    /// Playback speed relative to real time; 0 feeds as fast as possible.
    #[arg(long, default_value = "1.0")]
    speed: f32,

    /// Print continuous score updates.
    #[arg(long)]
    scores: bool,

    #[command(flatten)]
    settings: ConfigArgs,
}

#[derive(Args)]
struct SynthArgs {
    /// Output WAV file.
    output: PathBuf,

    /// Trigger phrase.
    #[arg(short, long, default_value = "hey wake")]
    phrase: String,

    /// Silence before the phrase, in frames.
    #[arg(long, default_value = "5")]
    lead_frames: usize,

    /// Silence after the phrase, in frames.
    #[arg(long, default_value = "5")]
    tail_frames: usize,

    #[command(flatten)]
    settings: ConfigArgs,
}

fn load_config(args: &ConfigArgs) -> Result<DetectorConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str(&text).with_context(|| format!("invalid config {}", path.display()))?
        }
        None => DetectorConfig::default(),
    };
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    if let Some(backend) = args.backend {
        config.backend = backend;
    }
    config.validate()?;
    Ok(config)
}

fn report(event: DetectorEvent, detector: &WakeWordDetector, position: Duration) {
    match event {
        DetectorEvent::WakeWordDetected { confidence } => {
            println!("[{:>8.3}s] wake word detected (confidence {:.3})", position.as_secs_f32(), confidence);
            detector.resume();
        }
        DetectorEvent::Error { message } => {
            eprintln!("[{:>8.3}s] error: {}", position.as_secs_f32(), message);
        }
    }
}

fn detect(args: DetectArgs) -> Result<()> {
    let config = load_config(&args.settings)?;
    let samples = wav::load_pcm16(&args.input, config.sample_rate)?;
    let chunk_len = (config.sample_rate as usize * args.chunk_ms as usize / 1000).max(1);

    println!("Input:     {} ({} samples)", args.input.display(), samples.len());
    println!("Phrase:    {}", args.phrase);
    println!("Threshold: {}", config.threshold);

    let mut detector = WakeWordDetector::new(&args.phrase, config.clone())?;
    let events = detector.events();
    let started = Instant::now();
    let mut fed = 0usize;

    for chunk in samples.chunks(chunk_len) {
        let bytes: Vec<u8> = chunk.iter().flat_map(|s| s.to_le_bytes()).collect();
        if let Err(e) = detector.process_audio(&bytes) {
            tracing::warn!(error = %e, "chunk dropped");
        }
        fed += chunk.len();
        let position = Duration::from_secs_f64(fed as f64 / config.sample_rate as f64);

        while let Ok(event) = events.try_recv() {
            report(event, &detector, position);
        }
        if args.scores {
            print!("\rscore: {:.3}", detector.stats().last_score);
            std::io::Write::flush(&mut std::io::stdout())?;
        }
        if args.speed > 0.0 {
            let due = position.div_f32(args.speed);
            if let Some(wait) = due.checked_sub(started.elapsed()) {
                std::thread::sleep(wait);
            }
        }
    }

    let end = Duration::from_secs_f64(fed as f64 / config.sample_rate as f64);
    while let Ok(event) = events.recv_timeout(Duration::from_millis(500)) {
        report(event, &detector, end);
    }
    if args.scores {
        println!();
    }

    detector.shutdown();
    let stats = detector.stats();
    println!();
    println!("chunks: {} ({} rejected)", stats.chunks_in, stats.chunks_rejected);
    println!(
        "matches: {} run, {} coalesced, {} cancelled",
        stats.matches_run, stats.matches_coalesced, stats.matches_cancelled
    );
    println!("triggers: {}  errors: {}", stats.triggers, stats.errors);
    println!("best score: {:.3}", stats.best_score);
    println!("match time: avg {:.2} ms, max {:.2} ms", stats.match_avg_ms, stats.match_max_ms);
    println!("backend fallbacks: {}  pool misses: {}", stats.backend_fallbacks, stats.pool_misses);
    Ok(())
}

fn synth(args: SynthArgs) -> Result<()> {
    let config = load_config(&args.settings)?;
    let n = config.frame_size;

    let mut audio = vec![0i16; args.lead_frames * n];
    audio.extend(SyntheticPatternProvider.phrase_audio(&args.phrase, n, config.sample_rate));
    audio.resize(audio.len() + args.tail_frames * n, 0);

    save_wav(&args.output, &audio, config.sample_rate)?;
    println!(
        "wrote {} ({:.2}s at {} Hz)",
        args.output.display(),
        audio.len() as f32 / config.sample_rate as f32,
        config.sample_rate
    );
    Ok(())
}

fn save_wav(path: &Path, audio: &[i16], sample_rate: u32) -> Result<()> {
    wav::write_pcm16(path, audio, sample_rate).with_context(|| format!("failed to write {}", path.display()))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    match cli.command {
        Commands::Detect(args) => detect(args),
        Commands::Synth(args) => synth(args),
    }
}
