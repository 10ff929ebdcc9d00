mod audio;
mod config;
mod controller;
mod display;
mod error;
mod metadata;
mod shared;

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use chrono::{Local, Timelike};
use clap::Parser;
use log::{info, warn};

use config::Settings;
use controller::Controller;
use display::sink::{DisplaySink, LedMatrix, NullSink, TerminalPreview};
use shared::{Latest, StopFlag};

#[derive(Parser)]
#[command(name = "sensegrid")]
#[command(version)]
#[command(about = "Audio spectrum and track display for the Sense HAT LED matrix", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/sensegrid/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Render to the terminal instead of the LED matrix
    #[arg(short, long)]
    preview: bool,

    /// Run without any display output
    #[arg(long)]
    headless: bool,

    /// Debug-level logging
    #[arg(short, long)]
    verbose: bool,
}

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

extern "C" fn on_signal(_sig: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, on_signal as libc::sighandler_t);
        libc::signal(libc::SIGTERM, on_signal as libc::sighandler_t);
    }
}

fn init_logging(verbose: bool) -> anyhow::Result<()> {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .context("initializing logging")
}

/// Current wall-clock time as a fractional hour (14.5 = 14:30).
fn fractional_hour() -> f32 {
    let now = Local::now();
    now.hour() as f32 + now.minute() as f32 / 60.0
}

fn open_sink(cli: &Cli) -> Box<dyn DisplaySink> {
    if cli.headless {
        return Box::new(NullSink);
    }
    if cli.preview {
        match TerminalPreview::new() {
            Ok(preview) => return Box::new(preview),
            Err(e) => {
                warn!("terminal preview unavailable ({}), running headless", e);
                return Box::new(NullSink);
            }
        }
    }
    match LedMatrix::open() {
        Ok(matrix) => Box::new(matrix),
        Err(e) => {
            warn!("LED matrix unavailable ({}), running headless", e);
            Box::new(NullSink)
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;
    install_signal_handlers();

    let settings = Settings::load(cli.config.as_deref()).context("loading configuration")?;
    info!(
        "starting: {} bands @ {} Hz, pipe {}",
        settings.audio.n_bands,
        settings.audio.sample_rate,
        settings.metadata.pipe_path.display()
    );

    let stop = StopFlag::new();
    let bands = Arc::new(Latest::new());
    let track = Arc::new(Latest::new());

    let capture = audio::capture::spawn(settings.audio.clone(), bands.clone(), stop.clone());
    let metadata = metadata::spawn(settings.metadata.clone(), track.clone(), stop.clone());

    let mut sink = open_sink(&cli);
    let mut controller = Controller::new(settings, bands, track, Instant::now());
    let tick = controller.tick_interval();

    loop {
        if STOP_REQUESTED.load(Ordering::SeqCst) {
            stop.raise();
        }
        if stop.is_raised() {
            break;
        }
        let frame = controller.tick(Instant::now(), fractional_hour());
        sink.push(&frame);
        if stop.sleep(tick) {
            break;
        }
    }

    info!("shutting down");
    stop.raise();
    sink.clear();
    if capture.join().is_err() {
        warn!("audio capture thread panicked");
    }
    if metadata.join().is_err() {
        warn!("metadata thread panicked");
    }
    info!("shutdown complete");
    Ok(())
}
