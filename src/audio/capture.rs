//! Audio capture from a monitor source via cpal.
//!
//! The stream callback downmixes to mono and writes into a ring buffer;
//! a supervisor loop snapshots the ring once per chunk interval, runs the
//! analyzer and publishes the result. Device loss is retried with capped
//! exponential backoff and logged once per transition, never fatal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, info, warn};

use crate::audio::bands::{Analyzer, SpectrumBands};
use crate::config::AudioSettings;
use crate::error::{Error, Result};
use crate::shared::{Latest, StopFlag};

const RETRY_INITIAL: Duration = Duration::from_millis(500);
const RETRY_CAP: Duration = Duration::from_secs(5);

/// Mono ring buffer shared between the cpal callback and the supervisor.
struct SampleRing {
    samples: Vec<f32>,
    write_pos: usize,
}

impl SampleRing {
    fn new(size: usize) -> Self {
        Self {
            samples: vec![0.0; size],
            write_pos: 0,
        }
    }

    fn push(&mut self, mono: &[f32]) {
        for &sample in mono {
            self.samples[self.write_pos] = sample;
            self.write_pos = (self.write_pos + 1) % self.samples.len();
        }
    }

    /// Copy samples oldest-to-newest into a preallocated buffer.
    fn snapshot(&self, out: &mut [f32]) {
        let len = self.samples.len();
        for (i, slot) in out.iter_mut().enumerate().take(len) {
            *slot = self.samples[(self.write_pos + i) % len];
        }
    }
}

/// Pick a capture device: configured name first, then any monitor source,
/// then the default input device.
fn pick_device(host: &cpal::Host, preferred: Option<&str>) -> Option<cpal::Device> {
    let devices: Vec<cpal::Device> = match host.input_devices() {
        Ok(devices) => devices.collect(),
        Err(e) => {
            debug!("input device enumeration failed: {}", e);
            Vec::new()
        }
    };

    if let Some(wanted) = preferred {
        let wanted = wanted.to_lowercase();
        for device in &devices {
            if let Ok(name) = device.name() {
                if name.to_lowercase().contains(&wanted) {
                    return Some(device.clone());
                }
            }
        }
    }

    for device in &devices {
        if let Ok(name) = device.name() {
            if name.to_lowercase().contains("monitor") {
                return Some(device.clone());
            }
        }
    }

    host.default_input_device()
}

/// Build and start the input stream. The callback owns only the ring and
/// the failure flag; the stream handle stays on the supervisor thread.
fn open_stream(
    settings: &AudioSettings,
    ring: Arc<Mutex<SampleRing>>,
    failed: Arc<AtomicBool>,
) -> Result<(cpal::Stream, String)> {
    let host = cpal::default_host();
    let device = pick_device(&host, settings.device.as_deref())
        .ok_or_else(|| Error::DeviceUnavailable("no audio input device found".into()))?;
    let name = device.name().unwrap_or_else(|_| "unknown".into());

    let supported = device
        .default_input_config()
        .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", name, e)))?;
    let channels = supported.channels() as usize;
    if channels == 0 {
        return Err(Error::DeviceUnavailable(format!(
            "{}: reports zero channels",
            name
        )));
    }

    let stream_config = cpal::StreamConfig {
        channels: channels as u16,
        sample_rate: cpal::SampleRate(settings.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let callback_failed = failed.clone();
    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                if let Ok(mut ring) = ring.lock() {
                    if channels == 1 {
                        ring.push(data);
                    } else {
                        for chunk in data.chunks(channels) {
                            let mono = chunk.iter().sum::<f32>() / chunk.len() as f32;
                            ring.push(&[mono]);
                        }
                    }
                }
            },
            move |err| {
                debug!("audio stream error: {}", err);
                callback_failed.store(true, Ordering::Relaxed);
            },
            None,
        )
        .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", name, e)))?;

    stream
        .play()
        .map_err(|e| Error::DeviceUnavailable(format!("{}: {}", name, e)))?;

    Ok((stream, name))
}

/// Spawn the capture/analysis worker. It publishes `SpectrumBands` into
/// `out` once per chunk interval and exits when `stop` is raised.
pub fn spawn(
    settings: AudioSettings,
    out: Arc<Latest<SpectrumBands>>,
    stop: StopFlag,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("audio-capture".into())
        .spawn(move || run(settings, out, stop))
        .expect("spawning audio capture thread")
}

fn run(settings: AudioSettings, out: Arc<Latest<SpectrumBands>>, stop: StopFlag) {
    let chunk = Duration::from_secs_f32(settings.block_size as f32 / settings.sample_rate as f32);
    let mut backoff = RETRY_INITIAL;
    let mut was_up = false;

    while !stop.is_raised() {
        let ring = Arc::new(Mutex::new(SampleRing::new(settings.block_size)));
        let failed = Arc::new(AtomicBool::new(false));

        match open_stream(&settings, ring.clone(), failed.clone()) {
            Err(e) => {
                if was_up || backoff == RETRY_INITIAL {
                    warn!("audio capture unavailable, retrying: {}", e);
                }
                if was_up {
                    // Let the display fall back to idle instead of freezing
                    // on the last live frame.
                    out.publish(SpectrumBands::silent(settings.n_bands));
                    was_up = false;
                }
                if stop.sleep(backoff) {
                    break;
                }
                backoff = (backoff * 2).min(RETRY_CAP);
            }
            Ok((stream, name)) => {
                info!(
                    "capturing from '{}' at {} Hz, {}-sample chunks",
                    name, settings.sample_rate, settings.block_size
                );
                was_up = true;
                backoff = RETRY_INITIAL;

                let mut analyzer = Analyzer::new(
                    settings.sample_rate,
                    settings.n_bands,
                    settings.smoothing,
                    settings.agc_decay,
                );
                let mut frame = vec![0.0f32; settings.block_size];

                while !stop.is_raised() && !failed.load(Ordering::Relaxed) {
                    if stop.sleep(chunk) {
                        break;
                    }
                    if let Ok(ring) = ring.lock() {
                        ring.snapshot(&mut frame);
                    }
                    out.publish(analyzer.process(&frame));
                }

                // Releases the device handle before any retry or exit.
                drop(stream);

                if failed.load(Ordering::Relaxed) && !stop.is_raised() {
                    warn!("audio stream on '{}' died, reopening", name);
                    out.publish(SpectrumBands::silent(settings.n_bands));
                    was_up = false;
                }
            }
        }
    }
    debug!("audio capture thread stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_snapshot_is_oldest_first() {
        let mut ring = SampleRing::new(4);
        ring.push(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let mut out = [0.0; 4];
        ring.snapshot(&mut out);
        assert_eq!(out, [3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn ring_starts_silent() {
        let ring = SampleRing::new(4);
        let mut out = [9.0; 4];
        ring.snapshot(&mut out);
        assert_eq!(out, [0.0; 4]);
    }
}
