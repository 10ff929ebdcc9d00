//! Frame-to-bands spectrum analysis.
//!
//! # Algorithm
//! Hann window → FFT → magnitudes over 20 Hz..16 kHz → logarithmic binning
//! into the configured band count (more resolution for bass, like the
//! familiar CAVA layout) → dB mapping with a −60 dB floor → rolling-peak
//! AGC so quiet and loud passages both fill the display → exponential
//! smoothing against the previous cycle.

use spectrum_analyzer::scaling::divide_by_N_sqrt;
use spectrum_analyzer::windows::hann_window;
use spectrum_analyzer::{samples_fft_to_spectrum, FrequencyLimit};

/// Analysis range. The top end stays below Nyquist for all supported rates.
const FREQ_MIN_HZ: f32 = 20.0;
const FREQ_MAX_HZ: f32 = 16_000.0;

/// dB window mapped onto [0, 1]: -60 dB and below renders as zero.
const DB_RANGE: f32 = 60.0;

/// The AGC peak never decays below this, so silence divides by a sane
/// constant instead of amplifying noise (or zero) to full scale.
const AGC_PEAK_FLOOR: f32 = 0.05;

const MAG_EPSILON: f32 = 1e-8;

/// One analysis cycle's output: per-band levels in [0, 1] plus the mean
/// level used for silence detection. Band count is fixed at startup.
#[derive(Debug, Clone)]
pub struct SpectrumBands {
    pub levels: Vec<f32>,
    pub mean: f32,
}

impl SpectrumBands {
    pub fn silent(n_bands: usize) -> Self {
        Self {
            levels: vec![0.0; n_bands],
            mean: 0.0,
        }
    }
}

/// Stateful analyzer: owns the band edges, the AGC rolling peak and the
/// smoothed levels from the previous cycle.
pub struct Analyzer {
    sample_rate: u32,
    smoothing: f32,
    agc_decay: f32,
    /// `n_bands + 1` log-spaced frequency edges.
    edges: Vec<f32>,
    smoothed: Vec<f32>,
    agc_peak: f32,
}

impl Analyzer {
    pub fn new(sample_rate: u32, n_bands: usize, smoothing: f32, agc_decay: f32) -> Self {
        let fmax = FREQ_MAX_HZ.min(sample_rate as f32 / 2.0 - 1.0);
        let ratio = fmax / FREQ_MIN_HZ;
        let edges = (0..=n_bands)
            .map(|i| FREQ_MIN_HZ * ratio.powf(i as f32 / n_bands as f32))
            .collect();
        Self {
            sample_rate,
            smoothing,
            agc_decay,
            edges,
            smoothed: vec![0.0; n_bands],
            agc_peak: AGC_PEAK_FLOOR,
        }
    }

    pub fn n_bands(&self) -> usize {
        self.smoothed.len()
    }

    /// Band index whose frequency range contains `freq`.
    fn band_index(&self, freq: f32) -> usize {
        let n = self.n_bands();
        for band in 0..n {
            if freq < self.edges[band + 1] {
                return band;
            }
        }
        n - 1
    }

    /// Consume one frame and produce the next smoothed band levels.
    ///
    /// The frame length must match the configured block size (a power of
    /// two); anything else is treated as silence.
    pub fn process(&mut self, frame: &[f32]) -> SpectrumBands {
        let raw = self.banded_magnitudes(frame);
        let normalized = self.normalize(&raw);

        for (slot, level) in self.smoothed.iter_mut().zip(normalized) {
            *slot = self.smoothing * *slot + (1.0 - self.smoothing) * level;
            if !slot.is_finite() {
                *slot = 0.0;
            }
        }

        let mean = self.smoothed.iter().sum::<f32>() / self.n_bands() as f32;
        SpectrumBands {
            levels: self.smoothed.clone(),
            mean,
        }
    }

    /// Mean FFT magnitude per band, zeros for silent or unusable frames.
    fn banded_magnitudes(&self, frame: &[f32]) -> Vec<f32> {
        let n = self.n_bands();
        let silent = frame.iter().all(|s| s.abs() < MAG_EPSILON);
        if silent || !frame.len().is_power_of_two() {
            return vec![0.0; n];
        }

        let windowed = hann_window(frame);
        let spectrum = match samples_fft_to_spectrum(
            &windowed,
            self.sample_rate,
            FrequencyLimit::Range(self.edges[0], self.edges[n]),
            Some(&divide_by_N_sqrt),
        ) {
            Ok(s) => s,
            Err(_) => return vec![0.0; n],
        };

        let mut sums = vec![0.0f32; n];
        let mut counts = vec![0u32; n];
        for (freq, value) in spectrum.data().iter() {
            let band = self.band_index(freq.val());
            sums[band] += value.val();
            counts[band] += 1;
        }
        sums.iter()
            .zip(&counts)
            .map(|(sum, &count)| if count > 0 { sum / count as f32 } else { 0.0 })
            .collect()
    }

    /// dB mapping plus rolling-peak AGC. The peak decays every cycle so a
    /// loud transient cannot pin quiet passages to the floor forever.
    fn normalize(&mut self, raw: &[f32]) -> Vec<f32> {
        let db_levels: Vec<f32> = raw
            .iter()
            .map(|&mag| {
                let db = 20.0 * mag.max(MAG_EPSILON).log10();
                ((db + DB_RANGE) / DB_RANGE).clamp(0.0, 1.0)
            })
            .collect();

        let cycle_peak = db_levels.iter().cloned().fold(0.0f32, f32::max);
        self.agc_peak = (self.agc_peak * self.agc_decay)
            .max(cycle_peak)
            .max(AGC_PEAK_FLOOR);

        db_levels
            .iter()
            .map(|level| (level / self.agc_peak).clamp(0.0, 1.0))
            .collect()
    }
}
