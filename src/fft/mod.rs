/*
 * Copyright 2019 The Regents of the University of California
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 *
 */

//!
//! DC removal, forward transform, and peak extraction for one capture window
//!

use std::sync::Arc;

use num_complex::Complex32;
use num_traits::Zero;
use rustfft::{Fft as RustFft, FftPlanner};

/// Min/max/average of the raw samples in a window, computed before DC removal.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowStats {
    /// Minimum raw sample value in the window.
    pub min: i16,
    /// Maximum raw sample value in the window.
    pub max: i16,
    /// Mean raw sample value in the window.
    pub avg: f32,
}

/// Computes min/max/avg over `samples`, matching
/// `vd628x_platform.c::get_min_max_avg_remove_dc`'s statistics pass.
pub fn window_stats(samples: &[i16]) -> WindowStats {
    let mut min = i16::MAX;
    let mut max = i16::MIN;
    let mut sum = 0i64;
    for &s in samples {
        min = min.min(s);
        max = max.max(s);
        sum += i64::from(s);
    }
    let avg = if samples.is_empty() {
        0.0
    } else {
        sum as f32 / samples.len() as f32
    };
    WindowStats { min, max, avg }
}

/// The two strongest spectral peaks and the average magnitude of the five strongest
/// bins, before bus-drift correction.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Peaks {
    /// Frequency of the strongest spectral peak, in Hz.
    pub first_frequency: f32,
    /// Magnitude of the strongest spectral peak.
    pub first_amplitude: f32,
    /// Frequency of the second-strongest spectral peak, in Hz.
    pub second_frequency: f32,
    /// Magnitude of the second-strongest spectral peak.
    pub second_amplitude: f32,
    /// Average magnitude of the five strongest bins.
    pub avg_five_highest_amplitude: f32,
}

/// Forward FFT wrapper, sized once for a fixed window length and reused across
/// windows.
pub struct Transform {
    fft: Arc<dyn RustFft<f32>>,
    scratch: Vec<Complex32>,
    len: usize,
}

impl Transform {
    /// Builds a forward transform for windows of `len` samples.
    pub fn new(len: usize) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(len);
        let scratch_len = fft.get_inplace_scratch_len();
        Transform {
            fft,
            scratch: vec![Complex32::zero(); scratch_len],
            len,
        }
    }

    /// Window length this transform is sized for.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Copies `samples` into `buffer`, zero-pads the remainder up to `self.len()`,
    /// and runs the forward FFT in place. `samples` is expected to already be
    /// zero-mean (DC-removed by the caller via `window_stats`); this stage does not
    /// subtract the mean again.
    pub fn process(&mut self, samples: &[i16], buffer: &mut [Complex32]) {
        assert_eq!(buffer.len(), self.len);
        for (dst, &src) in buffer.iter_mut().zip(samples.iter()) {
            *dst = Complex32::new(src as f32, 0.0);
        }
        for dst in buffer.iter_mut().skip(samples.len()) {
            *dst = Complex32::zero();
        }
        self.fft.process_with_scratch(buffer, &mut self.scratch);
    }
}

/// Selects the five largest-magnitude bins over `1..window_length/2` by five
/// sequential single-pass scans, each scan excluding bins whose magnitude equals a
/// value already picked (not by bin index). This reproduces the original
/// `find_flk_freq_2` duplicate-value exclusion exactly, including its behavior of
/// silently dropping a bin whose magnitude ties an already-chosen one; see
/// `DESIGN.md`'s Open Question notes.
pub fn select_peaks(spectrum: &[Complex32], sampling_frequency: u32) -> Peaks {
    let nb = spectrum.len();
    let half = nb / 2;
    let mut index_max = [0usize; 5];
    let mut max_value = [-1.0f32; 5];

    for slot in 0..5 {
        for i in 1..half {
            let mag = spectrum[i].norm();
            if mag <= max_value[slot] {
                continue;
            }
            if max_value[..slot].iter().any(|&v| mag == v) {
                continue;
            }
            index_max[slot] = i;
            max_value[slot] = mag;
        }
    }

    let bin_frequency = |bin: usize| -> f32 { (bin as u32 * sampling_frequency / nb as u32) as f32 };

    let amplitudes: Vec<f32> = max_value.iter().map(|&v| v / nb as f32).collect();
    Peaks {
        first_frequency: bin_frequency(index_max[0]),
        first_amplitude: amplitudes[0],
        second_frequency: bin_frequency(index_max[1]),
        second_amplitude: amplitudes[1],
        avg_five_highest_amplitude: amplitudes.iter().sum::<f32>() / 5.0,
    }
}

/// Multiplies both peak frequencies by `actual_bus_frequency / default_bus_frequency`,
/// matching `vd628x_flk_detect.c`'s post-`find_flk_freq_2` correction.
pub fn correct_for_bus_drift(peaks: &mut Peaks, actual_bus_frequency_hz: f64, default_bus_frequency_hz: f64) {
    let ratio = (actual_bus_frequency_hz / default_bus_frequency_hz) as f32;
    peaks.first_frequency *= ratio;
    peaks.second_frequency *= ratio;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone_spectrum(freq_hz: f32, sampling_frequency: u32, len: usize) -> Vec<Complex32> {
        let samples: Vec<i16> = (0..len)
            .map(|n| {
                let t = n as f32 / sampling_frequency as f32;
                (8000.0 * (2.0 * PI * freq_hz * t).sin()) as i16
            })
            .collect();
        let mut transform = Transform::new(len);
        let mut buffer = vec![Complex32::zero(); len];
        transform.process(&samples, &mut buffer);
        buffer
    }

    #[test]
    fn select_peaks_finds_tone_bin() {
        let sampling_frequency = 2048;
        let len = 2048;
        let spectrum = tone_spectrum(120.0, sampling_frequency, len);
        let peaks = select_peaks(&spectrum, sampling_frequency);
        assert!((peaks.first_frequency - 120.0).abs() <= 1.0);
    }

    #[test]
    fn bus_drift_correction_scales_frequencies() {
        let mut peaks = Peaks {
            first_frequency: 100.0,
            second_frequency: 200.0,
            ..Peaks::default()
        };
        correct_for_bus_drift(&mut peaks, 4_200_000.0, 4_194_304.0);
        assert!(peaks.first_frequency > 100.0);
        assert!(peaks.second_frequency > 200.0);
    }

    #[test]
    fn window_stats_computes_min_max_avg() {
        let stats = window_stats(&[-10, 0, 10, 20]);
        assert_eq!(stats.min, -10);
        assert_eq!(stats.max, 20);
        assert_eq!(stats.avg, 5.0);
    }
}
