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
//! The detect worker: the long-running capture/analyze loop
//!

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;

use num_complex::Complex32;
use num_traits::Zero;

use crate::capture::{CaptureState, WindowStatus};
use crate::device::{
    clamp_speed_hz, effective_bus_frequency, BusInfo, SampleSource, DEFAULT_BUS_FREQUENCY_HZ,
};
use crate::fft::{correct_for_bus_drift, select_peaks, window_stats, Transform};
use crate::result::{FlickerChannel, FlickerResult};
use crate::ring::ResultRing;

/// Shared with the session: the worker publishes here and signals `poll_cond`.
pub struct SharedRing {
    /// The published result ring, guarded by the same lock `poll_cond` waits on.
    pub ring: Mutex<ResultRing>,
    /// Signaled by the detect worker each time it publishes a new result.
    pub poll_cond: Condvar,
}

impl SharedRing {
    pub fn new() -> Self {
        SharedRing {
            ring: Mutex::new(ResultRing::new()),
            poll_cond: Condvar::new(),
        }
    }
}

impl Default for SharedRing {
    fn default() -> Self {
        Self::new()
    }
}

/// A new sampling frequency requested mid-run by `Configure`, picked up by the
/// worker at the next window boundary. Zero means no change is pending, matching
/// `vd628x_flk_detect.c`'s `new_sampling_frequency != 0` check.
#[derive(Debug, Default)]
pub struct PendingFrequency(AtomicU32);

impl PendingFrequency {
    pub fn new() -> Self {
        PendingFrequency(AtomicU32::new(0))
    }

    pub fn request(&self, hz: u32) {
        self.0.store(hz, Ordering::SeqCst);
    }

    fn take_if_set(&self, current: u32) -> Option<u32> {
        let requested = self.0.load(Ordering::SeqCst);
        if requested != 0 && requested != current {
            self.0.store(0, Ordering::SeqCst);
            Some(requested)
        } else {
            None
        }
    }
}

/// Runs the detect loop until `device.read_chunk` fails or `stop` is observed.
///
/// Grounded on `vd628x_flk_detect.c::flicker_detect_routine`: read chunk, advance
/// capture state, on window-ready compute stats + FFT + bus-drift correction,
/// publish, handle a pending frequency change, restart transfers.
pub fn run<D: SampleSource>(
    mut device: D,
    bus_info: BusInfo,
    mut capture: CaptureState,
    shared: Arc<SharedRing>,
    pending_frequency: Arc<PendingFrequency>,
    stop: Arc<std::sync::atomic::AtomicBool>,
) -> D {
    let speed_hz = clamp_speed_hz(bus_info.max_bus_frequency_hz);
    let mut buffer = vec![0i16; capture.full_window_len()];
    let mut transform = Transform::new(capture.full_window_len());
    let mut spectrum = vec![Complex32::zero(); capture.full_window_len()];

    let mut window_start = Instant::now();
    let mut chunks_in_window: u64 = 0;
    let mut last_chunk_before_end = Instant::now();

    while !stop.load(Ordering::SeqCst) {
        let offset = capture.chunks_done() as usize * capture.samples_per_chunk();
        if chunks_in_window == 0 {
            window_start = Instant::now();
        }
        if let Err(e) = device.read_chunk(&mut buffer, offset, capture.samples_per_chunk()) {
            log::error!("device read failed, stopping detect worker: {}", e);
            break;
        }
        chunks_in_window += 1;
        last_chunk_before_end = Instant::now();

        match capture.try_advance_chunk() {
            WindowStatus::InProgress => continue,
            WindowStatus::Overrun => {
                log::error!("capture window overrun; this indicates a sizing bug");
                break;
            }
            WindowStatus::WindowReady => {
                let real_len = capture.current_window_len();
                let stats = window_stats(&buffer[..real_len]);
                let dc_removed: Vec<i16> = buffer[..real_len]
                    .iter()
                    .map(|&s| (f32::from(s) - stats.avg) as i16)
                    .collect();

                transform.process(&dc_removed, &mut spectrum);
                let sampling_frequency = capture.sampling_frequency();
                let mut peaks = select_peaks(&spectrum, sampling_frequency);

                let actual_bus_frequency = effective_bus_frequency(
                    chunks_in_window,
                    bus_info.chunk_size,
                    last_chunk_before_end.saturating_duration_since(window_start),
                );
                correct_for_bus_drift(
                    &mut peaks,
                    actual_bus_frequency,
                    f64::from(DEFAULT_BUS_FREQUENCY_HZ),
                );

                let result = FlickerResult {
                    channel: FlickerChannel::ClearChannel1,
                    first_peak_frequency: peaks.first_frequency,
                    first_peak_amplitude: peaks.first_amplitude,
                    second_peak_frequency: peaks.second_frequency,
                    second_peak_amplitude: peaks.second_amplitude,
                    avg_five_highest_amplitude: peaks.avg_five_highest_amplitude,
                    raw_min: stats.min,
                    raw_max: stats.max,
                    raw_avg: stats.avg,
                    channel_gain: 1.0,
                    configured_sampling_flicker_freq: sampling_frequency,
                    exp_time_of_flicker_channel: -1.0,
                };

                {
                    let mut ring = shared.ring.lock().unwrap();
                    ring.publish(result);
                }
                shared.poll_cond.notify_all();

                capture.sample_stats_and_advance_index();

                if let Some(new_freq) = pending_frequency.take_if_set(sampling_frequency) {
                    if let Err(e) = reconfigure(&mut device, &mut capture, new_freq, speed_hz) {
                        log::error!("mid-run reconfigure to {} Hz failed: {}", new_freq, e);
                        break;
                    }
                    buffer.resize(capture.full_window_len(), 0);
                    transform = Transform::new(capture.full_window_len());
                    spectrum = vec![Complex32::zero(); capture.full_window_len()];
                }

                capture.restart_transfers();
                chunks_in_window = 0;
            }
        }
    }
    device
}

fn reconfigure<D: SampleSource>(
    device: &mut D,
    capture: &mut CaptureState,
    new_sampling_frequency: u32,
    speed_hz: u32,
) -> Result<(), crate::error::SensorError> {
    capture.reconfigure(new_sampling_frequency)?;
    let (speed_hz, samples_per_chunk, sample_width) = capture.device_params(speed_hz);
    device.set_params(speed_hz, samples_per_chunk, sample_width)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::mock::MockDevice;
    use std::sync::atomic::AtomicBool;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn nominal_tone_detection_publishes_result() {
        let mut device = MockDevice::new(120.0);
        let bus_info = device.open().unwrap();
        let sampling_frequency = 2048;
        device.set_sampling_frequency(sampling_frequency);
        let mut capture = CaptureState::new(sampling_frequency, bus_info.chunk_size).unwrap();
        let (speed_hz, spc, width) = capture.device_params(DEFAULT_BUS_FREQUENCY_HZ);
        device.set_params(speed_hz, spc, width).unwrap();

        let shared = Arc::new(SharedRing::new());
        let pending = Arc::new(PendingFrequency::new());
        let stop = Arc::new(AtomicBool::new(false));

        let shared_clone = Arc::clone(&shared);
        let stop_clone = Arc::clone(&stop);
        let handle = thread::spawn(move || run(device, bus_info, capture, shared_clone, pending, stop_clone));

        thread::sleep(Duration::from_millis(300));
        stop.store(true, Ordering::SeqCst);
        let _ = handle.join();

        let ring = shared.ring.lock().unwrap();
        assert!(ring.cursor().is_some());
    }
}
