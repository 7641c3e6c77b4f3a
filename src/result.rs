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
//! The flicker-detection result produced by one completed window
//!

/// The single live flicker channel. Kept for interface-shape parity with the
/// original multi-channel vtable; this driver only ever reports `ClearChannel1`
/// and does not implement channel routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlickerChannel {
    /// The sole flicker channel this driver reports.
    ClearChannel1,
}

/// One completed FFT window's worth of flicker-detection output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlickerResult {
    /// Which flicker channel this result is for.
    pub channel: FlickerChannel,
    /// Frequency of the strongest spectral peak, in Hz, bus-drift corrected.
    pub first_peak_frequency: f32,
    /// Magnitude of the strongest spectral peak.
    pub first_peak_amplitude: f32,
    /// Frequency of the second-strongest spectral peak, in Hz, bus-drift corrected.
    pub second_peak_frequency: f32,
    /// Magnitude of the second-strongest spectral peak.
    pub second_peak_amplitude: f32,
    /// Average magnitude of the five strongest bins.
    pub avg_five_highest_amplitude: f32,
    /// Minimum raw sample value in the window, before DC removal.
    pub raw_min: i16,
    /// Maximum raw sample value in the window, before DC removal.
    pub raw_max: i16,
    /// Average raw sample value in the window, before DC removal.
    pub raw_avg: f32,
    /// Channel gain; reserved, always 1.0 (no gain control in this driver).
    pub channel_gain: f32,
    /// Sampling frequency in effect when this window was produced.
    pub configured_sampling_flicker_freq: u32,
    /// Exposure time of the flicker channel. The original always reports -1.0 here;
    /// exposure time is not tracked by this driver. Kept for interface-shape parity.
    pub exp_time_of_flicker_channel: f32,
}

impl Default for FlickerResult {
    fn default() -> Self {
        FlickerResult {
            channel: FlickerChannel::ClearChannel1,
            first_peak_frequency: 0.0,
            first_peak_amplitude: 0.0,
            second_peak_frequency: 0.0,
            second_peak_amplitude: 0.0,
            avg_five_highest_amplitude: 0.0,
            raw_min: 0,
            raw_max: 0,
            raw_avg: 0.0,
            channel_gain: 1.0,
            configured_sampling_flicker_freq: 0,
            exp_time_of_flicker_channel: -1.0,
        }
    }
}
