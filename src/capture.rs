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
//! Sampling-frequency-dependent sizing for the progressive capture window
//!

use crate::device::DEFAULT_BUS_FREQUENCY_HZ;
use crate::error::SensorError;

/// One-second buffer size, `default_bus_frequency_hz / 8`
pub const ONE_SECOND_BUFFER_SIZE: u32 = DEFAULT_BUS_FREQUENCY_HZ / 8;

/// Outcome of advancing one chunk within the current window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowStatus {
    /// More chunks are needed before the window is complete
    InProgress,
    /// The window at the current progressive index is complete
    WindowReady,
    /// `try_advance_chunk` was called on an already-full window; treated as fatal,
    /// does not occur by construction.
    Overrun,
}

/// Sizing and progress state for the three-stage progressive capture window.
///
/// Mutated only while the caller holds `capture_lock` (see `session.rs`); this type
/// itself performs no locking.
#[derive(Debug, Clone)]
pub struct CaptureState {
    sampling_frequency: u32,
    chunk_size: u32,
    /// Chunks delivered per second at the active sampling frequency
    chunks_per_second: u32,
    /// Bytes of PDM data per sample at the active sampling frequency
    pdm_sample_width: u32,
    /// Samples per device read
    samples_per_chunk: u32,
    /// [¼·N, ½·N, N] where N = samples_per_second
    samples_number: [usize; 3],
    /// [¼·C, ½·C, C] where C = chunks_per_second
    max_chunks: [u32; 3],
    /// Progressive window index, 0..=2, saturating at 2
    index: usize,
    /// Chunks delivered since the last `restart_transfers`
    chunks_done: u32,
}

impl CaptureState {
    /// Builds a capture state for `sampling_frequency`, validating the one-second
    /// buffer divides evenly by the derived PDM sample width.
    pub fn new(sampling_frequency: u32, chunk_size: u32) -> Result<Self, SensorError> {
        let mut state = CaptureState {
            sampling_frequency: 0,
            chunk_size,
            chunks_per_second: 0,
            pdm_sample_width: 0,
            samples_per_chunk: 0,
            samples_number: [0; 3],
            max_chunks: [0; 3],
            index: 0,
            chunks_done: 0,
        };
        state.reconfigure(sampling_frequency)?;
        Ok(state)
    }

    /// Recomputes sizing for a new sampling frequency. Does not push the new
    /// parameters to the device; the caller (`session.rs`) does that with the
    /// returned `(speed_hz, samples_per_chunk, pdm_sample_width)` triple.
    pub fn reconfigure(&mut self, sampling_frequency: u32) -> Result<(), SensorError> {
        if sampling_frequency == 0 {
            return Err(SensorError::ConfigOutOfRange);
        }
        if ONE_SECOND_BUFFER_SIZE % sampling_frequency != 0 {
            return Err(SensorError::ConfigOutOfRange);
        }
        let pdm_sample_width = ONE_SECOND_BUFFER_SIZE / sampling_frequency;
        let chunks_per_second = ONE_SECOND_BUFFER_SIZE / self.chunk_size;
        if chunks_per_second == 0 {
            return Err(SensorError::ConfigOutOfRange);
        }
        let samples_per_chunk = sampling_frequency / chunks_per_second;
        if samples_per_chunk == 0 || samples_per_chunk * chunks_per_second != sampling_frequency {
            return Err(SensorError::ConfigOutOfRange);
        }

        let n = sampling_frequency as usize;
        self.samples_number = [n / 4, n / 2, n];
        self.max_chunks = [
            chunks_per_second / 4,
            chunks_per_second / 2,
            chunks_per_second,
        ];
        self.sampling_frequency = sampling_frequency;
        self.pdm_sample_width = pdm_sample_width;
        self.chunks_per_second = chunks_per_second;
        self.samples_per_chunk = samples_per_chunk;
        self.index = 0;
        self.chunks_done = 0;
        Ok(())
    }

    /// Parameters to push to the device channel after a successful `reconfigure`.
    pub fn device_params(&self, speed_hz: u32) -> (u32, u16, u16) {
        (
            speed_hz,
            self.samples_per_chunk as u16,
            self.pdm_sample_width as u16,
        )
    }

    pub fn sampling_frequency(&self) -> u32 {
        self.sampling_frequency
    }

    pub fn samples_per_chunk(&self) -> usize {
        self.samples_per_chunk as usize
    }

    pub fn chunks_done(&self) -> u32 {
        self.chunks_done
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Size, in samples, of the currently-filling progressive window.
    pub fn current_window_len(&self) -> usize {
        self.samples_number[self.index]
    }

    /// Size, in samples, of the full (zero-padded) one-second window the FFT always
    /// runs on.
    pub fn full_window_len(&self) -> usize {
        self.samples_number[2]
    }

    /// Advances the chunk counter within the current progressive window.
    pub fn try_advance_chunk(&mut self) -> WindowStatus {
        let max = self.max_chunks[self.index];
        if self.chunks_done >= max {
            return WindowStatus::Overrun;
        }
        if self.chunks_done == max - 1 {
            WindowStatus::WindowReady
        } else {
            self.chunks_done += 1;
            WindowStatus::InProgress
        }
    }

    /// Advances the progressive index (saturating at 2) and returns the size of the
    /// full one-second window, which every FFT is run on regardless of `index`.
    pub fn sample_stats_and_advance_index(&mut self) -> usize {
        self.index = (self.index + 1).min(2);
        self.samples_number[2]
    }

    /// Resets the chunk counter for the next window. Called after FFT delivery.
    pub fn restart_transfers(&mut self) {
        self.chunks_done = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reconfigure_sizes_progressive_windows() {
        let state = CaptureState::new(2048, 4096).unwrap();
        assert_eq!(state.samples_number, [512, 1024, 2048]);
        assert_eq!(state.full_window_len(), 2048);
    }

    #[test]
    fn samples_per_chunk_times_chunks_per_second_equals_sampling_frequency() {
        for freq in [512u32, 1024, 2048, 4096] {
            let state = CaptureState::new(freq, 4096).unwrap();
            assert_eq!(
                state.samples_per_chunk * state.chunks_per_second,
                state.sampling_frequency
            );
        }
    }

    #[test]
    fn advance_chunk_reports_window_ready_at_boundary() {
        let mut state = CaptureState::new(4096, 4096).unwrap();
        let max = state.max_chunks[0];
        for _ in 0..max - 1 {
            assert_eq!(state.try_advance_chunk(), WindowStatus::InProgress);
        }
        assert_eq!(state.try_advance_chunk(), WindowStatus::WindowReady);
    }

    #[test]
    fn index_saturates_at_two() {
        let mut state = CaptureState::new(2048, 4096).unwrap();
        assert_eq!(state.sample_stats_and_advance_index(), state.samples_number[2]);
        assert_eq!(state.index, 1);
        state.sample_stats_and_advance_index();
        assert_eq!(state.index, 2);
        state.sample_stats_and_advance_index();
        assert_eq!(state.index, 2);
    }

    #[test]
    fn rejects_frequency_that_does_not_divide_buffer() {
        assert!(CaptureState::new(600, 4096).is_err());
    }
}
