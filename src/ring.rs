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
//! Fixed-capacity cyclic buffer of recent flicker-detection results
//!

use crate::result::FlickerResult;

/// Capacity of the result ring.
pub const RING_CAPACITY: usize = 5;

/// Fixed-capacity-5 cyclic buffer of the most recent `FlickerResult`s.
///
/// Guarded externally by `ring_lock` (see `session.rs`); this type performs no
/// locking of its own.
pub struct ResultRing {
    slots: [Option<FlickerResult>; RING_CAPACITY],
    /// Index of the most recently written slot; `None` denotes an empty ring.
    cursor: Option<usize>,
}

impl ResultRing {
    /// Creates an empty ring.
    pub fn new() -> Self {
        ResultRing {
            slots: [None; RING_CAPACITY],
            cursor: None,
        }
    }

    /// Advances the cursor and writes `result` into the next slot, marking it valid.
    pub fn publish(&mut self, result: FlickerResult) {
        let next = match self.cursor {
            Some(c) => (c + 1) % RING_CAPACITY,
            None => 0,
        };
        self.slots[next] = Some(result);
        self.cursor = Some(next);
    }

    /// Copies up to `n` of the newest results (newest-first) into `out`, walking
    /// backward from the cursor until a non-valid slot is reached or `n` results have
    /// been copied. Returns the number copied.
    pub fn read_latest(&self, n: usize, out: &mut [FlickerResult]) -> usize {
        let n = n.min(RING_CAPACITY).min(out.len());
        let cursor = match self.cursor {
            Some(c) => c,
            None => return 0,
        };
        let mut copied = 0;
        let mut idx = cursor;
        while copied < n {
            match self.slots[idx] {
                Some(result) => {
                    out[copied] = result;
                    copied += 1;
                }
                None => break,
            }
            if idx == 0 {
                if copied >= RING_CAPACITY {
                    break;
                }
                idx = RING_CAPACITY - 1;
            } else {
                idx -= 1;
            }
            if copied >= RING_CAPACITY {
                break;
            }
        }
        copied
    }

    /// Current cursor value, or `None` if nothing has been published yet.
    pub fn cursor(&self) -> Option<usize> {
        self.cursor
    }
}

impl Default for ResultRing {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(freq: u32) -> FlickerResult {
        FlickerResult {
            channel: crate::result::FlickerChannel::ClearChannel1,
            first_peak_frequency: 0.0,
            first_peak_amplitude: 0.0,
            second_peak_frequency: 0.0,
            second_peak_amplitude: 0.0,
            avg_five_highest_amplitude: 0.0,
            raw_min: 0,
            raw_max: 0,
            raw_avg: 0.0,
            channel_gain: 1.0,
            configured_sampling_flicker_freq: freq,
            exp_time_of_flicker_channel: -1.0,
        }
    }

    #[test]
    fn empty_ring_reads_zero() {
        let ring = ResultRing::new();
        let mut out = [sample(0); 5];
        assert_eq!(ring.read_latest(5, &mut out), 0);
    }

    #[test]
    fn cursor_equals_k_minus_one_mod_capacity() {
        let mut ring = ResultRing::new();
        for k in 1..=12u32 {
            ring.publish(sample(k));
            assert_eq!(ring.cursor(), Some(((k - 1) % RING_CAPACITY as u32) as usize));
        }
    }

    #[test]
    fn read_latest_returns_newest_first() {
        let mut ring = ResultRing::new();
        for k in 1..=3 {
            ring.publish(sample(k));
        }
        let mut out = [sample(0); 5];
        let copied = ring.read_latest(5, &mut out);
        assert_eq!(copied, 3);
        assert_eq!(out[0].configured_sampling_flicker_freq, 3);
        assert_eq!(out[1].configured_sampling_flicker_freq, 2);
        assert_eq!(out[2].configured_sampling_flicker_freq, 1);
    }

    #[test]
    fn read_latest_wraps_after_capacity_writes() {
        let mut ring = ResultRing::new();
        for k in 1..=8u32 {
            ring.publish(sample(k));
        }
        let mut out = [sample(0); 5];
        let copied = ring.read_latest(5, &mut out);
        assert_eq!(copied, 5);
        assert_eq!(out[0].configured_sampling_flicker_freq, 8);
        assert_eq!(out[4].configured_sampling_flicker_freq, 4);
    }
}
