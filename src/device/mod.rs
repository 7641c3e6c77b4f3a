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
//! Character-device channel to the vd628x's PDM sample stream
//!

pub mod ioctl;

use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::time::Duration;

use crate::error::SensorError;

/// Default path of the character device exposing the flicker channel
pub const DEFAULT_DEVICE_PATH: &str = "/dev/vd628x_spi";

/// Default SPI bus clock, matching `vd628x_platform.c`'s `DEFAULT_SPI_FREQUENCY`
pub const DEFAULT_BUS_FREQUENCY_HZ: u32 = 4 * 1024 * 1024;

/// Bus parameters reported by the device at open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusInfo {
    /// Size, in bytes, of one chunk delivered by a single `read_chunk` call
    pub chunk_size: u32,
    /// Maximum SPI bus frequency the device can run at
    pub max_bus_frequency_hz: u32,
}

/// Abstraction over the vd628x character device, so the capture pipeline can run
/// against a real device or a synthetic one in tests.
pub trait SampleSource: Send {
    /// Opens the device and reads its bus parameters.
    fn open(&mut self) -> Result<BusInfo, SensorError>;

    /// Pushes SPI transfer parameters computed from the active sampling frequency.
    fn set_params(
        &mut self,
        speed_hz: u32,
        samples_per_chunk: u16,
        sample_width_bytes: u16,
    ) -> Result<(), SensorError>;

    /// Reads one chunk of `samples_per_chunk` samples, writing them into
    /// `dest[offset_in_samples..]`. Blocks until the device delivers the chunk.
    fn read_chunk(
        &mut self,
        dest: &mut [i16],
        offset_in_samples: usize,
        samples_per_chunk: usize,
    ) -> Result<(), SensorError>;

    /// Closes the device.
    fn close(&mut self);
}

/// Clamps the default SPI clock to whatever the device reported as its maximum at
/// open.
pub fn clamp_speed_hz(max_bus_frequency_hz: u32) -> u32 {
    DEFAULT_BUS_FREQUENCY_HZ.min(max_bus_frequency_hz)
}

/// Computes the effective bus frequency from the span between the first and
/// last-but-one chunk of a window, clamped to `DEFAULT_BUS_FREQUENCY_HZ`: a real bus
/// never delivers faster than its configured clock, so any measurement above that
/// reflects measurement granularity (or, as with `mock::MockDevice`, a source with no
/// bus to pace it) rather than actual drift.
pub fn effective_bus_frequency(chunks: u64, chunk_size: u32, elapsed: Duration) -> f64 {
    let elapsed_ns = elapsed.as_nanos() as f64;
    if elapsed_ns <= 0.0 {
        return f64::from(DEFAULT_BUS_FREQUENCY_HZ);
    }
    let numerator = (chunks.saturating_sub(1)) as f64 * f64::from(chunk_size) * 8.0 * 1e9;
    (numerator / elapsed_ns).min(f64::from(DEFAULT_BUS_FREQUENCY_HZ))
}

/// Real character-device-backed sample source.
pub struct RealDevice {
    path: std::path::PathBuf,
    file: Option<File>,
}

impl RealDevice {
    /// Creates a device channel bound to `path`, not yet opened.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        RealDevice {
            path: path.as_ref().to_path_buf(),
            file: None,
        }
    }

    fn file(&self) -> Result<&File, SensorError> {
        self.file
            .as_ref()
            .ok_or(SensorError::SessionState("device not open"))
    }
}

impl Default for RealDevice {
    fn default() -> Self {
        RealDevice::new(DEFAULT_DEVICE_PATH)
    }
}

impl SampleSource for RealDevice {
    fn open(&mut self) -> Result<BusInfo, SensorError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::NotFound {
                    SensorError::DeviceAbsent
                } else {
                    SensorError::DeviceIo(e)
                }
            })?;

        let mut info = ioctl::SpiInfo::default();
        unsafe {
            ioctl::get_spi_info(file.as_raw_fd(), &mut info)?;
        }
        if info.chunk_size == 0 || info.spi_max_frequency == 0 {
            return Err(SensorError::DeviceAbsent);
        }
        let one_second_buffer_size = DEFAULT_BUS_FREQUENCY_HZ / 8;
        if one_second_buffer_size == 0 || one_second_buffer_size % info.chunk_size != 0 {
            return Err(SensorError::DeviceAbsent);
        }

        self.file = Some(file);
        Ok(BusInfo {
            chunk_size: info.chunk_size,
            max_bus_frequency_hz: info.spi_max_frequency,
        })
    }

    fn set_params(
        &mut self,
        speed_hz: u32,
        samples_per_chunk: u16,
        sample_width_bytes: u16,
    ) -> Result<(), SensorError> {
        let file = self.file()?;
        let params = ioctl::SpiParams {
            speed_hz,
            samples_nb_per_chunk: samples_per_chunk,
            pdm_data_sample_width_in_bytes: sample_width_bytes,
        };
        unsafe {
            ioctl::set_spi_params(file.as_raw_fd(), &params)?;
        }
        Ok(())
    }

    fn read_chunk(
        &mut self,
        dest: &mut [i16],
        offset_in_samples: usize,
        samples_per_chunk: usize,
    ) -> Result<(), SensorError> {
        let file = self.file()?;
        let end = offset_in_samples + samples_per_chunk;
        let slice = dest
            .get_mut(offset_in_samples..end)
            .ok_or(SensorError::ResourceExhaustion)?;
        unsafe {
            ioctl::get_chunk_samples(file.as_raw_fd(), slice.as_mut_ptr(), slice.len())?;
        }
        Ok(())
    }

    fn close(&mut self) {
        self.file = None;
    }
}

pub mod mock {
    //! Synthetic device used by unit and integration tests in place of real hardware.
    //!
    //! Not behind `#[cfg(test)]`: integration tests under `tests/` link this crate as
    //! an ordinary external dependency, built without `cfg(test)`, so a test-only item
    //! would be invisible to them.

    use super::*;
    use std::f64::consts::PI;

    /// Fabricates a pure-tone PDM-derived sample stream at a configurable frequency
    /// and amplitude, delivering it through the same `SampleSource` contract a real
    /// device would.
    pub struct MockDevice {
        tone_hz: f64,
        amplitude: f64,
        bus_info: BusInfo,
        sampling_frequency: u32,
        samples_per_chunk: usize,
        total_samples_emitted: u64,
        opened: bool,
        present: bool,
    }

    impl MockDevice {
        /// Creates a mock device that will emit a tone at `tone_hz` once opened.
        pub fn new(tone_hz: f64) -> Self {
            MockDevice {
                tone_hz,
                amplitude: 16000.0,
                bus_info: BusInfo {
                    chunk_size: 4096,
                    max_bus_frequency_hz: DEFAULT_BUS_FREQUENCY_HZ,
                },
                sampling_frequency: 2048,
                samples_per_chunk: 0,
                total_samples_emitted: 0,
                opened: false,
                present: true,
            }
        }

        /// Creates a mock device that reports `DeviceAbsent` on open.
        pub fn absent() -> Self {
            let mut d = MockDevice::new(0.0);
            d.present = false;
            d
        }

        /// Overrides the active sampling frequency the tone is generated against;
        /// real devices infer this from `set_params`, the mock is told directly
        /// since it has no bus to infer a rate from.
        pub fn set_sampling_frequency(&mut self, hz: u32) {
            self.sampling_frequency = hz;
        }
    }

    impl SampleSource for MockDevice {
        fn open(&mut self) -> Result<BusInfo, SensorError> {
            if !self.present {
                return Err(SensorError::DeviceAbsent);
            }
            self.opened = true;
            Ok(self.bus_info)
        }

        fn set_params(
            &mut self,
            _speed_hz: u32,
            samples_per_chunk: u16,
            _sample_width_bytes: u16,
        ) -> Result<(), SensorError> {
            if !self.opened {
                return Err(SensorError::SessionState("device not open"));
            }
            self.samples_per_chunk = samples_per_chunk as usize;
            Ok(())
        }

        fn read_chunk(
            &mut self,
            dest: &mut [i16],
            offset_in_samples: usize,
            samples_per_chunk: usize,
        ) -> Result<(), SensorError> {
            if !self.opened {
                return Err(SensorError::SessionState("device not open"));
            }
            let end = offset_in_samples + samples_per_chunk;
            let slice = dest
                .get_mut(offset_in_samples..end)
                .ok_or(SensorError::ResourceExhaustion)?;
            for (i, sample) in slice.iter_mut().enumerate() {
                let n = self.total_samples_emitted + i as u64;
                let t = n as f64 / f64::from(self.sampling_frequency);
                let value = self.amplitude * (2.0 * PI * self.tone_hz * t).sin();
                *sample = value as i16;
            }
            self.total_samples_emitted += slice.len() as u64;
            Ok(())
        }

        fn close(&mut self) {
            self.opened = false;
        }
    }
}
