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
//! The public seven-operation interface, and the process-wide session registration
//! it is backed by
//!
//! Grounded on `vd628x_interface.h`'s `SpectralSensorInterface` vtable
//! (`QuerySensorInfo`, `OpenSensor`, `Configure`, `StartSensor`, `PollSensorData`,
//! `StopSensor`, `CloseSensor`) and `GetSpectralSensorInterface`'s role as the single
//! entry point. The process-wide singleton that vtable implies is an
//! `OnceLock<Mutex<Option<Arc<Session>>>>` registration slot here, rather than a raw
//! global pointer.

use std::sync::{Arc, Mutex, OnceLock};

use crate::device::RealDevice;
use crate::error::SensorError;
use crate::result::FlickerResult;
use crate::ring::RING_CAPACITY;
use crate::session::Session;

/// Maximum length of a name/vendor/version string, per `vd628x_interface.h`'s
/// `MaxStringSize`. Metadata-only; not enforced at runtime since this crate has no
/// FFI boundary crossing a fixed-size C buffer.
pub const MAX_STRING_SIZE: usize = 256;

/// Exposure/timing budget range reported as metadata. Not tracked or enforced by
/// this driver (see `FlickerResult::exp_time_of_flicker_channel`).
pub const EXPOSURE_TIME_RANGE_US: (u32, u32) = (8_000, 1_606_000);

/// A float range, mirroring `vd628x_interface.h`'s `RangeFloat`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeFloat {
    /// Lower bound of the range, inclusive.
    pub min: f32,
    /// Upper bound of the range, inclusive.
    pub max: f32,
}

/// A single named sensor attribute and its supported range.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    /// Attribute name, e.g. `"SamplingFrequency"`.
    pub name: String,
    /// Supported range of the attribute.
    pub range: RangeFloat,
}

/// The full set of attributes this driver reports.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorAttribute {
    /// The supported attributes and their ranges.
    pub attributes: Vec<Attribute>,
}

/// Static driver identification, mirroring `vd628x_interface.h`'s
/// `DriverInformation`.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverInformation {
    /// Driver name.
    pub name: String,
    /// Hardware vendor.
    pub vendor: String,
    /// Hardware version string.
    pub hardware_version: String,
    /// Driver version number.
    pub driver_version: u16,
}

/// The two metadata queries `QuerySensorInfo` can answer.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryInfo {
    /// Static driver identification.
    DriverInfo(DriverInformation),
    /// The supported attributes and their ranges.
    SensorAttributes(SensorAttribute),
}

/// The one configuration this driver implements. The original vtable's
/// `ConfigurationType` also carries `SamplingTime` and `QTimeStamp` (lux/CCT and
/// clock-sync concerns); those are Non-goals here and are not representable by this
/// type — passing an unsupported kind is simply not expressible, matching how a
/// Rust enum narrows the C union to what's actually implemented.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigureParameters {
    /// Requested sampling frequency, in Hz, snapped to the supported table.
    SamplingFrequency(u32),
}

fn driver_information() -> DriverInformation {
    DriverInformation {
        name: "vd628x flicker channel".to_string(),
        vendor: "STMicroelectronics".to_string(),
        hardware_version: "VD6283".to_string(),
        driver_version: 1,
    }
}

fn sensor_attributes() -> SensorAttribute {
    SensorAttribute {
        attributes: vec![
            Attribute {
                name: "SamplingFrequency".to_string(),
                range: RangeFloat {
                    min: crate::session::SAMPLING_FREQUENCIES[0] as f32,
                    max: *crate::session::SAMPLING_FREQUENCIES.last().unwrap() as f32,
                },
            },
            Attribute {
                name: "ExposureTime".to_string(),
                range: RangeFloat {
                    min: EXPOSURE_TIME_RANGE_US.0 as f32,
                    max: EXPOSURE_TIME_RANGE_US.1 as f32,
                },
            },
        ],
    }
}

/// Which metadata query `QuerySensorInfo` should answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPayloadType {
    /// Ask for static driver identification.
    DriverInfo,
    /// Ask for the supported attributes and their ranges.
    SensorAttributes,
}

fn registry() -> &'static Mutex<Option<Arc<Session>>> {
    static SESSION: OnceLock<Mutex<Option<Arc<Session>>>> = OnceLock::new();
    SESSION.get_or_init(|| Mutex::new(None))
}

/// Rust-idiomatic expression of `SpectralSensorInterface`: a handle whose methods are
/// the seven vtable operations, backed by the process-wide registration slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpectralSensorInterface;

impl SpectralSensorInterface {
    /// `QuerySensorInfo` — answers a metadata query. Does not require an open
    /// session; the metadata is static.
    pub fn query_sensor_info(&self, query: QueryPayloadType) -> QueryInfo {
        match query {
            QueryPayloadType::DriverInfo => QueryInfo::DriverInfo(driver_information()),
            QueryPayloadType::SensorAttributes => {
                QueryInfo::SensorAttributes(sensor_attributes())
            }
        }
    }

    /// `OpenSensor` — opens the character device and registers the new session.
    /// Fails with `SensorError::SessionState` if a session is already open, or
    /// `SensorError::DeviceAbsent` if the device cannot be found.
    pub fn open_sensor(&self) -> Result<(), SensorError> {
        let mut slot = registry().lock().unwrap();
        if slot.is_some() {
            return Err(SensorError::SessionState("session already open"));
        }
        let device = RealDevice::default();
        let session = Session::open(device)?;
        *slot = Some(Arc::new(session));
        Ok(())
    }

    /// `Configure` — applies a configuration parameter to the open session.
    pub fn configure(&self, params: ConfigureParameters) -> Result<(), SensorError> {
        let session = self.active_session()?;
        match params {
            ConfigureParameters::SamplingFrequency(hz) => session.configure(hz).map(|_| ()),
        }
    }

    /// `StartSensor` — starts the detect worker.
    pub fn start_sensor(&self) -> Result<(), SensorError> {
        self.active_session()?.start_sensor()
    }

    /// `PollSensorData` — blocks up to one second for a new result, then copies up to
    /// `num_samples` of the newest results (newest-first) into `out`. `num_samples`
    /// is clamped to the ring capacity by `Session::poll`/`ResultRing::read_latest`.
    pub fn poll_sensor_data(
        &self,
        num_samples: u8,
        out: &mut [FlickerResult],
    ) -> Result<usize, SensorError> {
        let session = self.active_session()?;
        let n = (num_samples as usize).min(RING_CAPACITY);
        Ok(session.poll(n, out))
    }

    /// `StopSensor` — stops the detect worker.
    pub fn stop_sensor(&self) -> Result<(), SensorError> {
        self.active_session()?.stop_sensor()
    }

    /// `CloseSensor` — spin-waits for the session to reach `Stopped`, joins the
    /// command worker, and clears the registration slot.
    pub fn close_sensor(&self) -> Result<(), SensorError> {
        let session = self.active_session()?;
        session.close()?;
        *registry().lock().unwrap() = None;
        Ok(())
    }

    fn active_session(&self) -> Result<Arc<Session>, SensorError> {
        registry()
            .lock()
            .unwrap()
            .clone()
            .ok_or(SensorError::SessionState("session not open"))
    }
}

/// `GetSpectralSensorInterface` — the entry point to this driver.
pub fn get_spectral_sensor_interface() -> SpectralSensorInterface {
    SpectralSensorInterface
}
