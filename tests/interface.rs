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

//! Tests of the `SpectralSensorInterface` facade against the process-wide session
//! registry. These run against the real character device path, which is expected to
//! be absent in a test environment, so they only exercise the "no session open" /
//! "device absent" edges of the facade; `tests/session.rs` covers the capture
//! pipeline itself through `Session` directly with `MockDevice`.
//!
//! Kept in a single test function: the registry is one process-wide slot, so
//! interleaving these checks with other tests in this binary would be racy.

extern crate vd628x_flicker;

use vd628x_flicker::error::SensorError;
use vd628x_flicker::get_spectral_sensor_interface;
use vd628x_flicker::interface::{ConfigureParameters, QueryPayloadType};

#[test]
fn facade_rejects_operations_without_an_open_session() {
    let sensor = get_spectral_sensor_interface();

    assert!(matches!(
        sensor.configure(ConfigureParameters::SamplingFrequency(2048)),
        Err(SensorError::SessionState(_))
    ));
    assert!(matches!(
        sensor.start_sensor(),
        Err(SensorError::SessionState(_))
    ));
    assert!(matches!(
        sensor.stop_sensor(),
        Err(SensorError::SessionState(_))
    ));
    assert!(matches!(
        sensor.close_sensor(),
        Err(SensorError::SessionState(_))
    ));
    let mut out = [vd628x_flicker::FlickerResult::default(); 1];
    assert!(matches!(
        sensor.poll_sensor_data(1, &mut out),
        Err(SensorError::SessionState(_))
    ));

    // Metadata queries don't require an open session.
    let _ = sensor.query_sensor_info(QueryPayloadType::DriverInfo);
    let _ = sensor.query_sensor_info(QueryPayloadType::SensorAttributes);

    // No real device is present in the test environment.
    assert!(matches!(
        sensor.open_sensor(),
        Err(SensorError::DeviceAbsent)
    ));
}
