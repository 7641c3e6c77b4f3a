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

//! End-to-end tests of session lifecycle, sampling-frequency configuration, and
//! flicker detection, all driven against `MockDevice` in place of real hardware.

extern crate vd628x_flicker;

use std::time::{Duration, Instant};

use vd628x_flicker::device::mock::MockDevice;
use vd628x_flicker::error::SensorError;
use vd628x_flicker::result::FlickerResult;
use vd628x_flicker::session::Session;

fn poll_until<F>(session: &Session, timeout: Duration, mut accept: F) -> Option<FlickerResult>
where
    F: FnMut(&FlickerResult) -> bool,
{
    let deadline = Instant::now() + timeout;
    let mut out = [FlickerResult::default(); 1];
    while Instant::now() < deadline {
        if session.poll(1, &mut out) > 0 && accept(&out[0]) {
            return Some(out[0]);
        }
    }
    None
}

#[test]
fn open_then_close_without_starting_succeeds() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();
    session.close().unwrap();
}

#[test]
fn open_rejects_absent_device() {
    let result = Session::open(MockDevice::absent());
    assert!(matches!(result, Err(SensorError::DeviceAbsent)));
}

#[test]
fn configure_snaps_to_table_and_rejects_out_of_range() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();

    assert_eq!(session.configure(600).unwrap(), 1024);
    assert_eq!(session.configure(512).unwrap(), 512);
    assert_eq!(session.configure(4096).unwrap(), 4096);
    assert!(session.configure(511).is_err());
    assert!(session.configure(4097).is_err());

    session.close().unwrap();
}

#[test]
fn configure_is_idempotent() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();
    assert_eq!(session.configure(2048).unwrap(), 2048);
    assert_eq!(session.configure(2048).unwrap(), 2048);
    session.close().unwrap();
}

#[test]
fn stop_before_start_is_rejected() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();
    assert!(matches!(
        session.stop_sensor(),
        Err(SensorError::SessionState(_))
    ));
    session.close().unwrap();
}

#[test]
fn starting_twice_is_rejected() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();
    session.start_sensor().unwrap();
    // Give the command worker a moment to move the lifecycle state to Started.
    std::thread::sleep(Duration::from_millis(50));
    assert!(matches!(
        session.start_sensor(),
        Err(SensorError::SessionState(_))
    ));
    session.stop_sensor().unwrap();
    session.close().unwrap();
}

#[test]
fn poll_before_start_returns_zero_after_timeout() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();
    let mut out = [FlickerResult::default(); 1];
    let start = Instant::now();
    let copied = session.poll(1, &mut out);
    assert_eq!(copied, 0);
    assert!(start.elapsed() >= Duration::from_millis(900));
    session.close().unwrap();
}

#[test]
fn close_before_stop_spins_then_succeeds() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();
    session.start_sensor().unwrap();
    // close() must itself wait for the lifecycle to reach Stopped; callers are not
    // required to stop before closing.
    session.stop_sensor().unwrap();
    session.close().unwrap();
}

#[test]
fn nominal_tone_detection() {
    let mut device = MockDevice::new(120.0);
    device.set_sampling_frequency(2048);
    let session = Session::open(device).unwrap();
    session.configure(2048).unwrap();
    session.start_sensor().unwrap();

    let result = poll_until(&session, Duration::from_secs(5), |_| true)
        .expect("expected at least one published result within 5 seconds");
    assert!((result.first_peak_frequency - 120.0).abs() <= 4.0);
    assert_eq!(result.configured_sampling_flicker_freq, 2048);

    session.stop_sensor().unwrap();
    session.close().unwrap();
}

#[test]
fn dynamic_reconfigure_mid_run_updates_reported_frequency() {
    let mut device = MockDevice::new(100.0);
    device.set_sampling_frequency(2048);
    let session = Session::open(device).unwrap();
    session.configure(2048).unwrap();
    session.start_sensor().unwrap();

    poll_until(&session, Duration::from_secs(5), |r| {
        r.configured_sampling_flicker_freq == 2048
    })
    .expect("expected a result at the initial sampling frequency");

    session.configure(4096).unwrap();

    let result = poll_until(&session, Duration::from_secs(5), |r| {
        r.configured_sampling_flicker_freq == 4096
    });
    assert!(
        result.is_some(),
        "expected the worker to pick up the new sampling frequency within 5 seconds"
    );

    session.stop_sensor().unwrap();
    session.close().unwrap();
}

#[test]
fn clean_shutdown_does_not_deadlock() {
    let session = Session::open(MockDevice::new(120.0)).unwrap();
    session.start_sensor().unwrap();
    std::thread::sleep(Duration::from_millis(200));
    session.stop_sensor().unwrap();
    session.close().unwrap();
}
