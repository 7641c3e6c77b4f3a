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
//! Error types returned by session and device operations
//!

use std::error::Error;
use std::fmt;
use std::io;

/// Errors that can occur while operating a sensor session
#[derive(Debug)]
pub enum SensorError {
    /// The operation is not valid in the session's current lifecycle state
    SessionState(&'static str),
    /// A command is already pending on the command queue
    CommandBusy,
    /// The character device could not be opened
    DeviceAbsent,
    /// The character device returned an I/O error
    DeviceIo(io::Error),
    /// A requested configuration value is outside the supported range
    ConfigOutOfRange,
    /// A resource (thread, buffer) could not be allocated
    ResourceExhaustion,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::SessionState(msg) => write!(f, "invalid session state: {}", msg),
            SensorError::CommandBusy => write!(f, "a command is already pending"),
            SensorError::DeviceAbsent => write!(f, "sensor device is not present"),
            SensorError::DeviceIo(e) => write!(f, "sensor device I/O error: {}", e),
            SensorError::ConfigOutOfRange => write!(f, "requested configuration out of range"),
            SensorError::ResourceExhaustion => write!(f, "failed to allocate a required resource"),
        }
    }
}

impl Error for SensorError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SensorError::DeviceIo(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for SensorError {
    fn from(e: io::Error) -> Self {
        SensorError::DeviceIo(e)
    }
}

impl From<nix::Error> for SensorError {
    fn from(e: nix::Error) -> Self {
        SensorError::DeviceIo(nix_to_std(e))
    }
}

/// Converts a nix error into a std::io::Error, matching nix's own errno-carrying
/// variant where possible.
fn nix_to_std(err: nix::Error) -> io::Error {
    match err {
        nix::Error::Sys(errno) => io::Error::from(errno),
        nix::Error::InvalidPath => io::Error::new(io::ErrorKind::InvalidData, "invalid path"),
        nix::Error::InvalidUtf8 => io::Error::new(io::ErrorKind::InvalidData, "invalid UTF-8"),
        nix::Error::UnsupportedOperation => {
            io::Error::new(io::ErrorKind::Other, "unsupported operation")
        }
    }
}

/// Return code compatible with the vtable-style C interface: 0 on success, -1 on
/// generic failure, -2 specifically from OpenSensor when the device is absent.
pub fn to_return_code<T>(result: Result<T, SensorError>) -> i32 {
    match result {
        Ok(_) => 0,
        Err(SensorError::DeviceAbsent) => -2,
        Err(_) => -1,
    }
}
