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
//! Driver for the vd628x multi-spectral flicker sensor: reads PDM samples off its
//! character device, removes DC offset, runs progressive FFT windows over quarter/
//! half/full-second spans, extracts spectral peaks, corrects for SPI bus drift, and
//! publishes results to a bounded ring a caller drains through a blocking poll.
//!
//! [`interface::SpectralSensorInterface`] is the entry point most callers want; it
//! wraps a single process-wide [`session::Session`] behind the seven operations the
//! hardware abstraction layer expects (open/configure/start/poll/stop/close/query).
//!

#![deny(
    bad_style,
    const_err,
    dead_code,
    improper_ctypes,
    non_shorthand_field_patterns,
    no_mangle_generic_items,
    overflowing_literals,
    path_statements,
    patterns_in_fns_without_body,
    private_in_public,
    unconditional_recursion,
    unused,
    unused_allocation,
    unused_comparisons,
    unused_parens,
    while_true,
    missing_docs,
    trivial_casts,
    trivial_numeric_casts,
    unused_extern_crates,
    unused_import_braces,
    unused_qualifications,
    bad_style,
    future_incompatible,
    nonstandard_style,
    rust_2018_compatibility,
    rust_2018_idioms
)]
#![warn(clippy::all)]
#![warn(unused)]

extern crate num_complex;
extern crate num_traits;
#[macro_use]
extern crate log;
extern crate crossbeam_channel;
extern crate libc;
extern crate nix;
extern crate rustfft;

pub mod capture;
pub mod device;
pub mod error;
pub mod fft;
pub mod interface;
pub mod result;
pub mod ring;
pub mod session;
pub mod worker;

pub use crate::error::SensorError;
pub use crate::interface::{get_spectral_sensor_interface, SpectralSensorInterface};
pub use crate::result::FlickerResult;
