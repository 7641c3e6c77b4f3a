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
//! This binary opens the vd628x flicker sensor, starts a capture, and prints
//! detected spectral peaks to standard output until interrupted.
//!

#![warn(
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
    rust_2018_idioms,
    missing_docs
)]
#![warn(clippy::all)]
// Keep extern crates, like in 2015
#![allow(unused_extern_crates)]

extern crate clap;
#[macro_use]
extern crate log;
extern crate signal_hook;
extern crate simplelog;
extern crate vd628x_flicker;

use clap::{crate_authors, crate_description, crate_version, App, Arg};
use signal_hook::consts::{SIGHUP, SIGINT};
use signal_hook::flag::register;
use simplelog::{Config, LevelFilter, SimpleLogger, TermLogger, TerminalMode};

use vd628x_flicker::interface::ConfigureParameters;
use vd628x_flicker::get_spectral_sensor_interface;
use vd628x_flicker::FlickerResult;

use std::error::Error;
use std::process;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// How often the poll loop prints a status line even if `poll_sensor_data` times out,
/// matching the 500 ms cadence `test.cpp`'s `PollThreadRoutine` polls at.
const POLL_LOOP_SLEEP: Duration = Duration::from_millis(500);

fn run() -> Result<(), Box<dyn Error>> {
    let matches = App::new("vd628x_flicker_demo")
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .arg(
            Arg::with_name("sampling-frequency")
                .long("sampling-frequency")
                .value_name("HZ")
                .help("Requested sampling frequency (snapped up to {512, 1024, 2048, 4096})")
                .default_value("2048"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Enables debug logging"),
        )
        .get_matches();

    let log_level = if matches.is_present("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let log_status = TermLogger::init(log_level, Config::default(), TerminalMode::Stderr)
        .or_else(|_| SimpleLogger::init(log_level, Config::default()));
    if let Err(e) = log_status {
        eprintln!("Failed to set up logger: {}", e);
    }

    let requested_frequency: u32 = matches
        .value_of("sampling-frequency")
        .unwrap()
        .parse()
        .map_err(|_| "sampling-frequency must be an integer")?;

    // SIGINT or SIGHUP sets the stop flag to true, but does not interrupt a
    // poll_sensor_data call already in progress.
    let stop_flag = Arc::new(AtomicBool::new(false));
    register(SIGINT, Arc::clone(&stop_flag))?;
    register(SIGHUP, Arc::clone(&stop_flag))?;

    let sensor = get_spectral_sensor_interface();
    sensor.open_sensor()?;
    sensor.configure(ConfigureParameters::SamplingFrequency(requested_frequency))?;
    sensor.start_sensor()?;

    info!("capture started, press Ctrl-C to stop");

    let mut results = [FlickerResult::default(); 1];
    while !stop_flag.load(Ordering::SeqCst) {
        match sensor.poll_sensor_data(1, &mut results) {
            Ok(0) => thread::sleep(POLL_LOOP_SLEEP),
            Ok(_) => {
                let result = &results[0];
                println!(
                    "peak1={:.1}Hz@{:.1} peak2={:.1}Hz@{:.1} raw=[{},{}] avg={:.1}",
                    result.first_peak_frequency,
                    result.first_peak_amplitude,
                    result.second_peak_frequency,
                    result.second_peak_amplitude,
                    result.raw_min,
                    result.raw_max,
                    result.raw_avg,
                );
            }
            Err(e) => {
                error!("poll failed: {}", e);
                break;
            }
        }
    }

    sensor.stop_sensor()?;
    sensor.close_sensor()?;
    Ok(())
}

fn main() {
    match run() {
        Ok(()) => {}
        Err(e) => {
            eprintln!("{}", e);
            process::exit(-1);
        }
    }
}
