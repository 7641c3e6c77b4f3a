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
//! Session lifecycle: Open/Start/Stop/Close, the command worker, and polling
//!

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};

use crate::capture::CaptureState;
use crate::device::{clamp_speed_hz, BusInfo, SampleSource};
use crate::error::SensorError;
use crate::result::FlickerResult;
use crate::worker::{self, PendingFrequency, SharedRing};

/// Sampling frequencies the device supports, ascending, sorted for the snap-upward
/// search.
pub const SAMPLING_FREQUENCIES: [u32; 4] = [512, 1024, 2048, 4096];

/// Default sampling frequency a freshly-opened session starts at (2048 Hz).
pub const DEFAULT_SAMPLING_FREQUENCY: u32 = SAMPLING_FREQUENCIES[2];

/// How long `PollSensorData` and the command worker's wait each block before
/// re-checking their condition.
pub const WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// How long `CloseSensor` sleeps between checks that the session has reached
/// `Stopped`.
const CLOSE_SPIN_SLEEP: Duration = Duration::from_micros(100);

/// Snaps `requested` upward to the least table entry `>= requested`, rejecting
/// values outside `[min, max]` of the table.
pub fn snap_sampling_frequency(requested: u32) -> Result<u32, SensorError> {
    let min = SAMPLING_FREQUENCIES[0];
    let max = *SAMPLING_FREQUENCIES.last().unwrap();
    if requested < min || requested > max {
        return Err(SensorError::ConfigOutOfRange);
    }
    SAMPLING_FREQUENCIES
        .iter()
        .copied()
        .find(|&f| f >= requested)
        .ok_or(SensorError::ConfigOutOfRange)
}

/// `Stopped`/`Started`. The "closed" state is represented by the absence of a
/// `Session` at all, not a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// No detect worker running.
    Stopped,
    /// Detect worker running and publishing results.
    Started,
}

struct ApiState {
    state: LifecycleState,
    sampling_frequency: u32,
}

enum Command {
    Start,
    Stop,
    Close,
}

/// A live sensor session. Created by `Session::open`, ending with `Session::close`.
///
/// Methods take `&self`: callers share a session through an `Arc` (see
/// `interface.rs`'s registry) so that a blocking `poll` does not hold up a
/// concurrent `configure`/`start_sensor`/`stop_sensor`/`close` call. The command
/// worker's join handle lives behind its own mutex for the same reason — `close`
/// does not need to consume or exclusively borrow the session.
pub struct Session {
    api: Arc<Mutex<ApiState>>,
    pending_frequency: Arc<PendingFrequency>,
    shared_ring: Arc<SharedRing>,
    command_tx: Sender<Command>,
    command_worker: Mutex<Option<JoinHandle<()>>>,
}

impl Session {
    /// Opens a session against `device`: probes bus parameters, spawns the command
    /// worker, and waits for it to be ready. Grounded on `vd628x_main.cpp::OpenSensor`
    /// (probe via open, `-2` on absence; allocate session; spawn main thread; wait for
    /// `mainThreadStarted`).
    pub fn open<D: SampleSource + 'static>(mut device: D) -> Result<Self, SensorError> {
        let bus_info = device.open()?;

        let api = Arc::new(Mutex::new(ApiState {
            state: LifecycleState::Stopped,
            sampling_frequency: DEFAULT_SAMPLING_FREQUENCY,
        }));
        let pending_frequency = Arc::new(PendingFrequency::new());
        let shared_ring = Arc::new(SharedRing::new());
        let (command_tx, command_rx) = bounded::<Command>(1);

        let worker_api = Arc::clone(&api);
        let worker_pending = Arc::clone(&pending_frequency);
        let worker_shared = Arc::clone(&shared_ring);
        let ready = Arc::new((Mutex::new(false), std::sync::Condvar::new()));
        let worker_ready = Arc::clone(&ready);

        let command_worker = thread::Builder::new()
            .name("vd628x-command".into())
            .spawn(move || {
                {
                    let (lock, cvar) = &*worker_ready;
                    let mut started = lock.lock().unwrap();
                    *started = true;
                    cvar.notify_all();
                }
                command_worker_loop(
                    device,
                    bus_info,
                    worker_api,
                    worker_shared,
                    worker_pending,
                    command_rx,
                );
            })
            .map_err(|_| SensorError::ResourceExhaustion)?;

        {
            let (lock, cvar) = &*ready;
            let mut started = lock.lock().unwrap();
            while !*started {
                started = cvar.wait(started).unwrap();
            }
        }

        Ok(Session {
            api,
            pending_frequency,
            shared_ring,
            command_tx,
            command_worker: Mutex::new(Some(command_worker)),
        })
    }

    /// Snaps `requested_hz` to the sampling-frequency table and applies it: latched
    /// for the next Start if `Stopped`, or pushed to the running detect worker for
    /// the next window boundary if `Started`.
    pub fn configure(&self, requested_hz: u32) -> Result<u32, SensorError> {
        let snapped = snap_sampling_frequency(requested_hz)?;
        let mut api = self.api.lock().unwrap();
        api.sampling_frequency = snapped;
        if api.state == LifecycleState::Started {
            self.pending_frequency.request(snapped);
        }
        Ok(snapped)
    }

    /// Posts a Start command. Fails immediately (without blocking) if the session is
    /// already `Started` or a command is already pending.
    pub fn start_sensor(&self) -> Result<(), SensorError> {
        {
            let api = self.api.lock().unwrap();
            if api.state != LifecycleState::Stopped {
                return Err(SensorError::SessionState("already started"));
            }
        }
        self.post(Command::Start)
    }

    /// Posts a Stop command. Fails immediately if the session is already `Stopped` or
    /// a command is already pending.
    pub fn stop_sensor(&self) -> Result<(), SensorError> {
        {
            let api = self.api.lock().unwrap();
            if api.state != LifecycleState::Started {
                return Err(SensorError::SessionState("already stopped"));
            }
        }
        self.post(Command::Stop)
    }

    fn post(&self, command: Command) -> Result<(), SensorError> {
        match self.command_tx.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SensorError::CommandBusy),
            Err(TrySendError::Disconnected(_)) => Err(SensorError::ResourceExhaustion),
        }
    }

    /// Blocks up to one second waiting for a new result, then copies up to `n` of the
    /// newest published results (newest-first) into `out`. Returns the number copied.
    /// Blocks regardless of lifecycle state, so a caller polling before Start does
    /// not spin.
    pub fn poll(&self, n: usize, out: &mut [FlickerResult]) -> usize {
        let ring = self.shared_ring.ring.lock().unwrap();
        let (ring, _timeout) = self
            .shared_ring
            .poll_cond
            .wait_timeout(ring, WAIT_TIMEOUT)
            .unwrap();
        ring.read_latest(n, out)
    }

    /// Spin-waits until the session reaches `Stopped`, then posts Close and joins the
    /// command worker.
    pub fn close(&self) -> Result<(), SensorError> {
        loop {
            let stopped = {
                let api = self.api.lock().unwrap();
                api.state == LifecycleState::Stopped
            };
            if stopped {
                break;
            }
            thread::sleep(CLOSE_SPIN_SLEEP);
        }

        self.post(Command::Close)?;

        if let Some(handle) = self.command_worker.lock().unwrap().take() {
            let _ = handle.join();
        }
        Ok(())
    }
}

/// The command worker: dedicated execution context running the Start/Stop/Close
/// handlers, waiting on a bounded(1) command channel with a one-second timeout
/// instead of a single-slot pending-command flag guarded by a condvar.
fn command_worker_loop<D: SampleSource + 'static>(
    device: D,
    bus_info: BusInfo,
    api: Arc<Mutex<ApiState>>,
    shared_ring: Arc<SharedRing>,
    pending_frequency: Arc<PendingFrequency>,
    command_rx: Receiver<Command>,
) {
    // `device` moves into the detect worker thread for the duration of a Start/Stop
    // cycle and comes back via `JoinHandle::join` when Stop is processed; `None` here
    // means "currently owned by the detect worker thread".
    let mut device = Some(device);
    let mut detect: Option<(JoinHandle<D>, Arc<AtomicBool>)> = None;

    loop {
        match command_rx.recv_timeout(WAIT_TIMEOUT) {
            Ok(Command::Start) => {
                if detect.is_some() {
                    continue;
                }
                let mut owned_device = match device.take() {
                    Some(d) => d,
                    None => continue,
                };
                let sampling_frequency = api.lock().unwrap().sampling_frequency;
                let capture = match CaptureState::new(sampling_frequency, bus_info.chunk_size) {
                    Ok(c) => c,
                    Err(e) => {
                        log::error!("failed to build capture state for Start: {}", e);
                        device = Some(owned_device);
                        continue;
                    }
                };
                let speed_hz = clamp_speed_hz(bus_info.max_bus_frequency_hz);
                let (speed_hz, samples_per_chunk, sample_width) = capture.device_params(speed_hz);
                if let Err(e) = owned_device.set_params(speed_hz, samples_per_chunk, sample_width) {
                    log::error!("failed to push capture parameters to device: {}", e);
                    device = Some(owned_device);
                    continue;
                }

                let stop = Arc::new(AtomicBool::new(false));
                let worker_shared = Arc::clone(&shared_ring);
                let worker_pending = Arc::clone(&pending_frequency);
                let worker_stop = Arc::clone(&stop);
                let handle = thread::Builder::new()
                    .name("vd628x-detect".into())
                    .spawn(move || {
                        worker::run(
                            owned_device,
                            bus_info,
                            capture,
                            worker_shared,
                            worker_pending,
                            worker_stop,
                        )
                    })
                    .expect("failed to spawn detect worker thread");
                detect = Some((handle, stop));
                api.lock().unwrap().state = LifecycleState::Started;
            }
            Ok(Command::Stop) => {
                if let Some((handle, stop)) = detect.take() {
                    stop.store(true, Ordering::SeqCst);
                    match handle.join() {
                        Ok(returned_device) => device = Some(returned_device),
                        Err(_) => log::error!("detect worker thread panicked"),
                    }
                    api.lock().unwrap().state = LifecycleState::Stopped;
                }
                // Already stopped: nothing to do. `Session::stop_sensor` rejects a
                // Stop while already Stopped before a command ever reaches here.
            }
            Ok(Command::Close) => {
                if let Some((handle, stop)) = detect.take() {
                    stop.store(true, Ordering::SeqCst);
                    if let Ok(returned_device) = handle.join() {
                        device = Some(returned_device);
                    }
                    api.lock().unwrap().state = LifecycleState::Stopped;
                }
                if let Some(mut d) = device.take() {
                    d.close();
                }
                return;
            }
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        }
    }
}
