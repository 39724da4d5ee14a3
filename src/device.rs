//! evdev device layer.
//!
//! Opens every bound device, grabs it unless the binding is `[shared]`, and
//! runs one reader thread per device. Readers translate raw evdev events
//! into [`ButtonEvent`]s using the global button numbering (bindings in
//! config order, code specs in listed order, 1-based) and fan them into a
//! single channel in arrival order. The matcher consumes from the receiver;
//! when every reader has died (device unplugged, read error) the channel
//! closes and the run loop winds down.
//!
//! Requires access to `/dev/input`:
//! ```bash
//! sudo usermod -aG input $USER
//! # Then log out and back in
//! ```

use crate::config::{Config, DeviceBinding};
use crate::ecodes;
use crate::error::{Error, Result};
use crate::event::{Button, ButtonEvent};
use evdev::Device;
use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::io::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Handle to the running reader threads.
///
/// Stops the readers and ungrabs the devices when dropped.
pub struct DeviceSetHandle {
    running: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl DeviceSetHandle {
    /// Signal all readers to stop and wait for them to finish.
    pub fn stop(mut self) {
        self.stop_inner();
    }

    /// Are any readers still running?
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn stop_inner(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for DeviceSetHandle {
    fn drop(&mut self) {
        self.stop_inner();
    }
}

/// Per-device translation table from raw (type, code, value) to buttons.
struct CodeMap {
    /// Bare `EV_KEY` codes: press/release follow the event value.
    keys: HashMap<u16, Button>,
    /// `type/code=value` triples: an exact match fires a press/release pulse.
    pulses: HashMap<(u16, u16), Vec<(i32, Button)>>,
}

impl CodeMap {
    /// Build the table for one binding whose first code is global button
    /// `offset + 1`.
    fn build(binding: &DeviceBinding, offset: u32) -> Self {
        let mut keys = HashMap::new();
        let mut pulses: HashMap<(u16, u16), Vec<(i32, Button)>> = HashMap::new();
        for (i, spec) in binding.codes.iter().enumerate() {
            let button = offset + i as u32 + 1;
            match spec.value {
                None => {
                    keys.insert(spec.code, button);
                }
                Some(value) => {
                    pulses
                        .entry((spec.event_type, spec.code))
                        .or_default()
                        .push((value, button));
                }
            }
        }
        Self { keys, pulses }
    }

    /// Translate one raw event. Returns the normalized events to emit, or
    /// `None` when the code is not in the binding at all.
    fn translate(&self, event_type: u16, code: u16, value: i32, t: Instant) -> Option<Vec<ButtonEvent>> {
        if event_type == ecodes::EV_SYN || event_type == ecodes::EV_MSC {
            return Some(Vec::new());
        }
        if event_type == ecodes::EV_KEY {
            if let Some(&button) = self.keys.get(&code) {
                return Some(match value {
                    1 => vec![ButtonEvent::down(button, t)],
                    0 => vec![ButtonEvent::up(button, t)],
                    // autorepeat
                    _ => Vec::new(),
                });
            }
        }
        if let Some(bindings) = self.pulses.get(&(event_type, code)) {
            let mut out = Vec::new();
            for &(wanted, button) in bindings {
                if wanted == value {
                    // No release of its own; synthesize the full cycle.
                    out.push(ButtonEvent::down(button, t));
                    out.push(ButtonEvent::up(button, t));
                }
            }
            return Some(out);
        }
        None
    }
}

/// Open and grab all configured devices, spawn their readers, and return a
/// control handle plus the fan-in event receiver.
pub fn open_all(config: &Config) -> Result<(DeviceSetHandle, Receiver<ButtonEvent>)> {
    let (tx, rx) = mpsc::channel();
    let running = Arc::new(AtomicBool::new(true));
    let mut threads = Vec::new();
    let mut offset: u32 = 0;

    for binding in &config.devices {
        let map = CodeMap::build(binding, offset);
        offset += binding.codes.len() as u32;

        let mut device = Device::open(&binding.path).map_err(|e| Error::Device {
            path: binding.path.clone(),
            source: e,
        })?;
        if binding.shared {
            log::info!("opened {} (shared)", binding.path);
        } else if let Err(e) = device.grab() {
            log::warn!("failed to grab {}: {e}", binding.path);
        } else {
            log::info!("opened and grabbed {}", binding.path);
        }

        let tx = tx.clone();
        let running = running.clone();
        let path = binding.path.clone();
        threads.push(thread::spawn(move || read_loop(device, map, tx, running, path)));
    }

    Ok((DeviceSetHandle { running, threads }, rx))
}

/// Read events from one device until stopped or the device is lost.
fn read_loop(
    mut device: Device,
    map: CodeMap,
    tx: Sender<ButtonEvent>,
    running: Arc<AtomicBool>,
    path: String,
) {
    let fd = device.as_raw_fd();
    let mut warned: HashSet<(u16, u16)> = HashSet::new();

    while running.load(Ordering::SeqCst) {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        let ret = unsafe { libc::poll(&mut pfd, 1, 100) };
        if ret < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            log::error!("poll error on {path}: {err}");
            break;
        }
        if ret == 0 {
            // Timeout, check stop flag
            continue;
        }
        if pfd.revents & (libc::POLLERR | libc::POLLHUP) != 0 {
            log::error!("device {path} lost");
            break;
        }

        let events: Vec<_> = match device.fetch_events() {
            Ok(events) => events.collect(),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => continue,
            Err(e) => {
                log::error!("read error on {path}: {e}");
                break;
            }
        };
        let t = Instant::now();
        for ev in events {
            let (event_type, code, value) = (ev.event_type().0, ev.code(), ev.value());
            match map.translate(event_type, code, value, t) {
                Some(out) => {
                    for button_event in out {
                        if tx.send(button_event).is_err() {
                            // Receiver gone, nothing left to feed.
                            let _ = device.ungrab();
                            return;
                        }
                    }
                }
                None => {
                    if warned.insert((event_type, code)) {
                        log::warn!("{path}: ignoring unbound event type {event_type} code {code}");
                    }
                }
            }
        }
    }

    let _ = device.ungrab();
}
