//! Rescans MIDI inputs periodically, starting a reader for every matching
//! device, stopping it when the device disappears and restarting it when
//! its reader died on a transport error.
use anyhow::{Context, Result};
use midir::MidiInput;
use std::{
    collections::{HashMap, HashSet},
    thread,
    time::Duration,
};

use crate::config::Config;
use crate::manager::MidiManager;
use crate::reader::LoopState;
use crate::sink::EventSink;
use crate::synth::SynthEngine;

/// Background watcher that keeps one `MidiManager` per connected device.
pub struct MidiDeviceMonitor {
    _handle: thread::JoinHandle<()>, // keeps the monitor thread alive
}

impl MidiDeviceMonitor {
    pub fn start<E>(engine: E, sink: EventSink, cfg: &Config) -> Result<Self>
    where
        E: SynthEngine + Clone,
    {
        let filter = cfg.port_filter.clone();
        let poll = cfg.poll_interval;
        let scan = cfg.scan_interval;

        let handle = thread::Builder::new()
            .name("midi-monitor".into())
            .spawn(move || {
                // name -> manager so we can stop it when the device disappears
                let mut managers: HashMap<String, MidiManager<E>> = HashMap::new();

                loop {
                    // New MidiInput each pass so the port list is up-to-date
                    if let Ok(inp) = MidiInput::new("sustain-synth-scan") {
                        let mut present = HashSet::new();

                        for port in &inp.ports() {
                            let Ok(name) = inp.port_name(port) else {
                                continue;
                            };
                            if !matches_filter(&name, &filter) {
                                continue;
                            }
                            present.insert(name.clone());

                            let mgr = managers.entry(name.clone()).or_insert_with(|| {
                                MidiManager::new(engine.clone(), sink.clone(), poll)
                            });
                            if let Some(LoopState::Stopped(reason)) = mgr.state() {
                                log::warn!("🎹 {name} stopped ({reason:?}), reconnecting");
                            }
                            if !mgr.is_running() {
                                if let Err(e) = mgr.start_named(&name) {
                                    log::warn!("Failed to connect to {name}: {e:#}");
                                }
                            }
                        }

                        // Device vanished → stop its reader and close the port
                        managers.retain(|name, _| {
                            if present.contains(name) {
                                true
                            } else {
                                log::info!("🎹 Disconnected {name}");
                                false
                            }
                        });
                    }

                    thread::sleep(scan);
                }
            })
            .context("spawn MIDI monitor thread")?;

        Ok(Self { _handle: handle })
    }
}

/// Case-insensitive substring match; an empty filter accepts every port.
fn matches_filter(name: &str, filter: &str) -> bool {
    name.to_lowercase().contains(&filter.to_lowercase())
}
