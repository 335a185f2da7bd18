//! Owned start/stop surface around one MIDI reader.

use anyhow::Result;
use std::time::Duration;

use crate::performer::Performer;
use crate::reader::{LoopState, MidiReader};
use crate::sink::EventSink;
use crate::synth::SynthEngine;
use crate::transport::{MidiInputDevice, MidiTransport};

const CLIENT_NAME: &str = "sustain-synth";

/// Owns at most one reader (and the device it reads from).
///
/// `start` hands back the running reader if there is one; a reader that died
/// on a transport error is joined and replaced. Each start gets a fresh
/// performer, so note and pedal state never outlive a connection.
pub struct MidiManager<E> {
    engine: E,
    sink: EventSink,
    poll_interval: Duration,
    // Field order matters: the reader is joined before the device closes.
    reader: Option<MidiReader>,
    device: Option<MidiInputDevice>,
}

impl<E: SynthEngine + Clone> MidiManager<E> {
    pub fn new(engine: E, sink: EventSink, poll_interval: Duration) -> Self {
        Self {
            engine,
            sink,
            poll_interval,
            reader: None,
            device: None,
        }
    }

    /// Open input port `port_index` and start reading from it.
    pub fn start(&mut self, port_index: usize) -> Result<&MidiReader> {
        if self.is_running() {
            return self.current();
        }
        self.stop();
        let (device, transport) = MidiInputDevice::open(CLIENT_NAME, port_index)?;
        self.start_reader(transport)?;
        self.device = Some(device);
        self.current()
    }

    /// Open the input port called `port_name` and start reading from it.
    pub fn start_named(&mut self, port_name: &str) -> Result<&MidiReader> {
        if self.is_running() {
            return self.current();
        }
        self.stop();
        let (device, transport) = MidiInputDevice::open_named(CLIENT_NAME, port_name)?;
        self.start_reader(transport)?;
        self.device = Some(device);
        self.current()
    }

    /// Start reading from an arbitrary transport.
    pub fn start_with<T: MidiTransport>(&mut self, transport: T) -> Result<&MidiReader> {
        if !self.is_running() {
            self.start_reader(transport)?;
        }
        self.current()
    }

    /// Stop and join the reader, then close the device. No-op when idle.
    pub fn stop(&mut self) {
        if let Some(mut reader) = self.reader.take() {
            reader.stop();
        }
        self.device = None;
    }

    pub fn state(&self) -> Option<LoopState> {
        self.reader.as_ref().map(MidiReader::state)
    }

    pub fn is_running(&self) -> bool {
        self.state() == Some(LoopState::Running)
    }

    fn start_reader<T: MidiTransport>(&mut self, transport: T) -> Result<()> {
        self.stop();
        let performer = Performer::new(self.engine.clone(), self.sink.clone());
        self.reader = Some(MidiReader::spawn(transport, performer, self.poll_interval)?);
        Ok(())
    }

    fn current(&self) -> Result<&MidiReader> {
        self.reader
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("MIDI reader not started"))
    }
}
