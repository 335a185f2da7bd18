//! Where raw MIDI frames come from.
//!
//! The reader polls a `MidiTransport` without blocking. midir delivers
//! messages through a callback, so `MidiInputDevice` pushes them into a
//! channel and `ChannelTransport` is the polled end of it.
//!
//! midir has no unplug notification: the connection keeps the only sender
//! alive, so a midir-backed `ChannelTransport` reports `Disconnected` only
//! once its `MidiInputDevice` is dropped. Vanished devices are detected by
//! the port rescan in `monitor.rs`, which stops their reader.

use anyhow::{Context, Result, anyhow};
use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};
use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use thiserror::Error;

/// Largest frame handed to the reader; longer messages (SysEx) are cut.
pub const MAX_FRAME_BYTES: usize = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// MIDI bytes.
    Data,
    /// Device-state notification, carries no MIDI.
    Flush,
}

/// Header of one received frame; the bytes live in the caller's buffer.
/// `len` should not exceed that buffer; the reader clamps it if it does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub opcode: Opcode,
    pub len: usize,
    /// Microseconds, source-defined epoch.
    pub timestamp: u64,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("MIDI input disconnected")]
    Disconnected,
}

pub trait MidiTransport: Send + 'static {
    /// Non-blocking. `Ok(None)` when nothing is pending; an error is final.
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Frame>, TransportError>;
}

type Message = (u64, Vec<u8>);

pub struct ChannelTransport {
    rx: Receiver<Message>,
}

impl ChannelTransport {
    pub fn new(rx: Receiver<Message>) -> Self {
        Self { rx }
    }

    /// Connected pair, for feeding frames by hand.
    pub fn pair() -> (Sender<Message>, Self) {
        let (tx, rx) = channel();
        (tx, Self::new(rx))
    }
}

impl MidiTransport for ChannelTransport {
    fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Frame>, TransportError> {
        match self.rx.try_recv() {
            Ok((timestamp, msg)) => {
                let len = msg.len().min(buf.len());
                buf[..len].copy_from_slice(&msg[..len]);
                Ok(Some(Frame {
                    opcode: Opcode::Data,
                    len,
                    timestamp,
                }))
            }
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}

/// An open midir input port. Dropping it closes the connection, which the
/// paired `ChannelTransport` then reports as `Disconnected`.
pub struct MidiInputDevice {
    name: String,
    _conn: MidiInputConnection<()>, // RAII – stays alive
}

impl MidiInputDevice {
    /// Open input port `port_index` as listed by `MidiInput::ports()`.
    pub fn open(client_name: &str, port_index: usize) -> Result<(Self, ChannelTransport)> {
        let midi_in = new_input(client_name)?;
        let ports = midi_in.ports();
        let port = ports
            .get(port_index)
            .with_context(|| format!("no MIDI input port #{port_index}"))?;
        let name = midi_in.port_name(port)?;
        Self::connect(midi_in, port, name, client_name)
    }

    /// Open the input port called `port_name`. Lookup and connection use the
    /// same port enumeration, so a device plugged in meanwhile can't shift it.
    pub fn open_named(client_name: &str, port_name: &str) -> Result<(Self, ChannelTransport)> {
        let midi_in = new_input(client_name)?;
        let ports = midi_in.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|p| midi_in.port_name(p).unwrap_or_default())
            .collect();
        let index = find_port(&names, port_name)
            .with_context(|| format!("no MIDI input port named {port_name:?}"))?;
        Self::connect(midi_in, &ports[index], port_name.to_string(), client_name)
    }

    fn connect(
        midi_in: MidiInput,
        port: &MidiInputPort,
        name: String,
        client_name: &str,
    ) -> Result<(Self, ChannelTransport)> {
        let (tx, transport) = ChannelTransport::pair();
        let conn = midi_in
            .connect(
                port,
                client_name,
                move |stamp, msg, _| {
                    tx.send((stamp, msg.to_vec())).ok();
                },
                (),
            )
            .map_err(|e| anyhow!("connect {name}: {e}"))?;

        log::info!("🎹 Connected to {name}");
        Ok((Self { name, _conn: conn }, transport))
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

fn new_input(client_name: &str) -> Result<MidiInput> {
    let mut midi_in = MidiInput::new(client_name)?;
    midi_in.ignore(Ignore::None);
    Ok(midi_in)
}

fn find_port(names: &[String], wanted: &str) -> Option<usize> {
    names.iter().position(|n| n == wanted)
}

impl Drop for MidiInputDevice {
    fn drop(&mut self) {
        log::info!("🎹 Closed {}", self.name);
    }
}
