//! Decodes raw channel-voice frames into `MidiMessage`s.
//!
//! The decoder is channel-agnostic: only the command nibble of the status
//! byte is looked at, the channel nibble is thrown away.

use std::fmt;

// ─────────────────── status / controller numbers ────────────────────────────

pub const NOTE_OFF: u8 = 0x8;
pub const NOTE_ON: u8 = 0x9;
pub const KEY_PRESSURE: u8 = 0xA;
pub const CONTROL_CHANGE: u8 = 0xB;
pub const PROGRAM_CHANGE: u8 = 0xC;
pub const CHANNEL_PRESSURE: u8 = 0xD;
pub const PITCH_BEND: u8 = 0xE;

/// Upper nibble of every System Common / Real-Time status byte.
pub const SYSTEM_STATUS: u8 = 0xF0;

pub const CC_SUSTAIN: u8 = 64;
/// Sustain values at or above this are "pedal down".
pub const SUSTAIN_THRESHOLD: u8 = 64;
/// Effects 1 depth, used as reverb send.
pub const CC_REVERB: u8 = 91;

/// One decoded channel-voice frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MidiMessage {
    NoteOff { note: u8 },
    NoteOn { note: u8, velocity: u8 },
    Control { controller: u8, value: u8 },
    KeyPressure { note: u8, value: u8 },
    ProgramChange { note: u8, value: u8 },
    ChannelPressure { note: u8, value: u8 },
    PitchBend { note: u8, value: u8 },
    Unparsed { note: u8, value: u8, status: u8 },
}

/// True for status bytes that are not channel-voice data (0xF0..=0xFF).
pub fn is_system_status(status: u8) -> bool {
    status & SYSTEM_STATUS == SYSTEM_STATUS
}

/// Decode the first three bytes of `msg`. Shorter frames yield `None`.
pub fn decode(msg: &[u8]) -> Option<MidiMessage> {
    let &[status, note, value, ..] = msg else {
        return None;
    };

    let msg = match (status & 0xF0) >> 4 {
        NOTE_OFF => MidiMessage::NoteOff { note },
        NOTE_ON => MidiMessage::NoteOn {
            note,
            velocity: value,
        },
        KEY_PRESSURE => MidiMessage::KeyPressure { note, value },
        CONTROL_CHANGE => MidiMessage::Control {
            controller: note,
            value,
        },
        PROGRAM_CHANGE => MidiMessage::ProgramChange { note, value },
        CHANNEL_PRESSURE => MidiMessage::ChannelPressure { note, value },
        PITCH_BEND => MidiMessage::PitchBend { note, value },
        _ => MidiMessage::Unparsed {
            note,
            value,
            status,
        },
    };
    Some(msg)
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Self::NoteOff { note } => write!(f, "Note OFF: {note}"),
            Self::NoteOn { note, velocity } => write!(f, "Note ON: {note} vel: {velocity}"),
            Self::Control { controller, value } => {
                write!(f, "Control: controller: {controller} value: {value}")
            }
            Self::KeyPressure { note, value } => write!(f, "Key Press: {note} vel: {value}"),
            Self::ProgramChange { note, value } => {
                write!(f, "Program Change: {note} vel: {value}")
            }
            Self::ChannelPressure { note, value } => {
                write!(f, "Channel Press: {note} vel: {value}")
            }
            Self::PitchBend { note, value } => write!(f, "Pitch Wheel: {note} vel: {value}"),
            Self::Unparsed {
                note,
                value,
                status,
            } => write!(f, "Unparsed: {note} vel: {value} status: {status}"),
        }
    }
}
