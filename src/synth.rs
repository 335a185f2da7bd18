//! The synthesis side of the pipeline, as seen from the MIDI reader.
//!
//! `SynthLink` turns calls into `oxisynth::MidiEvent`s on channel 0 and hands
//! them to the audio callback (see `audio.rs`), which owns the synth.

use oxisynth::MidiEvent;
use std::sync::mpsc::Sender;

/// Everything the performer may ask of a synthesizer. Calls never fail: an
/// engine that isn't there simply ignores them.
pub trait SynthEngine: Send + 'static {
    fn note_on(&mut self, note: u8, velocity: u8);
    fn note_off(&mut self, note: u8);
    fn control_change(&mut self, controller: u8, value: u8);
    /// Reverb depth, 0–127. Scaling is up to the engine.
    fn set_reverb(&mut self, level: u8);
}

const CHANNEL: u8 = 0;
/// oxisynth's default modulators route CC 91 to the reverb send.
const REVERB_SEND: u8 = 91;

#[derive(Clone)]
pub struct SynthLink {
    tx: Sender<MidiEvent>,
}

impl SynthLink {
    pub fn new(tx: Sender<MidiEvent>) -> Self {
        Self { tx }
    }

    pub fn select_program(&mut self, program: u8) {
        self.send(MidiEvent::ProgramChange {
            channel: CHANNEL,
            program_id: program,
        });
    }

    // A dropped audio stream means no engine: swallow the error.
    fn send(&self, ev: MidiEvent) {
        self.tx.send(ev).ok();
    }
}

impl SynthEngine for SynthLink {
    fn note_on(&mut self, note: u8, velocity: u8) {
        self.send(MidiEvent::NoteOn {
            channel: CHANNEL,
            key: note,
            vel: velocity,
        });
    }

    fn note_off(&mut self, note: u8) {
        self.send(MidiEvent::NoteOff {
            channel: CHANNEL,
            key: note,
        });
    }

    fn control_change(&mut self, controller: u8, value: u8) {
        self.send(MidiEvent::ControlChange {
            channel: CHANNEL,
            ctrl: controller,
            value,
        });
    }

    fn set_reverb(&mut self, level: u8) {
        self.control_change(REVERB_SEND, level);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::SynthEngine;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub enum Call {
        NoteOn(u8, u8),
        NoteOff(u8),
        Control(u8, u8),
        Reverb(u8),
    }

    /// Engine that records every call; clones share the same log.
    #[derive(Clone, Default)]
    pub struct Recorder {
        calls: Arc<Mutex<Vec<Call>>>,
    }

    impl Recorder {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn push(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    impl SynthEngine for Recorder {
        fn note_on(&mut self, note: u8, velocity: u8) {
            self.push(Call::NoteOn(note, velocity));
        }
        fn note_off(&mut self, note: u8) {
            self.push(Call::NoteOff(note));
        }
        fn control_change(&mut self, controller: u8, value: u8) {
            self.push(Call::Control(controller, value));
        }
        fn set_reverb(&mut self, level: u8) {
            self.push(Call::Reverb(level));
        }
    }
}
