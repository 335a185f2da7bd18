//! Playing-note / sustain-pedal bookkeeping.
//!
//! A note sounds until its key is up *and* the pedal no longer holds it.
//! `playing` tracks keys that are down, `sustained` tracks notes latched by
//! the pedal. Releasing the pedal stops only latched notes whose key is up.

use std::collections::BTreeSet;

use crate::control::{self, ControlAction};
use crate::midi::MidiMessage;
use crate::sink::EventSink;
use crate::synth::SynthEngine;

pub struct Performer<E> {
    engine: E,
    sink: EventSink,
    sustain: bool,
    playing: BTreeSet<u8>,
    sustained: BTreeSet<u8>,
}

impl<E: SynthEngine> Performer<E> {
    pub fn new(engine: E, sink: EventSink) -> Self {
        Self {
            engine,
            sink,
            sustain: false,
            playing: BTreeSet::new(),
            sustained: BTreeSet::new(),
        }
    }

    pub fn sustain(&self) -> bool {
        self.sustain
    }

    pub fn playing(&self) -> &BTreeSet<u8> {
        &self.playing
    }

    pub fn sustained(&self) -> &BTreeSet<u8> {
        &self.sustained
    }

    pub fn handle(&mut self, msg: MidiMessage) {
        // Control changes are traced once, as the interpreted action.
        if !matches!(msg, MidiMessage::Control { .. }) {
            self.sink.emit(msg);
        }
        match msg {
            // Velocity 0 is the common shorthand for "key up".
            MidiMessage::NoteOn { note, velocity: 0 } | MidiMessage::NoteOff { note } => {
                self.note_off(note)
            }
            MidiMessage::NoteOn { note, velocity } => self.note_on(note, velocity),
            MidiMessage::Control { controller, value } => self.control(controller, value),
            // Traced only.
            MidiMessage::KeyPressure { .. }
            | MidiMessage::ProgramChange { .. }
            | MidiMessage::ChannelPressure { .. }
            | MidiMessage::PitchBend { .. }
            | MidiMessage::Unparsed { .. } => {}
        }
    }

    fn note_on(&mut self, note: u8, velocity: u8) {
        self.playing.insert(note);
        if self.sustain {
            self.sustained.insert(note);
        }
        self.engine.note_on(note, velocity);
    }

    fn note_off(&mut self, note: u8) {
        let was_playing = self.playing.remove(&note);
        if self.sustain {
            // Keep the latch invariant even for a note pressed before a
            // pedal-down we never saw.
            if was_playing {
                self.sustained.insert(note);
            }
        } else {
            self.engine.note_off(note);
            self.sustained.remove(&note);
        }
    }

    fn control(&mut self, controller: u8, value: u8) {
        let action = control::interpret(controller, value);
        self.sink.emit(action);
        match action {
            ControlAction::SustainDown { .. } => self.pedal_down(),
            ControlAction::SustainUp { .. } => self.pedal_up(),
            ControlAction::Reverb { level } => self.engine.set_reverb(level),
            ControlAction::Passthrough { controller, value } => {
                self.engine.control_change(controller, value)
            }
        }
    }

    fn pedal_down(&mut self) {
        self.sustain = true;
        self.sustained.extend(self.playing.iter().copied());
    }

    fn pedal_up(&mut self) {
        self.sustain = false;
        for note in std::mem::take(&mut self.sustained) {
            if !self.playing.contains(&note) {
                self.engine.note_off(note);
            }
        }
    }
}
