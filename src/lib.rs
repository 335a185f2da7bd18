//! Live MIDI keyboard → OxiSynth, with sustain-pedal note tracking.
//!
//! Frames are polled off a MIDI input on a dedicated thread, decoded
//! (`midi`), run through the note/pedal bookkeeping (`performer`) and turned
//! into synth calls (`synth`). Every decoded event is also traced to an
//! `EventSink`.

pub mod audio;
pub mod config;
pub mod control;
pub mod jack_boot;
pub mod manager;
pub mod midi;
pub mod monitor;
pub mod performer;
pub mod reader;
pub mod sink;
pub mod synth;
pub mod transport;
