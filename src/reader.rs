//! The polling thread: transport → decoder → performer.
//!
//! One dedicated thread owns the transport and the performer, so the note
//! sets need no locking. The owner only ever flips the stop flag and joins.

use anyhow::{Context, Result};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU8, Ordering},
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::midi;
use crate::performer::Performer;
use crate::synth::SynthEngine;
use crate::transport::{MAX_FRAME_BYTES, MidiTransport, Opcode, TransportError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    TransportFailed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped(StopReason),
}

const RUNNING: u8 = 0;
const STOPPED_REQUESTED: u8 = 1;
const STOPPED_FAILED: u8 = 2;

#[derive(Default)]
struct Shared {
    stop: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    fn state(&self) -> LoopState {
        match self.state.load(Ordering::Acquire) {
            RUNNING => LoopState::Running,
            STOPPED_FAILED => LoopState::Stopped(StopReason::TransportFailed),
            _ => LoopState::Stopped(StopReason::Requested),
        }
    }

    fn finish(&self, reason: StopReason) {
        let code = match reason {
            StopReason::Requested => STOPPED_REQUESTED,
            StopReason::TransportFailed => STOPPED_FAILED,
        };
        // Only the first transition out of Running sticks.
        self.state
            .compare_exchange(RUNNING, code, Ordering::AcqRel, Ordering::Acquire)
            .ok();
    }
}

/// Handle to a running polling thread. Dropping it stops and joins.
pub struct MidiReader {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl MidiReader {
    pub fn spawn<T, E>(transport: T, performer: Performer<E>, interval: Duration) -> Result<Self>
    where
        T: MidiTransport,
        E: SynthEngine,
    {
        let shared = Arc::new(Shared::default());
        let worker = PollLoop::new(transport, performer);

        let handle = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("midi-reader".into())
                .spawn(move || worker.run(&shared, interval))
                .context("spawn MIDI reader thread")?
        };

        Ok(Self {
            shared,
            handle: Some(handle),
        })
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == LoopState::Running
    }

    /// Ask the thread to exit and wait for it. Safe to call repeatedly.
    pub fn stop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("MIDI reader thread panicked");
            }
            self.shared.finish(StopReason::Requested);
        }
    }
}

impl Drop for MidiReader {
    fn drop(&mut self) {
        self.stop();
    }
}

// ─────────────────── loop body ───────────────────────────────────────────────

#[derive(Debug)]
enum Poll {
    Idle,
    Handled,
    Discarded,
    Failed(TransportError),
}

struct PollLoop<T, E> {
    transport: T,
    performer: Performer<E>,
    buf: [u8; MAX_FRAME_BYTES],
}

impl<T: MidiTransport, E: SynthEngine> PollLoop<T, E> {
    fn new(transport: T, performer: Performer<E>) -> Self {
        Self {
            transport,
            performer,
            buf: [0; MAX_FRAME_BYTES],
        }
    }

    fn run(mut self, shared: &Shared, interval: Duration) {
        let _guard = FinishOnPanic(shared);
        log::debug!("MIDI reader started");
        while !shared.stop.load(Ordering::Acquire) {
            match self.poll_once() {
                Poll::Idle => thread::sleep(interval),
                Poll::Handled | Poll::Discarded => {}
                Poll::Failed(e) => {
                    log::error!("MIDI reader stopped: {e}");
                    shared.finish(StopReason::TransportFailed);
                    return;
                }
            }
        }
        shared.finish(StopReason::Requested);
        log::debug!("MIDI reader stopped on request");
    }

    fn poll_once(&mut self) -> Poll {
        let frame = match self.transport.receive(&mut self.buf) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Poll::Idle,
            Err(e) => return Poll::Failed(e),
        };

        let bytes = &self.buf[..frame.len.min(MAX_FRAME_BYTES)];
        match bytes.first() {
            Some(&status) if frame.opcode == Opcode::Data && !midi::is_system_status(status) => {
                if let Some(msg) = midi::decode(bytes) {
                    self.performer.handle(msg);
                }
                Poll::Handled
            }
            _ => Poll::Discarded,
        }
    }
}

/// Publishes a stop if the loop unwinds, so a dead thread never reads as
/// `Running`.
struct FinishOnPanic<'a>(&'a Shared);

impl Drop for FinishOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("MIDI reader panicked");
            self.0.finish(StopReason::TransportFailed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::EventSink;
    use crate::synth::testing::{Call, Recorder};
    use crate::transport::Frame;
    use std::collections::VecDeque;
    use std::time::Instant;

    type Step = Result<(Opcode, Vec<u8>), ()>;

    /// Plays back a fixed list of receive results, then reports "nothing".
    struct Script(VecDeque<Step>);

    impl Script {
        fn new(steps: impl IntoIterator<Item = Step>) -> Self {
            Self(steps.into_iter().collect())
        }
    }

    impl MidiTransport for Script {
        fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Frame>, TransportError> {
            match self.0.pop_front() {
                None => Ok(None),
                Some(Err(())) => Err(TransportError::Disconnected),
                Some(Ok((opcode, bytes))) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(Some(Frame {
                        opcode,
                        len: bytes.len(),
                        timestamp: 0,
                    }))
                }
            }
        }
    }

    fn data(bytes: &[u8]) -> Step {
        Ok((Opcode::Data, bytes.to_vec()))
    }

    fn poll_loop(script: Script) -> (PollLoop<Script, Recorder>, Recorder) {
        let rec = Recorder::default();
        let (sink, _rx) = EventSink::bounded(16);
        (PollLoop::new(script, Performer::new(rec.clone(), sink)), rec)
    }

    fn wait_for_stop(reader: &MidiReader) -> LoopState {
        let deadline = Instant::now() + Duration::from_secs(5);
        while reader.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        reader.state()
    }

    #[test]
    fn system_short_and_flush_frames_never_reach_the_synth() {
        let (mut lp, rec) = poll_loop(Script::new([
            data(&[0xF8]),
            data(&[0xFE, 0, 0]),
            data(&[0x90, 60]),
            Ok((Opcode::Flush, vec![0x90, 60, 100])),
            data(&[]),
        ]));
        assert!(matches!(lp.poll_once(), Poll::Discarded));
        assert!(matches!(lp.poll_once(), Poll::Discarded));
        assert!(matches!(lp.poll_once(), Poll::Handled));
        assert!(matches!(lp.poll_once(), Poll::Discarded));
        assert!(matches!(lp.poll_once(), Poll::Discarded));
        assert!(matches!(lp.poll_once(), Poll::Idle));
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn data_frames_drive_the_performer() {
        let (mut lp, rec) = poll_loop(Script::new([data(&[0x91, 60, 100]), data(&[0x81, 60, 0])]));
        lp.poll_once();
        lp.poll_once();
        assert_eq!(rec.calls(), vec![Call::NoteOn(60, 100), Call::NoteOff(60)]);
    }

    /// Claims more bytes than the buffer it was handed holds.
    struct Overlong;

    impl MidiTransport for Overlong {
        fn receive(&mut self, buf: &mut [u8]) -> Result<Option<Frame>, TransportError> {
            buf[..3].copy_from_slice(&[0x90, 60, 100]);
            Ok(Some(Frame {
                opcode: Opcode::Data,
                len: 200,
                timestamp: 0,
            }))
        }
    }

    struct Exploding;

    impl MidiTransport for Exploding {
        fn receive(&mut self, _buf: &mut [u8]) -> Result<Option<Frame>, TransportError> {
            panic!("driver bug");
        }
    }

    #[test]
    fn overlong_frame_length_is_clamped() {
        let rec = Recorder::default();
        let (sink, _rx) = EventSink::bounded(16);
        let mut lp = PollLoop::new(Overlong, Performer::new(rec.clone(), sink));
        assert!(matches!(lp.poll_once(), Poll::Handled));
        assert_eq!(rec.calls(), vec![Call::NoteOn(60, 100)]);
    }

    #[test]
    fn overlong_transport_keeps_the_reader_alive() {
        let rec = Recorder::default();
        let (sink, _rx) = EventSink::bounded(16);
        let mut reader = MidiReader::spawn(
            Overlong,
            Performer::new(rec.clone(), sink),
            Duration::from_micros(100),
        )
        .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        while rec.calls().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(reader.is_running());
        reader.stop();
        assert_eq!(reader.state(), LoopState::Stopped(StopReason::Requested));
    }

    #[test]
    fn panicking_loop_reports_stopped() {
        let rec = Recorder::default();
        let (sink, _rx) = EventSink::bounded(16);
        let mut reader = MidiReader::spawn(
            Exploding,
            Performer::new(rec, sink),
            Duration::from_micros(100),
        )
        .unwrap();

        assert_eq!(
            wait_for_stop(&reader),
            LoopState::Stopped(StopReason::TransportFailed)
        );
        reader.stop();
        assert_eq!(
            reader.state(),
            LoopState::Stopped(StopReason::TransportFailed)
        );
    }

    #[test]
    fn transport_failure_is_terminal() {
        let rec = Recorder::default();
        let (sink, _rx) = EventSink::bounded(16);
        let script = Script::new([
            data(&[0x90, 60, 100]),
            Err(()),
            data(&[0x90, 61, 100]),
            data(&[0x80, 60, 0]),
        ]);
        let mut reader = MidiReader::spawn(
            script,
            Performer::new(rec.clone(), sink),
            Duration::from_micros(100),
        )
        .unwrap();

        assert_eq!(
            wait_for_stop(&reader),
            LoopState::Stopped(StopReason::TransportFailed)
        );
        reader.stop();
        assert_eq!(
            reader.state(),
            LoopState::Stopped(StopReason::TransportFailed)
        );
        assert_eq!(rec.calls(), vec![Call::NoteOn(60, 100)]);
    }

    #[test]
    fn stop_is_idempotent_and_joins() {
        let rec = Recorder::default();
        let (sink, _rx) = EventSink::bounded(16);
        let mut reader = MidiReader::spawn(
            Script::new([]),
            Performer::new(rec, sink),
            Duration::from_micros(100),
        )
        .unwrap();
        assert!(reader.is_running());

        reader.stop();
        assert_eq!(reader.state(), LoopState::Stopped(StopReason::Requested));
        reader.stop();
        assert_eq!(reader.state(), LoopState::Stopped(StopReason::Requested));
    }
}
