//! Owns the OxiSynth instance and the CPAL output stream.
//!
//! `SynthLink`s feed this side through a channel; the audio callback drains
//! it before rendering every buffer, so MIDI lands with at most one buffer of
//! delay. Latency-tuned: small fixed buffer request, but the callback copes
//! with whatever length it is given.

use anyhow::{Context, Result, anyhow, bail};
use cpal::{
    BufferSize, FromSample, HostId, Sample, SampleFormat, SizedSample, Stream, StreamConfig,
    host_from_id,
    traits::{DeviceTrait, HostTrait, StreamTrait},
};
use oxisynth::{MidiEvent, SoundFont, Synth, SynthDescriptor};
use std::{
    fs::File,
    path::Path,
    sync::mpsc::{Receiver, channel},
};

use crate::config::Config;
use crate::synth::SynthLink;

/// We *request* 32 frames (≈0.67 ms @ 48 kHz) but must cope with anything.
const REQUESTED_FRAMES: u32 = 32;

pub struct AudioEngine {
    _stream: Stream,
}

impl AudioEngine {
    /// Start the output stream and return a link into it, with the
    /// configured program already selected.
    pub fn open(cfg: &Config) -> Result<(Self, SynthLink)> {
        let (tx, rx) = channel();
        let engine = Self::start(rx, &cfg.soundfont, cfg.gain)?;
        let mut link = SynthLink::new(tx);
        link.select_program(cfg.program);
        log::info!("🎛️ Program {} selected", cfg.program);
        Ok((engine, link))
    }

    pub fn start(rx: Receiver<MidiEvent>, font_path: &Path, gain: f32) -> Result<Self> {
        // Prefer JACK; fall back to default host.
        let host = host_from_id(HostId::Jack).unwrap_or_else(|_| cpal::default_host());
        let device = host
            .default_output_device()
            .context("no default output device")?;

        let def_cfg = device.default_output_config()?;
        let sample_format = def_cfg.sample_format();
        let mut stream_cfg: StreamConfig = def_cfg.into();
        stream_cfg.buffer_size = BufferSize::Fixed(REQUESTED_FRAMES);

        let synth = new_synth(stream_cfg.sample_rate.0 as f32, font_path, gain)?;
        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(&device, &stream_cfg, rx, synth)?,
            SampleFormat::I16 => Self::build_stream::<i16>(&device, &stream_cfg, rx, synth)?,
            SampleFormat::U16 => Self::build_stream::<u16>(&device, &stream_cfg, rx, synth)?,
            other => bail!("unsupported sample format {other:?}"),
        };

        stream.play()?;
        log::info!(
            "🔊 Audio running at {} Hz, {} channel(s)",
            stream_cfg.sample_rate.0,
            stream_cfg.channels
        );
        Ok(Self { _stream: stream })
    }

    /// One output callback for every sample type: drain pending MIDI, then
    /// render interleaved frames. Only the first two channels get signal.
    fn build_stream<T>(
        device: &cpal::Device,
        cfg: &StreamConfig,
        rx: Receiver<MidiEvent>,
        mut synth: Synth,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32>,
    {
        let channels = usize::from(cfg.channels);
        let on_error = |e| log::error!("audio stream error: {e}");

        let stream = device.build_output_stream(
            cfg,
            move |output: &mut [T], _| {
                while let Ok(ev) = rx.try_recv() {
                    synth.send_event(ev).ok();
                }
                for frame in output.chunks_mut(channels) {
                    let (l, r) = synth.read_next();
                    let mut samples = [l, r].into_iter();
                    for slot in frame.iter_mut() {
                        *slot = T::from_sample(samples.next().unwrap_or(0.0));
                    }
                }
            },
            on_error,
            None,
        )?;
        Ok(stream)
    }
}

// ───────────────────────────── helpers ─────────────────────────────────── //

fn new_synth(sample_rate: f32, font_path: &Path, gain: f32) -> Result<Synth> {
    let desc = SynthDescriptor {
        sample_rate,
        gain,
        ..Default::default()
    };
    let mut synth = Synth::new(desc).map_err(|e| anyhow!("synth init: {e:?}"))?;

    let mut file =
        File::open(font_path).with_context(|| format!("open sound-font {:?}", font_path))?;
    let font =
        SoundFont::load(&mut file).map_err(|_| anyhow!("load sound-font {:?}", font_path))?;
    synth.add_font(font, true);
    synth.set_sample_rate(sample_rate);
    log::info!("🖖 Loaded sound-font {:?}", font_path);
    Ok(synth)
}
