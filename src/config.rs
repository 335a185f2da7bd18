//! Runtime settings, all taken from the environment.

use anyhow::{Context, Result, bail};
use std::{path::PathBuf, str::FromStr, time::Duration};

const DEFAULT_SOUNDFONT: &str = "/usr/share/soundfonts/FluidR3_GM.sf2";
const DEFAULT_JACKD: &str = "jackd -P85 -dalsa -dhw:0 -r48000 -p64 -n2";

#[derive(Clone, Debug, PartialEq)]
pub struct Config {
    pub soundfont: PathBuf,
    /// GM program selected on channel 0 at start-up.
    pub program: u8,
    pub gain: f32,
    /// Case-insensitive substring a port name must contain to be attached.
    pub port_filter: String,
    pub poll_interval: Duration,
    pub scan_interval: Duration,
    pub event_queue: usize,
    pub jack_autostart: bool,
    /// Program and arguments used to launch a JACK server.
    pub jackd_command: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            soundfont: DEFAULT_SOUNDFONT.into(),
            program: 0,
            gain: 2.0,
            port_filter: "usb".into(),
            poll_interval: Duration::from_micros(500),
            scan_interval: Duration::from_secs(2),
            event_queue: 256,
            jack_autostart: false,
            jackd_command: words(DEFAULT_JACKD),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from any key → value lookup; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();

        if let Some(path) = lookup("SOUNDFONT") {
            cfg.soundfont = path.into();
        }
        if let Some(filter) = lookup("MIDI_PORT_FILTER") {
            cfg.port_filter = filter;
        }
        if let Some(program) = parse(&lookup, "SYNTH_PROGRAM")? {
            if program > 127 {
                bail!("SYNTH_PROGRAM must be 0-127, got {program}");
            }
            cfg.program = program;
        }
        if let Some(gain) = parse(&lookup, "SYNTH_GAIN")? {
            cfg.gain = gain;
        }
        if let Some(us) = parse(&lookup, "MIDI_POLL_US")? {
            cfg.poll_interval = Duration::from_micros(us);
        }
        if let Some(ms) = parse(&lookup, "MIDI_SCAN_MS")? {
            cfg.scan_interval = Duration::from_millis(ms);
        }
        if let Some(len) = parse(&lookup, "EVENT_QUEUE")? {
            if len == 0 {
                bail!("EVENT_QUEUE must be at least 1");
            }
            cfg.event_queue = len;
        }
        if let Some(flag) = lookup("JACK_AUTOSTART") {
            cfg.jack_autostart = matches!(flag.to_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(cmd) = lookup("JACKD_COMMAND") {
            cfg.jackd_command = words(&cmd);
        }

        Ok(cfg)
    }
}

fn words(s: &str) -> Vec<String> {
    s.split_whitespace().map(String::from).collect()
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .with_context(|| format!("invalid {key}: {raw:?}"))
        })
        .transpose()
}
