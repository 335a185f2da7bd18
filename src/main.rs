use anyhow::Result;
use env_logger::Env;
use std::{thread, time::Duration};

use sustain_synth::{
    audio::AudioEngine, config::Config, jack_boot, monitor::MidiDeviceMonitor, sink::EventSink,
};

const JACK_TIMEOUT: Duration = Duration::from_secs(10);

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cfg = Config::from_env()?;
    log::info!("🖖 Using sound-font {:?}", cfg.soundfont);

    if cfg.jack_autostart {
        jack_boot::ensure_running(&cfg.jackd_command, JACK_TIMEOUT)?;
    }

    // pipeline: MIDI → performer → synth, traces → log
    let (_audio, synth) = AudioEngine::open(&cfg)?;
    let (sink, traces) = EventSink::bounded(cfg.event_queue);
    thread::Builder::new()
        .name("midi-trace".into())
        .spawn(move || {
            for line in traces {
                log::info!("{line}");
            }
        })?;

    let _mon = MidiDeviceMonitor::start(synth, sink, &cfg)?;

    thread::park();
    Ok(())
}
