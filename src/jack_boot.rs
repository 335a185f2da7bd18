//! Optional JACK bootstrap, so the audio stream can prefer the JACK host.
use anyhow::{Context, Result, anyhow, bail};
use jack::{Client, ClientOptions};
use std::{
    process::{Command, Stdio},
    thread::sleep,
    time::{Duration, Instant},
};

/// Open and drop a probe client without starting a server.
fn server_answers() -> bool {
    Client::new("sustain-synth-probe", ClientOptions::NO_START_SERVER).is_ok()
}

fn spawn_server(command: &[String]) -> Result<()> {
    let Some((program, args)) = command.split_first() else {
        bail!("empty JACK server command");
    };
    log::info!("Starting JACK server: {}", command.join(" "));

    // jackd is chatty on start-up.
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("failed to spawn {program}"))?;
    Ok(())
}

/// Make sure a JACK server answers, launching `command` if none does and
/// waiting up to `timeout` for it to come up.
pub fn ensure_running(command: &[String], timeout: Duration) -> Result<()> {
    if server_answers() {
        log::info!("JACK server is already running.");
        return Ok(());
    }

    spawn_server(command)?;
    let start = Instant::now();
    while !server_answers() {
        if start.elapsed() > timeout {
            return Err(anyhow!("JACK did not start within {timeout:?}"));
        }
        log::debug!("Waiting for JACK server...");
        sleep(Duration::from_millis(100));
    }
    log::info!("JACK server is up after {:?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::spawn_server;

    #[test]
    fn empty_command_is_rejected() {
        assert!(spawn_server(&[]).is_err());
    }
}
