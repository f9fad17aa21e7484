//! Diagnostic binary: prints the current audio topology and optionally
//! watches for changes (`--watch`).

use anyhow::Result;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    run()
}

#[cfg(target_os = "macos")]
fn run() -> Result<()> {
    use audio_switchboard::{AudioManager, CoreAudioHardware};
    use std::sync::Arc;

    let manager = AudioManager::spawn(Arc::new(CoreAudioHardware::new()))?;
    print_state(&manager.snapshot());

    if std::env::args().any(|arg| arg == "--watch") {
        println!("watching for topology changes, Ctrl-C to stop");
        for state in manager.subscribe() {
            print_state(&state);
        }
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn print_state(state: &audio_switchboard::AudioState) {
    use audio_switchboard::Direction;

    for direction in [Direction::Input, Direction::Output] {
        println!("{direction} devices:");
        for device in state.devices(direction) {
            let marker = if state.selected(direction) == Some(device) {
                "*"
            } else {
                " "
            };
            println!("  {marker} {} [{}]", device.name, device.uid);
        }
        println!("  volume: {:.2}", state.volume(direction));
    }
}

#[cfg(not(target_os = "macos"))]
fn run() -> Result<()> {
    anyhow::bail!("audio hardware access is only implemented for macOS")
}
