//! # Joystick Link
//!
//! Interactive serial monitor and calibrator for a microcontroller joystick.
//!
//! Opens the configured (or first enumerated) serial endpoint, mirrors
//! device output to the log, tracks raw samples in a calibration store, and
//! serves line commands from stdin:
//!
//! ```text
//! cal              start the calibration wizard
//! next             confirm the current wizard step
//! center / extent  capture center / widen extrema from the last raw sample
//! pos              print the calibrated stick position
//! viz | run | debug  forward the verb to the device
//! version          query the firmware version
//! deadzone <f>     set the deadzone on host and device
//! release | reacquire  hand the port to / take it back from a flashing tool
//! quit             exit
//! ```

use anyhow::{bail, Result};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};
use tracing_subscriber;

use joystick_link::calibration::CalibrationStore;
use joystick_link::command::CommandChannel;
use joystick_link::config::Config;
use joystick_link::protocol::{self, Command, FirmwareVersion};
use joystick_link::transport::{port, LineTransport};
use joystick_link::wizard::{CalibrationWizard, WizardStep};

/// Default configuration file path
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
        )
        .init();

    info!("Joystick Link v{} starting...", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = Config::load_or_default(&config_path)?;

    // Resolve the endpoint: configured identity, or first enumerated port
    let endpoint = if config.serial.port.is_empty() {
        let candidates = port::available_endpoints();
        match candidates.first() {
            Some(first) => first.clone(),
            None => bail!("no serial ports found; specify one in {}", config_path),
        }
    } else {
        config.serial.port.clone()
    };

    let transport = Arc::new(LineTransport::new());
    let read_timeout = Duration::from_millis(config.serial.read_timeout_ms);
    transport.open(&endpoint, config.serial.baud_rate, read_timeout).await?;

    // Log sink: surfaces device output when enabled
    if config.monitor.show_output {
        transport.broadcaster().subscribe(|line| {
            info!(target: "device", "{}", line.trim_end());
        });
    }

    // Raw-sample listener feeding the calibration store
    let store = Arc::new(Mutex::new(CalibrationStore::new(config.calibration.deadzone)));
    {
        let store = Arc::clone(&store);
        transport.broadcaster().subscribe(move |line| {
            if let Some(sample) = protocol::parse_raw_sample(line) {
                let mut store = store.lock().unwrap();
                store.observe(sample.raw.0, sample.raw.1);
                let (x, y) = store.position(sample.raw.0, sample.raw.1);
                debug!("raw {:?} -> position ({:.2}, {:.2}) {}", sample.raw, x, y, sample.direction);
            }
        });
    }

    let channel = Arc::new(CommandChannel::new(Arc::clone(&transport)));
    let version_timeout = Duration::from_millis(config.monitor.version_timeout_ms);

    // Device vs. latest-known version display
    let latest = load_latest_version(&config.monitor.version_file);
    report_version(channel.query_version(version_timeout).await?, latest);

    let mut wizard = CalibrationWizard::new(Arc::clone(&channel));
    let mut wizard_active = false;

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    info!("Connected to {}. Type 'quit' to exit.", endpoint);

    loop {
        tokio::select! {
            line = stdin.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input == "quit" {
                    break;
                }
                if let Err(e) = handle_command(
                    input,
                    &transport,
                    &channel,
                    &store,
                    &mut wizard,
                    &mut wizard_active,
                    version_timeout,
                ).await {
                    warn!("{}", e);
                }
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    transport.close().await;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn handle_command(
    input: &str,
    transport: &Arc<LineTransport>,
    channel: &Arc<CommandChannel>,
    store: &Arc<Mutex<CalibrationStore>>,
    wizard: &mut CalibrationWizard,
    wizard_active: &mut bool,
    version_timeout: Duration,
) -> Result<()> {
    let (verb, arg) = match input.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (input, ""),
    };

    match verb {
        "cal" => {
            wizard.start().await?;
            *wizard_active = true;
            println!("{}", wizard.instruction());
        }
        "next" => {
            if *wizard_active {
                let step = wizard.advance().await?;
                println!("{}", wizard.instruction());
                if step == WizardStep::Done {
                    *wizard_active = false;
                }
            } else {
                channel.send(&Command::Next).await?;
            }
        }
        "center" => {
            let mut store = store.lock().unwrap();
            match store.last_sample() {
                Some((x, y)) => {
                    store.capture_center(x, y);
                    println!("center = {},{}", x, y);
                }
                None => println!("no raw samples observed yet (try 'debug')"),
            }
        }
        "extent" => {
            let mut store = store.lock().unwrap();
            match store.last_sample() {
                Some((x, y)) => {
                    store.capture_extent(x, y);
                    let (xr, yr) = (store.x_range(), store.y_range());
                    println!("x: {} -> {}   y: {} -> {}", xr.min, xr.max, yr.min, yr.max);
                }
                None => println!("no raw samples observed yet (try 'debug')"),
            }
        }
        "pos" => {
            let store = store.lock().unwrap();
            match store.last_sample() {
                Some((x, y)) => {
                    let (nx, ny) = store.position(x, y);
                    println!("raw {},{} -> ({:.2}, {:.2})", x, y, nx, ny);
                }
                None => println!("no raw samples observed yet (try 'debug')"),
            }
        }
        "viz" => channel.send(&Command::Visualize).await?,
        "run" => channel.send(&Command::Run).await?,
        "debug" => channel.send(&Command::Debug).await?,
        "version" => {
            let device = channel.query_version(version_timeout).await?;
            report_version(device, None);
        }
        "deadzone" => {
            let dz: f32 = match arg.parse() {
                Ok(dz) => dz,
                Err(_) => bail!("deadzone must be a number (e.g. 0.2)"),
            };
            if !(0.0..0.9).contains(&dz) {
                bail!("deadzone must be >= 0 and < 0.9");
            }
            store.lock().unwrap().set_deadzone(dz);
            channel.send(&Command::SetDeadzone(dz)).await?;
        }
        "release" => {
            transport.release().await;
            println!("port released (run the flashing tool now)");
        }
        "reacquire" => {
            transport.reacquire().await?;
            println!("port reacquired");
        }
        other => println!("unknown command: {}", other),
    }
    Ok(())
}

/// Reads the latest-known-version reference file, if configured and present
fn load_latest_version(path: &str) -> Option<FirmwareVersion> {
    if path.is_empty() {
        return None;
    }
    let text = std::fs::read_to_string(path).ok()?;
    protocol::parse_version_str(&text)
}

fn report_version(device: Option<FirmwareVersion>, latest: Option<FirmwareVersion>) {
    match device {
        Some(v) => info!("Device firmware: {}", v),
        None => info!("Device firmware: unknown"),
    }
    if let Some(latest) = latest {
        match device {
            Some(v) if v < latest => warn!("Latest firmware: {} (update available)", latest),
            _ => info!("Latest firmware: {}", latest),
        }
    }
}
