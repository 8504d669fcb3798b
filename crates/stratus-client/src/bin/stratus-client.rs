use std::io::{self, BufRead};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use stratus_client::devices::GamepadProvider;
use stratus_client::net::{spawn_reader, StdoutBridge, UdpControlChannel, UdpTransport};
use stratus_client::{
    GilrsDevices, InputChannel, InputSession, NoGamepads, SessionCommand, TransportEvent,
};
use stratus_common::helpers::env_bool;
use stratus_common::{InputConfig, PacketizerMode, VibrationMode};
use stratus_core::Button;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum VibrationArg {
    Device,
    Native,
    Local,
}

impl From<VibrationArg> for VibrationMode {
    fn from(arg: VibrationArg) -> Self {
        match arg {
            VibrationArg::Device => VibrationMode::Device,
            VibrationArg::Native => VibrationMode::Native,
            VibrationArg::Local => VibrationMode::Local,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "stratus-client")]
struct Args {
    /// Remote host receiving input packets
    #[arg(long)]
    connect: SocketAddr,
    /// Local address for the data socket
    #[arg(long, default_value = "0.0.0.0:0")]
    bind: SocketAddr,
    /// Peer for controller hot-plug notifications
    #[arg(long)]
    control: Option<SocketAddr>,
    /// JSON input configuration
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override the stick deadzone
    #[arg(long)]
    deadzone: Option<f32>,
    /// Where vibration reports are routed
    #[arg(long, value_enum)]
    vibration_mode: Option<VibrationArg>,
    /// Controller-only packetizer on a slower tick
    #[arg(long, default_value_t = false)]
    simplified: bool,
    /// Disable the keyboard-as-controller mapping
    #[arg(long, default_value_t = false)]
    no_legacy_keyboard: bool,
}

fn parse_toggle(token: Option<&str>) -> Result<bool, String> {
    match token {
        Some("on") => Ok(true),
        Some("off") => Ok(false),
        Some(other) => Err(format!("expected on|off, got `{other}`")),
        None => Err("missing on|off".into()),
    }
}

fn parse_index(token: Option<&str>) -> Result<u8, String> {
    token
        .ok_or_else(|| "missing gamepad index".to_string())?
        .parse::<u8>()
        .map_err(|_| "gamepad index must be 0-255".to_string())
}

fn parse_f32(token: Option<&str>, what: &str) -> Result<f32, String> {
    token
        .ok_or_else(|| format!("missing {what}"))?
        .parse::<f32>()
        .map_err(|_| format!("{what} must be a number"))
}

/// Host commands read from stdin, one per line.
fn parse_command_line(line: &str) -> Result<SessionCommand, String> {
    let mut parts = line.split_whitespace();
    let verb = parts.next().ok_or_else(|| "empty command".to_string())?;
    let command = match verb {
        "press" | "release" => {
            let index = parse_index(parts.next())?;
            let button = parts
                .next()
                .ok_or_else(|| "missing button".to_string())?
                .parse::<Button>()
                .map_err(|e| e.to_string())?;
            if verb == "press" {
                SessionCommand::PressButton { index, button }
            } else {
                SessionCommand::ReleaseButton { index, button }
            }
        }
        "lstick" | "rstick" => {
            let index = parse_index(parts.next())?;
            let x = parse_f32(parts.next(), "x")?;
            let y = parse_f32(parts.next(), "y")?;
            if verb == "lstick" {
                SessionCommand::MoveLeftStick { index, x, y }
            } else {
                SessionCommand::MoveRightStick { index, x, y }
            }
        }
        "key" => {
            let code = parts.next().ok_or_else(|| "missing key code".to_string())?;
            let pressed = match parts.next() {
                Some("down") => true,
                Some("up") => false,
                _ => return Err("expected down|up".into()),
            };
            let key_code = match parts.next() {
                Some(raw) => raw
                    .parse::<u16>()
                    .map_err(|_| "keycode must be 0-65535".to_string())?,
                None => 0,
            };
            SessionCommand::Key {
                code: code.to_string(),
                key_code,
                key: code.to_string(),
                pressed,
            }
        }
        "vibration" => SessionCommand::SetVibration(parse_toggle(parts.next())?),
        "rumble" => SessionCommand::SetRumbleEnabled(parse_toggle(parts.next())?),
        "legacy" => SessionCommand::SetLegacyKeyboard(parse_toggle(parts.next())?),
        "mode" => SessionCommand::SetVibrationMode(match parts.next() {
            Some("device") => VibrationMode::Device,
            Some("native") => VibrationMode::Native,
            Some("local") => VibrationMode::Local,
            _ => return Err("expected device|native|local".into()),
        }),
        "stop" => SessionCommand::Stop,
        other => return Err(format!("unknown command `{other}`")),
    };
    if parts.next().is_some() {
        return Err("unexpected trailing tokens".into());
    }
    Ok(command)
}

fn load_config(args: &Args) -> Result<InputConfig> {
    let mut config = match &args.config {
        Some(path) => InputConfig::from_json_file(path)?,
        None => InputConfig::default(),
    };
    if let Some(deadzone) = args.deadzone {
        config.deadzone = deadzone;
    }
    if let Some(mode) = args.vibration_mode {
        config.vibration_mode = mode.into();
    }
    if args.simplified {
        config.mode = PacketizerMode::Simplified;
    }
    if args.no_legacy_keyboard {
        config.legacy_keyboard = false;
    }
    config.validate()?;
    Ok(config)
}

fn spawn_stdin_commands(tx: mpsc::Sender<SessionCommand>) {
    std::thread::spawn(move || {
        eprintln!(
            "Commands: press|release <i> <Button>, lstick|rstick <i> <x> <y>, \
             key <code> <down|up> [keycode], vibration|rumble|legacy on|off, \
             mode device|native|local, stop"
        );
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => match parse_command_line(&line) {
                    Ok(cmd) => {
                        if tx.blocking_send(cmd).is_err() {
                            break;
                        }
                    }
                    Err(err) => eprintln!("invalid command `{}`: {}", line.trim(), err),
                },
                Err(err) => {
                    eprintln!("stdin read error: {}", err);
                    break;
                }
            }
        }
    });
}

async fn run(args: Args) -> Result<()> {
    let config = load_config(&args)?;

    let socket = Arc::new(UdpSocket::bind(args.bind).await?);
    info!("input channel {} -> {}", socket.local_addr()?, args.connect);

    let devices: Box<dyn GamepadProvider> = if env_bool("STRATUS_DISABLE_GAMEPADS", false) {
        info!("physical gamepads disabled");
        Box::new(NoGamepads)
    } else {
        match GilrsDevices::new() {
            Ok(devices) => Box::new(devices),
            Err(err) => {
                warn!("physical gamepads unavailable: {err:#}");
                Box::new(NoGamepads)
            }
        }
    };

    let channel = InputChannel::new(
        &config,
        Box::new(UdpTransport::new(socket.clone(), args.connect)),
        Some(Box::new(StdoutBridge)),
        Instant::now(),
    )?;
    let control = UdpControlChannel::new(socket.clone(), args.control);
    let session = InputSession::new(&config, channel, devices, Box::new(control));

    let (event_tx, event_rx) = mpsc::channel(64);
    let (command_tx, command_rx) = mpsc::channel(64);

    // The handshake goes out with a non-blocking send on open.
    socket.writable().await?;
    event_tx.send(TransportEvent::Open).await?;
    let reader = spawn_reader(socket, args.connect, event_tx);
    spawn_stdin_commands(command_tx.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = command_tx.send(SessionCommand::Stop).await;
        }
    });

    let summary = session.run(event_rx, command_rx).await?;
    reader.abort();
    info!(
        "session ended in {:?}: {} packets, {} send failures, last seq {}",
        summary.final_state,
        summary.stats.packets_sent,
        summary.stats.send_failures,
        summary.sequence
    );
    Ok(())
}

fn main() -> Result<()> {
    stratus_common::init_tracing();
    let args = Args::parse();

    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?
        .block_on(run(args))
}
