use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use ui_bridge::protocol::{Command, Message};
use ui_bridge::{init_logging, log_debug, BridgeConfig, PipeClient, WriteGuard};

const IDLE_TICK: Duration = Duration::from_millis(5);

/// How the peer behaves once started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
enum PeerMode {
    /// Report its size, answer show/hide, echo control values, exit on quit
    #[default]
    Echo,
    /// Exit with status 3 right after the handshake
    Crash,
    /// Handshake, then ignore everything (dies on SIGTERM)
    Silent,
    /// Handshake, then ignore everything including SIGTERM
    Stubborn,
    /// Never send the handshake line
    NoHandshake,
    /// Handshake, say `exiting`, and leave
    Exiting,
}

/// Scripted companion for exercising the UI bridge.
#[derive(Debug, Parser)]
#[command(about = "Scripted UI bridge companion", author, version)]
struct PeerCli {
    #[arg(long, value_enum, env = "BRIDGE_PEER_MODE", default_value_t = PeerMode::Echo)]
    mode: PeerMode,

    /// Talk over stdin/stdout instead of inherited descriptors
    #[arg(long = "stdio", default_value_t = false)]
    stdio: bool,

    /// Width reported after the handshake in echo mode
    #[arg(long = "width", default_value_t = 640)]
    width: u32,

    /// Height reported after the handshake in echo mode
    #[arg(long = "height", default_value_t = 480)]
    height: u32,

    /// Exit on its own after this long (milliseconds)
    #[arg(long = "lifetime-ms", default_value_t = 30_000)]
    lifetime_ms: u64,

    /// Host-provided arguments; inherited descriptors are the last two
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    rest: Vec<String>,
}

fn linger(lifetime: Duration) {
    let start = Instant::now();
    while start.elapsed() < lifetime {
        thread::sleep(Duration::from_millis(20));
    }
}

fn respond(writer: &WriteGuard, message: &Message, quit: &mut bool) {
    let result = match message.kind() {
        Some(Command::Show) => writer.write_show(),
        Some(Command::Hide) => writer.write_hide(),
        Some(Command::Control) => match (message.uint_arg(0), message.float_arg(1)) {
            (Ok(index), Ok(value)) => writer.write_control(index, value),
            _ => writer.write_error("malformed control message"),
        },
        Some(Command::Quit) => {
            *quit = true;
            Ok(())
        }
        _ => Ok(()),
    };
    if let Err(err) = result {
        log_debug(&format!("bridge-peer: reply failed: {err}"));
    }
}

fn run_echo(client: &mut PipeClient, cli: &PeerCli, lifetime: Duration) -> Result<()> {
    let writer = Arc::clone(client.writer());
    writer
        .write_size(cli.width, cli.height)
        .context("report initial size")?;
    let start = Instant::now();
    let mut quit = false;
    while !quit && start.elapsed() < lifetime {
        if !client.idle(|message| respond(&writer, message, &mut quit)) {
            break;
        }
        thread::sleep(IDLE_TICK);
    }
    client.close();
    Ok(())
}

fn main() -> Result<()> {
    let cli = PeerCli::parse();
    let config = BridgeConfig::default();
    init_logging(&config);
    let lifetime = Duration::from_millis(cli.lifetime_ms);

    if cli.mode == PeerMode::NoHandshake {
        linger(lifetime);
        return Ok(());
    }
    if cli.mode == PeerMode::Stubborn {
        // SAFETY: installs SIG_IGN for SIGTERM before any other thread exists.
        unsafe {
            libc::signal(libc::SIGTERM, libc::SIG_IGN);
        }
    }

    let mut client = if cli.stdio {
        PipeClient::from_stdio(&config)
    } else {
        PipeClient::from_fd_args(&cli.rest, &config)
    }
    .context("attach to bridge pipes")?;

    match cli.mode {
        PeerMode::Echo => run_echo(&mut client, &cli, lifetime)?,
        PeerMode::Crash => std::process::exit(3),
        PeerMode::Silent | PeerMode::Stubborn => linger(lifetime),
        PeerMode::Exiting => {
            client.writer().write_exiting().context("send exiting")?;
        }
        PeerMode::NoHandshake => {}
    }
    Ok(())
}
