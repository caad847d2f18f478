use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use crossbeam_channel::{bounded, Receiver};
use serde::Serialize;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use ui_bridge::process::SpawnRequest;
use ui_bridge::{
    init_logging, init_tracing, log_debug, log_file_path, log_panic, BridgeConfig, ExternalUi,
    IdleStatus, UiEvent, UiLifecycleState,
};

const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Launch a plugin UI companion, drive its idle loop and print what it reports.
#[derive(Debug, Parser)]
#[command(about = "Plugin UI bridge probe", author, version)]
struct ProbeCli {
    #[command(flatten)]
    bridge: BridgeConfig,

    /// Idle tick (milliseconds)
    #[arg(long = "tick-ms", default_value_t = 30)]
    tick_ms: u64,

    /// Stop after this long (milliseconds); 0 runs until the companion goes away
    #[arg(long = "run-ms", default_value_t = 0)]
    run_ms: u64,

    /// Send a control value after start, as INDEX=VALUE (repeatable)
    #[arg(long = "control", value_parser = parse_control, action = ArgAction::Append)]
    controls: Vec<(u32, f32)>,

    /// Companion executable
    companion: PathBuf,

    /// Arguments passed to the companion
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    companion_args: Vec<String>,
}

fn parse_control(raw: &str) -> Result<(u32, f32), String> {
    let (index, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected INDEX=VALUE, got {raw:?}"))?;
    let index = ui_bridge::protocol::parse_uint(index)
        .ok_or_else(|| format!("invalid control index {index:?}"))?;
    let value = ui_bridge::protocol::parse_float(value)
        .ok_or_else(|| format!("invalid control value {value:?}"))?;
    Ok((index, value))
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ProbeEvent {
    Started { pid: Option<u32> },
    Idle { status: &'static str },
    Stopped {
        state: UiLifecycleState,
        terminate: Option<String>,
    },
}

fn emit<T: Serialize>(event: &T) -> Result<()> {
    let line = serde_json::to_string(event).context("serialize event")?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{line}")?;
    stdout.flush()?;
    Ok(())
}

fn drain(events: &Receiver<UiEvent>) -> Result<()> {
    for event in events.try_iter() {
        emit(&event)?;
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = ProbeCli::parse();
    cli.bridge.validate()?;
    init_logging(&cli.bridge);
    init_tracing(&cli.bridge);
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        log_panic(info);
        default_hook(info);
    }));
    log_debug(&format!("=== ui-bridge probe started (log {:?}) ===", log_file_path()));

    let (tx, rx) = bounded(EVENT_QUEUE_CAPACITY);
    let request = SpawnRequest::new(&cli.companion, cli.companion_args.clone())
        .with_transport(cli.bridge.transport);
    let mut ui = ExternalUi::launch(&cli.bridge, &request, tx)
        .with_context(|| format!("failed to start {}", cli.companion.display()))?;
    emit(&ProbeEvent::Started { pid: ui.pid() })?;

    let writer = ui.writer();
    for (index, value) in &cli.controls {
        writer
            .write_control(*index, *value)
            .with_context(|| format!("sending control {index}"))?;
    }

    let tick = Duration::from_millis(cli.tick_ms.max(1));
    let deadline = (cli.run_ms > 0).then(|| Instant::now() + Duration::from_millis(cli.run_ms));
    loop {
        let status = ui.idle();
        drain(&rx)?;
        match status {
            IdleStatus::KeepAlive => {}
            IdleStatus::Hide => emit(&ProbeEvent::Idle { status: "hide" })?,
            IdleStatus::TearDown => {
                emit(&ProbeEvent::Idle {
                    status: "tear_down",
                })?;
                break;
            }
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }
        thread::sleep(tick);
    }

    let outcome = ui.terminate();
    drain(&rx)?;
    emit(&ProbeEvent::Stopped {
        state: ui.lifecycle(),
        terminate: outcome.map(|outcome| format!("{outcome:?}")),
    })?;
    Ok(())
}
