use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};
use ui_bridge::host::{descriptor, HandleTable, InstantiateRequest};
use ui_bridge::process::{SpawnRequest, TerminateOutcome};
use ui_bridge::{
    BridgeConfig, ExternalUi, IdleStatus, Liveness, SpawnError, Transport, UiEvent, Visibility,
};

const WAIT: Duration = Duration::from_secs(5);

fn peer_bin() -> &'static str {
    option_env!("CARGO_BIN_EXE_bridge-peer").expect("bridge-peer test binary not built")
}

fn config() -> BridgeConfig {
    BridgeConfig {
        terminate_grace_ms: 500,
        ..BridgeConfig::default()
    }
}

fn peer(mode: &str) -> SpawnRequest {
    SpawnRequest::new(
        peer_bin(),
        vec![
            "--mode".to_string(),
            mode.to_string(),
            "urn:example:synth".to_string(),
            "42".to_string(),
        ],
    )
}

fn launch(mode: &str) -> ExternalUi<Vec<UiEvent>> {
    ExternalUi::launch(&config(), &peer(mode), Vec::new()).expect("launch bridge-peer")
}

/// Idle until `done` holds or the companion goes away; returns the last status.
fn pump_until(
    ui: &mut ExternalUi<Vec<UiEvent>>,
    mut done: impl FnMut(&ExternalUi<Vec<UiEvent>>, IdleStatus) -> bool,
) -> IdleStatus {
    let deadline = Instant::now() + WAIT;
    loop {
        let status = ui.idle();
        if done(ui, status) || status == IdleStatus::TearDown || Instant::now() >= deadline {
            return status;
        }
        thread::sleep(Duration::from_millis(5));
    }
}

fn has_event(ui: &ExternalUi<Vec<UiEvent>>, event: UiEvent) -> bool {
    ui.host().contains(&event)
}

#[test]
fn echo_peer_reports_size_and_answers_show_and_hide() {
    let mut ui = launch("echo");
    assert!(ui.pid().is_some());

    let size = UiEvent::SizeChanged {
        width: 640,
        height: 480,
    };
    pump_until(&mut ui, |ui, _| has_event(ui, size));
    assert!(has_event(&ui, size));

    ui.show().unwrap();
    pump_until(&mut ui, |ui, _| ui.lifecycle().visibility == Visibility::Shown);
    assert_eq!(ui.lifecycle().visibility, Visibility::Shown);

    ui.hide().unwrap();
    let status = pump_until(&mut ui, |_, status| status == IdleStatus::Hide);
    assert_eq!(status, IdleStatus::Hide);
    assert_eq!(ui.lifecycle().visibility, Visibility::Hidden);

    assert_eq!(ui.terminate(), Some(TerminateOutcome::Quit));
    assert_eq!(ui.lifecycle().liveness, Liveness::Closed);
    assert_eq!(ui.terminate(), None);
}

#[test]
fn launched_ui_starts_hidden() {
    let ui = launch("echo");
    assert_eq!(ui.lifecycle().liveness, Liveness::Running);
    assert_eq!(ui.lifecycle().visibility, Visibility::Hidden);
}

#[test]
fn show_on_start_waits_for_companion_confirmation() {
    let config = BridgeConfig {
        show_on_start: true,
        ..config()
    };
    let mut ui = ExternalUi::launch(&config, &peer("echo"), Vec::new()).unwrap();
    assert_eq!(ui.lifecycle().visibility, Visibility::Unknown);
    pump_until(&mut ui, |ui, _| ui.lifecycle().visibility == Visibility::Shown);
    assert_eq!(ui.lifecycle().visibility, Visibility::Shown);
}

#[test]
fn control_values_round_trip_through_peer() {
    let mut ui = launch("echo");
    assert!(ui.port_event(3, 0, &0.5f32.to_ne_bytes()).unwrap());
    assert!(!ui.port_event(3, 1, &0.5f32.to_ne_bytes()).unwrap());
    assert!(!ui.port_event(3, 0, &[0u8; 8]).unwrap());

    let echoed = UiEvent::ParameterChanged {
        index: 3,
        value: 0.5,
    };
    pump_until(&mut ui, |ui, _| has_event(ui, echoed));
    let parameters = ui
        .host()
        .iter()
        .filter(|event| matches!(event, UiEvent::ParameterChanged { .. }))
        .count();
    assert_eq!(parameters, 1);
}

#[test]
fn threaded_reader_sees_the_same_traffic() {
    let config = BridgeConfig {
        threaded_reader: true,
        ..config()
    };
    let mut ui = ExternalUi::launch(&config, &peer("echo"), Vec::new()).unwrap();
    ui.writer().write_control(9, 0.125).unwrap();
    let echoed = UiEvent::ParameterChanged {
        index: 9,
        value: 0.125,
    };
    pump_until(&mut ui, |ui, _| has_event(ui, echoed));
    assert!(has_event(&ui, echoed));
}

#[test]
fn stdio_transport_works_with_echo_peer() {
    let request = SpawnRequest::new(
        peer_bin(),
        vec!["--stdio".to_string(), "urn:example:synth".to_string()],
    )
    .with_transport(Transport::StdStreams);
    let mut ui = ExternalUi::launch(&config(), &request, Vec::new()).unwrap();
    let size = UiEvent::SizeChanged {
        width: 640,
        height: 480,
    };
    pump_until(&mut ui, |ui, _| has_event(ui, size));
    assert!(has_event(&ui, size));
    assert_eq!(ui.terminate(), Some(TerminateOutcome::Quit));
}

#[test]
fn crashing_peer_tears_down() {
    let mut ui = launch("crash");
    let status = pump_until(&mut ui, |_, _| false);
    assert_eq!(status, IdleStatus::TearDown);
    assert_eq!(ui.lifecycle().liveness, Liveness::Crashed);
    assert_eq!(ui.idle(), IdleStatus::TearDown);
    assert!(ui.show().unwrap_err().is_closed());
    // The pipe closes slightly before the exit status becomes visible.
    assert!(matches!(
        ui.terminate(),
        Some(TerminateOutcome::AlreadyExited | TerminateOutcome::Quit)
    ));
    assert_eq!(ui.terminate(), None);
}

#[test]
fn exiting_peer_closes_cleanly() {
    let mut ui = launch("exiting");
    let status = pump_until(&mut ui, |_, _| false);
    assert_eq!(status, IdleStatus::TearDown);
    assert_eq!(ui.lifecycle().liveness, Liveness::Closed);
}

#[test]
fn exiting_peer_closes_cleanly_with_threaded_reader() {
    let config = BridgeConfig {
        threaded_reader: true,
        ..config()
    };
    for attempt in 0..20 {
        let mut ui = ExternalUi::launch(&config, &peer("exiting"), Vec::new()).unwrap();
        let status = pump_until(&mut ui, |_, _| false);
        assert_eq!(status, IdleStatus::TearDown, "attempt {attempt}");
        assert_eq!(ui.lifecycle().liveness, Liveness::Closed, "attempt {attempt}");
    }
}

#[test]
fn silent_peer_is_terminated_after_grace() {
    let mut ui = launch("silent");
    let start = Instant::now();
    assert_eq!(ui.terminate(), Some(TerminateOutcome::Terminated));
    assert!(start.elapsed() < WAIT);
}

#[test]
fn stubborn_peer_is_killed() {
    let mut ui = launch("stubborn");
    let start = Instant::now();
    assert_eq!(ui.terminate(), Some(TerminateOutcome::Killed));
    assert!(start.elapsed() < WAIT);
}

#[test]
fn missing_handshake_fails_launch() {
    let config = BridgeConfig {
        handshake_timeout_ms: 200,
        ..config()
    };
    let start = Instant::now();
    let err = ExternalUi::launch(&config, &peer("no-handshake"), Vec::new())
        .err()
        .expect("handshake should fail");
    assert!(matches!(err, SpawnError::Handshake(_)), "{err}");
    assert!(start.elapsed() < WAIT);
}

struct Bundle(PathBuf);

impl Bundle {
    fn with_companion(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!(
            "ui-bridge-bundle-{}-{name}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        std::os::unix::fs::symlink(peer_bin(), dir.join(name)).unwrap();
        Self(dir)
    }
}

impl Drop for Bundle {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

#[test]
fn handle_table_runs_companion_from_bundle() {
    let descriptor = descriptor(0).unwrap();
    let bundle = Bundle::with_companion(descriptor.companion);
    let mut table: HandleTable<Vec<UiEvent>> = HandleTable::new(descriptor, config());

    let handle = table
        .instantiate(
            &InstantiateRequest {
                plugin_uri: "urn:example:synth",
                bundle_path: &bundle.0,
                parent_window: 0x2a,
            },
            Vec::new(),
        )
        .unwrap();
    assert_eq!(table.len(), 1);

    let size = UiEvent::SizeChanged {
        width: 640,
        height: 480,
    };
    let deadline = Instant::now() + WAIT;
    while !table.get(handle).unwrap().host().contains(&size) && Instant::now() < deadline {
        assert_eq!(table.idle(handle), 0);
        thread::sleep(Duration::from_millis(5));
    }
    let events = table.get(handle).unwrap().host();
    assert_eq!(
        events.first(),
        Some(&UiEvent::SizeChanged {
            width: 1,
            height: 1
        })
    );
    assert!(events.contains(&size));
    assert_eq!(
        table.get(handle).unwrap().lifecycle().visibility,
        Visibility::Hidden
    );

    assert_eq!(table.show(handle), 0);
    assert!(table.port_event(handle, 1, 0, &0.25f32.to_ne_bytes()));
    assert!(table.cleanup(handle));
    assert!(!table.cleanup(handle));
    assert!(table.is_empty());
}
