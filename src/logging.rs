//! Opt-in debug log for the bridge.
//!
//! The bridge runs inside a plugin host whose stdout and stderr belong to the host, so all
//! diagnostics go to a size-capped file in the temp directory and only when enabled.

use crate::config::BridgeConfig;
use std::{
    env, fs,
    io::{self, Write},
    panic,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Mutex, OnceLock,
    },
    time::{SystemTime, UNIX_EPOCH},
};

const LOG_MAX_BYTES: u64 = 2 * 1024 * 1024;
const LOG_PATH_ENV: &str = "UI_BRIDGE_LOG_FILE";
static LOG_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_CONTENT_ENABLED: AtomicBool = AtomicBool::new(false);
static LOG_STATE: OnceLock<Mutex<LogState>> = OnceLock::new();

/// Path of the debug log; `UI_BRIDGE_LOG_FILE` overrides the temp-dir default.
pub fn log_file_path() -> PathBuf {
    env::var(LOG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("ui_bridge.log"))
}

/// Append-only log with a single predecessor: once the live file would grow past
/// `limit`, it is renamed to `<path>.1` (replacing an older one) and a fresh file starts.
struct RollingLog {
    path: PathBuf,
    file: fs::File,
    limit: u64,
    len: u64,
}

fn open_append(path: &Path) -> io::Result<fs::File> {
    fs::OpenOptions::new().create(true).append(true).open(path)
}

fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".1");
    PathBuf::from(name)
}

impl RollingLog {
    fn open(path: PathBuf, limit: u64) -> io::Result<Self> {
        let len = fs::metadata(&path).map_or(0, |meta| meta.len());
        let mut log = Self {
            file: open_append(&path)?,
            path,
            limit,
            len,
        };
        if len >= limit {
            log.roll()?;
        }
        Ok(log)
    }

    fn roll(&mut self) -> io::Result<()> {
        fs::rename(&self.path, backup_path(&self.path))?;
        self.file = open_append(&self.path)?;
        self.len = 0;
        Ok(())
    }

    fn append(&mut self, line: &str) -> io::Result<()> {
        let next = self.len.saturating_add(line.len() as u64);
        if self.len > 0 && next > self.limit {
            self.roll()?;
        }
        self.file.write_all(line.as_bytes())?;
        self.len = self.len.saturating_add(line.len() as u64);
        Ok(())
    }
}

#[derive(Default)]
struct LogState {
    log: Option<RollingLog>,
}

fn log_state() -> &'static Mutex<LogState> {
    LOG_STATE.get_or_init(|| Mutex::new(LogState::default()))
}

fn apply_log_switches(enabled: bool, content_enabled: bool) {
    LOG_ENABLED.store(enabled, Ordering::Relaxed);
    LOG_CONTENT_ENABLED.store(enabled && content_enabled, Ordering::Relaxed);
    let mut state = log_state()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    state.log = if enabled {
        RollingLog::open(log_file_path(), LOG_MAX_BYTES).ok()
    } else {
        None
    };
}

/// Turn the debug log on or off from the bridge configuration.
pub fn init_logging(config: &BridgeConfig) {
    apply_log_switches(config.logging_enabled(), config.log_content);
}

/// Append one timestamped line to the debug log when logging is enabled.
pub fn log_debug(msg: &str) {
    if !LOG_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    let line = format!("[{millis}] {msg}\n");
    let mut state = log_state()
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(log) = state.log.as_mut() {
        if log.append(&line).is_err() {
            state.log = None;
        }
    }
}

/// Log a line that quotes protocol payloads; requires `--log-content` on top of `--logs`.
pub fn log_debug_content(msg: &str) {
    if !LOG_CONTENT_ENABLED.load(Ordering::Relaxed) {
        return;
    }
    log_debug(msg);
}

/// Record where a panic happened. The payload is only written when content logging is on.
pub fn log_panic(info: &panic::PanicHookInfo<'_>) {
    let location = info
        .location()
        .map(|loc| format!("{}:{}", loc.file(), loc.line()))
        .unwrap_or_else(|| "unknown".to_string());
    log_debug(&format!(
        "panic at {location} (v{})",
        env!("CARGO_PKG_VERSION")
    ));
    let payload = info
        .payload()
        .downcast_ref::<&str>()
        .map(|text| (*text).to_string())
        .or_else(|| info.payload().downcast_ref::<String>().cloned());
    if let Some(payload) = payload {
        log_debug_content(&format!("panic payload: {payload}"));
    }
}

/// Shorten a payload for content logs without splitting a character.
pub(crate) fn snippet(text: &str, max_chars: usize) -> String {
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().count() > max_chars {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snippet_keeps_short_text() {
        assert_eq!(snippet("size", 8), "size");
    }

    #[test]
    fn snippet_truncates_on_char_boundary() {
        assert_eq!(snippet("héllo wörld", 5), "héllo...");
    }

    fn scratch_log(name: &str) -> PathBuf {
        let path = env::temp_dir().join(format!("ui_bridge_{name}_{}.log", std::process::id()));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_file(backup_path(&path));
        path
    }

    #[test]
    fn full_log_rolls_over_to_backup() {
        let path = scratch_log("rollover");
        let mut log = RollingLog::open(path.clone(), 16).expect("open log");
        log.append("0123456789\n").unwrap();
        log.append("abcdefghij\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "abcdefghij\n");
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), "0123456789\n");

        log.append("klmnopqrst\n").unwrap();
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap(), "abcdefghij\n");
        let _ = fs::remove_file(backup_path(&path));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn oversized_log_from_earlier_run_is_rolled_on_open() {
        let path = scratch_log("reopen");
        fs::write(&path, "x".repeat(32)).unwrap();
        let mut log = RollingLog::open(path.clone(), 16).expect("open log");
        log.append("fresh\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "fresh\n");
        assert_eq!(fs::read_to_string(backup_path(&path)).unwrap().len(), 32);
        let _ = fs::remove_file(backup_path(&path));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn oversized_line_is_written_to_empty_log() {
        let path = scratch_log("long_line");
        let mut log = RollingLog::open(path.clone(), 4).expect("open log");
        log.append("longer than the limit\n").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "longer than the limit\n");
        assert!(!backup_path(&path).exists());
        let _ = fs::remove_file(&path);
    }
}
