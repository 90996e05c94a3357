//! Rolling file logging for processes embedding the board store.
//!
//! # Responsibility
//! - Start one `flexi_logger` backend per process, writing rotated files.
//! - Record panics as single-line `event=panic_captured` entries.
//!
//! # Invariants
//! - Repeating `init_logging` with the same level and directory is a no-op.
//! - A second call with another level or directory is an error, not a switch.
//! - Nothing in this module panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};

const LOG_FILE_BASENAME: &str = "boardstore";
const ROTATE_AT_BYTES: u64 = 8 * 1024 * 1024;
const KEEP_LOG_FILES: usize = 4;
const PANIC_SUMMARY_CHARS: usize = 120;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

struct ActiveLogger {
    level: &'static str,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn matches(&self, level: &'static str, log_dir: &Path) -> Result<(), String> {
        if self.log_dir != log_dir {
            return Err(format!(
                "logging already writes to `{}`; refusing to switch to `{}`",
                self.log_dir.display(),
                log_dir.display()
            ));
        }
        if self.level != level {
            return Err(format!(
                "logging already runs at `{}`; refusing to switch to `{level}`",
                self.level
            ));
        }
        Ok(())
    }
}

/// Starts file logging at `level` under the absolute directory `log_dir`.
///
/// # Errors
/// - Unknown level, empty or relative directory.
/// - Directory cannot be created or the backend fails to start.
/// - Logging is already active with a different level or directory.
pub fn init_logging(level: &str, log_dir: &str) -> Result<(), String> {
    let level = normalize_level(level)?;
    let log_dir = normalize_log_dir(log_dir)?;

    if let Some(active) = ACTIVE.get() {
        return active.matches(level, &log_dir);
    }

    let active = ACTIVE.get_or_try_init(|| start_backend(level, &log_dir))?;
    active.matches(level, &log_dir)
}

fn start_backend(level: &'static str, log_dir: &Path) -> Result<ActiveLogger, String> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        format!(
            "cannot create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let handle = Logger::try_with_str(level)
        .map_err(|err| format!("invalid log level `{level}`: {err}"))?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(ROTATE_AT_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(KEEP_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("logger backend failed to start: {err}"))?;

    install_panic_hook();

    info!(
        "event=logging_init module=logging status=ok level={level} log_dir={} version={}",
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}

/// `(level, log_dir)` of the active logger, if any.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.log_dir.clone()))
}

/// `debug` in debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

fn normalize_level(level: &str) -> Result<&'static str, String> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(format!(
            "unsupported log level `{other}`; expected trace|debug|info|warn|error"
        )),
    }
}

fn normalize_log_dir(log_dir: &str) -> Result<PathBuf, String> {
    let trimmed = log_dir.trim();
    if trimmed.is_empty() {
        return Err("log_dir cannot be empty".to_string());
    }
    let path = Path::new(trimmed);
    if !path.is_absolute() {
        return Err(format!("log_dir must be absolute, got `{trimmed}`"));
    }
    Ok(path.to_path_buf())
}

fn install_panic_hook() {
    if PANIC_HOOK.get().is_some() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = if let Some(message) = info.payload().downcast_ref::<&str>() {
            (*message).to_string()
        } else if let Some(message) = info.payload().downcast_ref::<String>() {
            message.clone()
        } else {
            "non-string panic payload".to_string()
        };
        error!(
            "event=panic_captured module=logging status=error location={location} payload={}",
            single_line(&payload, PANIC_SUMMARY_CHARS)
        );
        previous(info);
    }));

    let _ = PANIC_HOOK.set(());
}

/// Flattens `value` to one line of at most `max_chars` characters.
fn single_line(value: &str, max_chars: usize) -> String {
    let flattened = value.replace(['\n', '\r'], " ");
    let mut line: String = flattened.chars().take(max_chars).collect();
    if flattened.chars().count() > max_chars {
        line.push_str("...");
    }
    line
}

#[cfg(test)]
mod tests {
    use super::{init_logging, logging_status, normalize_level, normalize_log_dir, single_line};

    #[test]
    fn level_names_are_normalized() {
        assert_eq!(normalize_level(" WARNING ").expect("warning is known"), "warn");
        assert_eq!(normalize_level("Trace").expect("trace is known"), "trace");
        assert!(normalize_level("verbose").is_err());
    }

    #[test]
    fn relative_and_empty_dirs_are_rejected() {
        assert!(normalize_log_dir("logs").expect_err("relative").contains("absolute"));
        assert!(normalize_log_dir("  ").expect_err("empty").contains("empty"));
    }

    #[test]
    fn single_line_flattens_and_truncates() {
        let line = single_line("first\nsecond\rthird", 10);
        assert_eq!(line, "first seco...");
        assert_eq!(single_line("short", 10), "short");
    }

    #[test]
    fn repeated_init_is_idempotent_and_conflicts_fail() {
        let first = tempfile::Builder::new()
            .prefix("boardstore-logging")
            .tempdir()
            .expect("create log dir");
        let second = tempfile::Builder::new()
            .prefix("boardstore-logging")
            .tempdir()
            .expect("create second log dir");
        let first_dir = first.path().to_str().expect("utf-8 path").to_string();
        let second_dir = second.path().to_str().expect("utf-8 path").to_string();

        init_logging("info", &first_dir).expect("first init");
        init_logging("info", &first_dir).expect("same config is a no-op");

        let level_err = init_logging("debug", &first_dir).expect_err("level switch");
        assert!(level_err.contains("refusing to switch"));
        let dir_err = init_logging("info", &second_dir).expect_err("dir switch");
        assert!(dir_err.contains("refusing to switch"));

        let (level, dir) = logging_status().expect("logger is active");
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}
