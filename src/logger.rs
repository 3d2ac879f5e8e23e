/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::logger
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Provide leveled, colourised status lines for operators and
    an optional append-only log file for installer and builder
    sessions.

  Security / Safety Notes:
    Only command lines, paths and versions are logged; download
    payloads and environment values are never echoed.

  Dependencies:
    std::fs::File, std::sync::Mutex, chrono for timestamps,
    sha2 for session log integrity hashing.

  Operational Scope:
    Shared by every flow handler and the package builder.

  Revision History:
    2026-10-19 COD  Adapted logging module for CardShell Dist.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Append-only logging with UTC timestamps
    - Deterministic formatting for auditability
    - Graceful error propagation on I/O failures
============================================================*/

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};
use sha2::{Digest, Sha256};

use crate::error::{DistError, Result};

/// Structured log level for installer and builder events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LogLevel {
    Info,
    Success,
    Warn,
    Error,
    Debug,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Success => "OK",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        }
    }

    fn badge(self) -> &'static str {
        match self {
            LogLevel::Info => "[INFO]",
            LogLevel::Success => "[ OK ]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Error => "[FAIL]",
            LogLevel::Debug => "[DEBUG]",
        }
    }

    fn ansi(self) -> &'static str {
        match self {
            LogLevel::Info => "\x1b[34m",
            LogLevel::Success => "\x1b[32m",
            LogLevel::Warn => "\x1b[33m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Debug => "\x1b[2m",
        }
    }
}

const ANSI_RESET: &str = "\x1b[0m";

/// Shared logger emitting console status lines and optional file entries.
pub struct Logger {
    file: Option<Mutex<BufWriter<File>>>,
    path: Option<PathBuf>,
    verbose: bool,
    color: bool,
    console: bool,
}

impl Logger {
    /// Build a logger that writes to stderr and optionally to a file.
    pub fn new(path: Option<PathBuf>, verbose: bool) -> Result<Self> {
        let file = if let Some(ref file_path) = path {
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent).map_err(|err| {
                    DistError::Filesystem(format!(
                        "Failed to create log directory {}: {err}",
                        parent.display()
                    ))
                })?;
            }

            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)
                .map_err(|err| {
                    DistError::Filesystem(format!(
                        "Failed to open log file {}: {err}",
                        file_path.display()
                    ))
                })?;
            Some(Mutex::new(BufWriter::new(file)))
        } else {
            None
        };

        let color = std::io::stderr().is_terminal() && std::env::var_os("NO_COLOR").is_none();

        Ok(Self {
            file,
            path,
            verbose,
            color,
            console: true,
        })
    }

    /// Logger with console output suppressed; file logging still applies.
    pub fn quiet(path: Option<PathBuf>) -> Result<Self> {
        let mut logger = Self::new(path, false)?;
        logger.console = false;
        Ok(logger)
    }

    /// Emit a log entry with the given level, code, and message.
    pub fn log<S: AsRef<str>>(&self, level: LogLevel, code: &str, message: S) {
        let message = message.as_ref();

        if self.console && (self.verbose || level != LogLevel::Debug) {
            eprintln!("{}", self.render_console(level, message));
        }

        if let Some(file) = &self.file {
            let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
            let payload = format!("{timestamp} [{}] [{}] {}", level.as_str(), code, message);
            if let Ok(mut guard) = file.lock() {
                if writeln!(guard, "{payload}").is_err() {
                    eprintln!("{timestamp} [ERROR] [LOGGER] Failed to write to log file");
                }
                if guard.flush().is_err() {
                    eprintln!("{timestamp} [WARN] [LOGGER] Failed to flush log writer");
                }
            }
        }
    }

    fn render_console(&self, level: LogLevel, message: &str) -> String {
        if self.color {
            format!("{}{}{} {}", level.ansi(), level.badge(), ANSI_RESET, message)
        } else {
            format!("{} {}", level.badge(), message)
        }
    }

    /// Convenience wrapper for `INFO` level events.
    pub fn info<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Info, code, message);
    }

    /// Convenience wrapper for success events.
    pub fn success<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Success, code, message);
    }

    /// Convenience wrapper for `WARN` level events.
    pub fn warn<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Warn, code, message);
    }

    /// Convenience wrapper for `ERROR` level events.
    pub fn error<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Error, code, message);
    }

    /// Convenience wrapper for `DEBUG` level events.
    pub fn debug<S: AsRef<str>>(&self, code: &str, message: S) {
        self.log(LogLevel::Debug, code, message);
    }

    /// Return the path backing this logger, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Compute and persist SHA-256 digest of the log file.
    pub fn finalize(&self) -> Result<()> {
        if let Some(file) = &self.file {
            if let Ok(mut guard) = file.lock() {
                guard.flush()?;
            }
        }
        if let Some(path) = self.path() {
            let data = std::fs::read(path).map_err(|err| {
                DistError::Filesystem(format!(
                    "Failed to read log for hashing {}: {err}",
                    path.display()
                ))
            })?;
            let digest = Sha256::digest(&data);
            let mut hash_os = path.as_os_str().to_os_string();
            hash_os.push(".hash");
            let hash_path = PathBuf::from(hash_os);
            let mut file = File::create(&hash_path).map_err(|err| {
                DistError::Filesystem(format!(
                    "Failed to create hash file {}: {err}",
                    hash_path.display()
                ))
            })?;
            writeln!(
                file,
                "{:x}  {}",
                digest,
                path.file_name().unwrap_or_default().to_string_lossy()
            )
            .map_err(|err| {
                DistError::Filesystem(format!(
                    "Failed to write hash file {}: {err}",
                    hash_path.display()
                ))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_entries_carry_level_and_code() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/session.log");
        let logger = Logger::quiet(Some(path.clone())).unwrap();
        logger.info("DETECT", "Detected ubuntu 24.04");
        logger.warn("SNAP", "interface raw-usb not connected");
        logger.finalize().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].ends_with("[INFO] [DETECT] Detected ubuntu 24.04"));
        assert!(lines[1].contains("[WARN] [SNAP]"));

        let hash = std::fs::read_to_string(dir.path().join("logs/session.log.hash")).unwrap();
        assert!(hash.trim_end().ends_with("  session.log"));
        assert_eq!(hash.split_whitespace().next().unwrap().len(), 64);
    }

    #[test]
    fn plain_console_line_uses_badge() {
        let logger = Logger::quiet(None).unwrap();
        let line = Logger {
            color: false,
            ..logger
        }
        .render_console(LogLevel::Success, "installed");
        assert_eq!(line, "[ OK ] installed");
    }
}
