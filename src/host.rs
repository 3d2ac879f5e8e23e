/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::host
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Execute external tools (package managers, snap, pip,
    systemctl, dpkg-buildpackage) and probe the host for
    executables and descriptor files.

  Security / Safety Notes:
    Privilege escalation is explicit: only commands marked as
    privileged are prefixed with sudo, and only when the
    current user is not already root.

  Dependencies:
    tokio::process for async command execution, which for PATH
    probing, libc for the effective UID check.

  Operational Scope:
    Every flow and the builder reach the operating system only
    through the Host trait, keeping flows testable.

  Revision History:
    2026-10-19 COD  Crafted host execution layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Reusable helpers for external command diagnostics
============================================================*/

#![allow(async_fn_in_trait)]

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{DistError, Result};

/// A single external command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub privileged: bool,
}

impl CommandSpec {
    pub fn new<P, I, S>(program: P, args: I) -> Self
    where
        P: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
            cwd: None,
            privileged: false,
        }
    }

    /// Mark the command as requiring elevated privileges.
    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            status: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(status: i32, stderr: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Convert a non-zero exit into a `CommandFailure` error.
    pub fn check(self, spec: &CommandSpec) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(DistError::CommandFailure {
                command: spec.to_string(),
                status: self.status.unwrap_or(-1),
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// How privileged commands are executed on this host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Privilege {
    /// Already running with effective UID 0.
    Root,
    /// Not root, `sudo` is available.
    Sudo,
    /// Not root and no escalation helper; commands run as-is.
    Unprivileged,
}

impl Privilege {
    /// Inspect the effective UID and the availability of `sudo`.
    pub fn detect<H: Host>(host: &H) -> Self {
        if host.is_root() {
            Privilege::Root
        } else if host.has_command("sudo") {
            Privilege::Sudo
        } else {
            Privilege::Unprivileged
        }
    }

    /// Rewrite a privileged command so it runs with elevated rights.
    pub fn apply(self, spec: CommandSpec) -> CommandSpec {
        if !spec.privileged || self != Privilege::Sudo {
            return spec;
        }
        let mut args = Vec::with_capacity(spec.args.len() + 1);
        args.push(spec.program);
        args.extend(spec.args);
        CommandSpec {
            program: "sudo".into(),
            args,
            cwd: spec.cwd,
            privileged: false,
        }
    }
}

/// Operating-system seam used by flows and the builder.
pub trait Host {
    /// Run a command to completion, capturing its output.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput>;

    /// Whether an executable is resolvable on PATH.
    fn has_command(&self, name: &str) -> bool;

    /// Read a text file, returning `None` when it is absent or unreadable.
    fn read_to_string(&self, path: &Path) -> Option<String>;

    /// Whether the process runs with effective UID 0.
    fn is_root(&self) -> bool;
}

/// The real operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemHost;

impl Host for SystemHost {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            command.current_dir(dir);
        }
        let output = command
            .output()
            .await
            .map_err(|err| map_spawn_error(err, &spec.program))?;

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn has_command(&self, name: &str) -> bool {
        which::which(name).is_ok()
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        std::fs::read_to_string(path).ok()
    }

    fn is_root(&self) -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail.
        unsafe { libc::geteuid() == 0 }
    }
}

/// Run a command and fail on a non-zero exit status.
pub async fn run_checked<H: Host>(host: &H, spec: &CommandSpec) -> Result<CommandOutput> {
    host.run(spec).await?.check(spec)
}

/// Run a command and report only whether it succeeded.
///
/// A missing executable counts as failure; other spawn errors propagate.
pub async fn probe<H: Host>(host: &H, spec: &CommandSpec) -> Result<bool> {
    match host.run(spec).await {
        Ok(output) => Ok(output.success()),
        Err(DistError::CommandMissing { .. }) => Ok(false),
        Err(err) => Err(err),
    }
}

fn map_spawn_error(err: io::Error, command: &str) -> DistError {
    if err.kind() == io::ErrorKind::NotFound {
        DistError::CommandMissing {
            command: command.into(),
        }
    } else {
        DistError::Runtime(format!("Failed to spawn {command}: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sudo_prefix_only_for_privileged_commands() {
        let install = CommandSpec::new("apt-get", ["install", "-y", "pcscd"]).privileged();
        let wrapped = Privilege::Sudo.apply(install.clone());
        assert_eq!(wrapped.to_string(), "sudo apt-get install -y pcscd");
        assert!(!wrapped.privileged);

        assert_eq!(Privilege::Root.apply(install.clone()), install);
        assert_eq!(Privilege::Unprivileged.apply(install.clone()), install);

        let query = CommandSpec::new("snap", ["list", "cardshell"]);
        assert_eq!(Privilege::Sudo.apply(query.clone()), query);
    }

    #[test]
    fn check_maps_failure_status() {
        let spec = CommandSpec::new("pip3", ["install", "--user", "cardshell"]);
        let err = CommandOutput::failed(2, "  no network \n")
            .check(&spec)
            .unwrap_err();
        match err {
            DistError::CommandFailure {
                command,
                status,
                stderr,
            } => {
                assert_eq!(command, "pip3 install --user cardshell");
                assert_eq!(status, 2);
                assert_eq!(stderr, "no network");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test]
    async fn system_host_captures_stdout() {
        let host = SystemHost;
        let output = host
            .run(&CommandSpec::new("sh", ["-c", "echo ready"]))
            .await
            .unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "ready");
    }

    #[tokio::test]
    async fn missing_program_maps_to_command_missing() {
        let host = SystemHost;
        let spec = CommandSpec::new("definitely_not_a_real_command_12345", Vec::<String>::new());
        let err = host.run(&spec).await.unwrap_err();
        assert!(matches!(err, DistError::CommandMissing { .. }));
        assert!(!probe(&host, &spec).await.unwrap());
    }

    #[test]
    fn has_command_finds_sh() {
        assert!(SystemHost.has_command("sh"));
        assert!(!SystemHost.has_command("definitely_not_a_real_command_12345"));
    }
}
