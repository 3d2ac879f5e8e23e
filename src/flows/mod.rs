/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Dispatch the installer's mutually exclusive modes and host
    the steps they share: dependency installation, pip
    invocations, snap and service handling.

  Security / Safety Notes:
    Mutating commands go through Environment::elevate; read-only
    probes never request escalation.

  Dependencies:
    crate::host, crate::fetch, crate::detect, crate::manager.

  Operational Scope:
    Invoked once per installer run with the mode chosen on the
    command line.

  Revision History:
    2026-10-19 COD  Authored flow dispatcher.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Warnings only where a step is explicitly optional
============================================================*/

mod deb;
mod native;
mod query;
mod setup;
mod snap;
mod uninstall;
mod update;

use std::fmt;
use std::path::PathBuf;

use crate::config::{DistConfig, EnvOverrides};
use crate::detect::Environment;
use crate::error::{DistError, Result};
use crate::fetch::Fetch;
use crate::host::{self, CommandOutput, CommandSpec, Host, Privilege};
use crate::logger::Logger;

pub use query::{ServiceState, StatusReport};
pub use setup::blacklist_contents;

/// Installer mode selected on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Native,
    Snap,
    Deb,
    Update,
    Uninstall,
    Version,
    Status,
    Setup,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Mode::Native => "native",
            Mode::Snap => "snap",
            Mode::Deb => "deb",
            Mode::Update => "update",
            Mode::Uninstall => "uninstall",
            Mode::Version => "version",
            Mode::Status => "status",
            Mode::Setup => "setup",
        };
        f.write_str(label)
    }
}

/// Installation channel the tool can live in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Snap,
    /// A system package (Debian package on apt hosts).
    System,
    /// User-scope pip installation.
    Pip,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Channel::Snap => "snap",
            Channel::System => "system package",
            Channel::Pip => "pip",
        };
        f.write_str(label)
    }
}

/// What a flow accomplished.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowOutcome {
    Installed {
        channel: Channel,
        version: Option<String>,
        /// Set when deb mode could not download and native mode ran instead.
        fell_back: bool,
    },
    Updated { channel: Channel },
    Removed { channels: Vec<Channel> },
    NotInstalled,
    Report(StatusReport),
    Configured { path: PathBuf, changed: bool },
}

/// Everything a flow needs from the outside world.
pub struct Context<'a, H, F> {
    pub host: &'a H,
    pub fetch: &'a F,
    pub config: &'a DistConfig,
    pub overrides: &'a EnvOverrides,
    pub logger: &'a Logger,
}

impl<'a, H: Host, F: Fetch> Context<'a, H, F> {
    /// Probe the host afresh and log the result.
    pub async fn detect(&self) -> Environment {
        let env = Environment::detect(self.host).await;
        self.logger.info("DETECT", format!("Host: {env}"));
        env
    }

    /// Probe the host for a flow that changes it; warns when neither root nor
    /// sudo is available, since every privileged step will then fail.
    pub async fn detect_for_changes(&self) -> Environment {
        let env = self.detect().await;
        if env.privilege == Privilege::Unprivileged {
            self.logger.warn(
                "PRIV",
                "Not root and sudo is unavailable; privileged steps will fail",
            );
        }
        env
    }

    /// Run a command (elevated if privileged); non-zero exit is an error.
    pub async fn run(&self, env: &Environment, spec: CommandSpec) -> Result<CommandOutput> {
        let spec = env.elevate(spec);
        self.logger.debug("EXEC", spec.to_string());
        host::run_checked(self.host, &spec).await
    }

    /// Run a command whose failure is only worth a warning.
    pub async fn run_optional(&self, env: &Environment, spec: CommandSpec, what: &str) -> bool {
        match self.run(env, spec).await {
            Ok(_) => true,
            Err(err) => {
                self.logger.warn("OPTIONAL", format!("{what} failed: {err}"));
                false
            }
        }
    }

    /// Run a read-only probe; `true` when it exits successfully.
    pub async fn probe(&self, spec: CommandSpec) -> Result<bool> {
        self.logger.debug("PROBE", spec.to_string());
        host::probe(self.host, &spec).await
    }

    /// Run a read-only query and return its stdout on success.
    pub async fn query(&self, spec: CommandSpec) -> Result<Option<String>> {
        self.logger.debug("QUERY", spec.to_string());
        match self.host.run(&spec).await {
            Ok(output) if output.success() => Ok(Some(output.stdout)),
            Ok(_) | Err(DistError::CommandMissing { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// Run the flow for `mode`.
pub async fn dispatch<H: Host, F: Fetch>(mode: Mode, ctx: &Context<'_, H, F>) -> Result<FlowOutcome> {
    ctx.logger.info("MODE", format!("Running {mode} mode"));
    match mode {
        Mode::Native => native::run(ctx).await,
        Mode::Snap => snap::run(ctx).await,
        Mode::Deb => deb::run(ctx).await,
        Mode::Update => update::run(ctx).await,
        Mode::Uninstall => uninstall::run(ctx).await,
        Mode::Version => query::run(ctx, false).await,
        Mode::Status => query::run(ctx, true).await,
        Mode::Setup => setup::run(ctx).await,
    }
}

/// Refresh metadata and install the manager's runtime dependencies.
///
/// Packages are installed one at a time so a failure names exactly which
/// ones are missing; every package is attempted before the error is raised.
pub(crate) async fn install_system_dependencies<H: Host, F: Fetch>(
    ctx: &Context<'_, H, F>,
    env: &Environment,
) -> Result<()> {
    let manager = env.manager;
    let (Some(refresh), deps) = (manager.refresh(), manager.runtime_dependencies()) else {
        ctx.logger.warn(
            "DEPS",
            "No supported package manager found; install pcsc-lite and pip manually",
        );
        return Ok(());
    };

    ctx.logger.info("DEPS", format!("Refreshing {manager} metadata"));
    ctx.run(env, refresh).await?;

    let mut failed = Vec::new();
    for dep in deps {
        let Some(spec) = manager.install(&[dep]) else {
            continue;
        };
        if let Err(err) = ctx.run(env, spec).await {
            ctx.logger.error("DEPS", format!("{dep}: {err}"));
            failed.push(dep.to_string());
        }
    }

    let installed = deps.len() - failed.len();
    if failed.is_empty() {
        ctx.logger.success(
            "DEPS",
            format!("{installed} of {} dependencies installed", deps.len()),
        );
        Ok(())
    } else {
        Err(DistError::PartialDependencies {
            installed,
            total: deps.len(),
            failed,
        })
    }
}

/// Enable and start the smart-card service; failure is a warning.
pub(crate) async fn enable_service<H: Host, F: Fetch>(ctx: &Context<'_, H, F>, env: &Environment) {
    match env.manager.service_enable(&ctx.config.service_name) {
        Some(spec) => {
            if ctx
                .run_optional(env, spec, &format!("Enabling {}", ctx.config.service_name))
                .await
            {
                ctx.logger
                    .success("SERVICE", format!("{} enabled", ctx.config.service_name));
            }
        }
        None => ctx.logger.warn(
            "SERVICE",
            format!("Enable {} manually on this host", ctx.config.service_name),
        ),
    }
}

pub(crate) fn pip_install<S: AsRef<str>>(packages: &[S], upgrade: bool) -> CommandSpec {
    let mut spec = CommandSpec::new("python3", ["-m", "pip", "install", "--user"]);
    if upgrade {
        spec = spec.arg("--upgrade");
    }
    for package in packages {
        spec = spec.arg(package.as_ref());
    }
    spec
}

pub(crate) fn pip_show(package: &str) -> CommandSpec {
    CommandSpec::new("python3", ["-m", "pip", "show", package])
}

pub(crate) fn pip_uninstall(package: &str) -> CommandSpec {
    CommandSpec::new("python3", ["-m", "pip", "uninstall", "-y", package])
}

/// `Version:` field of `pip show` output.
pub(crate) fn parse_pip_version(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        (key.trim() == "Version").then(|| value.trim().to_string())
    })
}

pub(crate) fn snap_list(name: &str) -> CommandSpec {
    CommandSpec::new("snap", ["list", name])
}

/// Version column of `snap list <name>` output.
pub(crate) fn parse_snap_version(stdout: &str, name: &str) -> Option<String> {
    stdout.lines().skip(1).find_map(|line| {
        let mut columns = line.split_whitespace();
        (columns.next()? == name).then(|| columns.next().map(str::to_string))?
    })
}
