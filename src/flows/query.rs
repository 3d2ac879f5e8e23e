/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows::query
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Version and status modes: read-only inspection of every
    channel and of the smart-card service.

  Security / Safety Notes:
    Never escalates; only read-only probes run.

  Dependencies:
    crate::flows shared query helpers.

  Operational Scope:
    --version and --status.

  Revision History:
    2026-10-19 COD  Authored status report.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Repeated queries of unchanged state render identically
============================================================*/

use std::fmt::Write as _;

use super::{parse_pip_version, parse_snap_version, pip_show, snap_list, Context, FlowOutcome};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::host::{CommandSpec, Host};

/// Running state reported by `systemctl is-active`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Active,
    Inactive(String),
    Unknown,
}

/// Snapshot of installed versions and reader prerequisites.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub host: String,
    pub snap: Option<String>,
    pub system: Option<String>,
    pub pip: Option<String>,
    pub binary: Option<String>,
    /// Only gathered in status mode.
    pub service: Option<ServiceState>,
    pub blacklist_installed: Option<bool>,
}

impl StatusReport {
    pub fn is_installed(&self) -> bool {
        self.snap.is_some() || self.system.is_some() || self.pip.is_some()
    }

    /// Plain-text rendering printed to stdout.
    pub fn render(&self) -> String {
        let show = |value: &Option<String>| value.clone().unwrap_or_else(|| "not installed".into());
        let mut out = String::new();
        let _ = writeln!(out, "Host:            {}", self.host);
        let _ = writeln!(out, "Snap:            {}", show(&self.snap));
        let _ = writeln!(out, "System package:  {}", show(&self.system));
        let _ = writeln!(out, "Pip:             {}", show(&self.pip));
        let _ = writeln!(
            out,
            "On PATH:         {}",
            self.binary.clone().unwrap_or_else(|| "not found".into())
        );
        if let Some(service) = &self.service {
            let state = match service {
                ServiceState::Active => "active".to_string(),
                ServiceState::Inactive(state) => state.clone(),
                ServiceState::Unknown => "unknown".to_string(),
            };
            let _ = writeln!(out, "Service:         {state}");
        }
        if let Some(blacklist) = self.blacklist_installed {
            let _ = writeln!(
                out,
                "NFC blacklist:   {}",
                if blacklist { "installed" } else { "missing (run --setup)" }
            );
        }
        out
    }
}

pub(super) async fn run<H: Host, F: Fetch>(
    ctx: &Context<'_, H, F>,
    with_service: bool,
) -> Result<FlowOutcome> {
    let env = ctx.detect().await;
    let config = ctx.config;

    let snap = if env.snap_available {
        ctx.query(snap_list(&config.snap_name))
            .await?
            .and_then(|out| parse_snap_version(&out, &config.snap_name))
    } else {
        None
    };

    let system = match env.manager.query_version(&config.deb_package) {
        Some(spec) => ctx
            .query(spec)
            .await?
            .and_then(|out| env.manager.parse_version(&out)),
        None => None,
    };

    let pip = ctx
        .query(pip_show(&config.pypi_package))
        .await?
        .and_then(|out| parse_pip_version(&out));

    let binary = if ctx.host.has_command(&config.binary_name) {
        ctx.query(CommandSpec::new(config.binary_name.as_str(), ["--version"]))
            .await?
            .and_then(|out| out.lines().next().map(|line| line.trim().to_string()))
            .filter(|line| !line.is_empty())
    } else {
        None
    };

    let (service, blacklist_installed) = if with_service {
        let state = if ctx.host.has_command("systemctl") {
            service_state(ctx, &config.service_name).await?
        } else {
            ServiceState::Unknown
        };
        let blacklist = ctx.host.read_to_string(&config.blacklist_path).is_some();
        (Some(state), Some(blacklist))
    } else {
        (None, None)
    };

    let report = StatusReport {
        host: env.os.name.clone(),
        snap,
        system,
        pip,
        binary,
        service,
        blacklist_installed,
    };
    if !report.is_installed() {
        ctx.logger
            .warn("QUERY", format!("{} is not installed", config.pypi_package));
    }
    Ok(FlowOutcome::Report(report))
}

/// `systemctl is-active` exits non-zero for anything but active; its stdout
/// still names the state.
async fn service_state<H: Host, F: Fetch>(
    ctx: &Context<'_, H, F>,
    service: &str,
) -> Result<ServiceState> {
    let output = ctx
        .host
        .run(&CommandSpec::new("systemctl", ["is-active", service]))
        .await?;
    Ok(match output.stdout.trim() {
        "active" => ServiceState::Active,
        "" => ServiceState::Inactive("inactive".into()),
        other => ServiceState::Inactive(other.to_string()),
    })
}
