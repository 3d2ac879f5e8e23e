/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::detect
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Classify the host: operating system identity, package
    manager, snap availability, CPU architecture and privilege
    mode, captured in one immutable descriptor.

  Security / Safety Notes:
    Detection is read-only; it inspects files and PATH and runs
    `uname` only.

  Dependencies:
    crate::host for probing, crate::manager for probe order.

  Operational Scope:
    Computed at the start of each flow and passed explicitly to
    every step that depends on the host.

  Revision History:
    2026-10-19 COD  Authored environment detection.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Immutable value objects instead of global state
    - Deterministic fallbacks for unknown hosts
============================================================*/

use std::fmt;
use std::path::Path;

use crate::host::{CommandSpec, Host, Privilege};
use crate::manager::PackageManager;

const OS_RELEASE: &str = "/etc/os-release";

/// Operating system identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OsInfo {
    pub id: String,
    pub version: String,
    pub name: String,
}

impl OsInfo {
    /// Parse an os-release descriptor. Returns `None` when it carries no `ID`.
    pub fn from_os_release(contents: &str) -> Option<Self> {
        let mut id = None;
        let mut version = None;
        let mut pretty = None;
        let mut name = None;

        for line in contents.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some((key, value)) = line.split_once('=') {
                let value = unquote(value.trim());
                match key.trim() {
                    "ID" => id = Some(value.to_ascii_lowercase()),
                    "VERSION_ID" => version = Some(value),
                    "PRETTY_NAME" => pretty = Some(value),
                    "NAME" => name = Some(value),
                    _ => {}
                }
            }
        }

        let id = id.filter(|value| !value.is_empty())?;
        let name = pretty.or(name).unwrap_or_else(|| id.clone());
        Some(Self {
            id,
            version: version.unwrap_or_default(),
            name,
        })
    }

    /// Fallback identity built from kernel-reported values.
    pub fn from_kernel(system: &str, release: &str) -> Self {
        let system = system.trim();
        let release = release.trim();
        Self {
            id: system.to_ascii_lowercase(),
            version: release.to_string(),
            name: format!("{system} {release}").trim().to_string(),
        }
    }
}

fn unquote(value: &str) -> String {
    value
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')))
        .unwrap_or(value)
        .to_string()
}

/// Map a kernel machine type to the release naming convention.
pub fn canonical_arch(machine: &str) -> String {
    match machine.trim() {
        "x86_64" | "amd64" => "amd64".to_string(),
        "aarch64" | "arm64" => "arm64".to_string(),
        other => other.to_string(),
    }
}

/// Immutable description of the host a flow runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Environment {
    pub os: OsInfo,
    pub manager: PackageManager,
    pub snap_available: bool,
    pub arch: String,
    pub privilege: Privilege,
}

impl Environment {
    /// Probe the host. Never fails; unknown values degrade to fallbacks.
    pub async fn detect<H: Host>(host: &H) -> Self {
        let os = match host
            .read_to_string(Path::new(OS_RELEASE))
            .and_then(|contents| OsInfo::from_os_release(&contents))
        {
            Some(os) => os,
            None => {
                let system = uname(host, "-s").await.unwrap_or_else(|| "unknown".into());
                let release = uname(host, "-r").await.unwrap_or_default();
                OsInfo::from_kernel(&system, &release)
            }
        };

        let machine = uname(host, "-m")
            .await
            .unwrap_or_else(|| std::env::consts::ARCH.to_string());

        Self {
            os,
            manager: detect_manager(host),
            snap_available: host.has_command("snap"),
            arch: canonical_arch(&machine),
            privilege: Privilege::detect(host),
        }
    }

    /// Release target used for prebuilt Debian packages.
    pub fn deb_target(&self) -> &'static str {
        if self.os.id == "ubuntu" && self.os.version.starts_with("24.") {
            "ubuntu-24.04"
        } else {
            "ubuntu-22.04"
        }
    }

    /// Apply this host's privilege mode to a command.
    pub fn elevate(&self, spec: CommandSpec) -> CommandSpec {
        self.privilege.apply(spec)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}), manager={}, snap={}, arch={}",
            self.os.name,
            self.os.id,
            self.os.version,
            self.manager,
            if self.snap_available { "yes" } else { "no" },
            self.arch
        )
    }
}

/// First manager in probe order whose executable exists.
pub fn detect_manager<H: Host>(host: &H) -> PackageManager {
    PackageManager::PROBE_ORDER
        .into_iter()
        .find(|manager| {
            manager
                .executable()
                .is_some_and(|exe| host.has_command(exe))
        })
        .unwrap_or(PackageManager::Unknown)
}

async fn uname<H: Host>(host: &H, flag: &str) -> Option<String> {
    let output = host.run(&CommandSpec::new("uname", [flag])).await.ok()?;
    let value = output.stdout.trim();
    if output.success() && !value.is_empty() {
        Some(value.to_string())
    } else {
        None
    }
}
