/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::manager
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Describe every supported system package manager: how to
    probe for it, refresh metadata, install, remove and query
    packages, which runtime dependencies it needs, and how the
    smart-card service is enabled.

  Security / Safety Notes:
    All mutating commands are marked privileged; read-only
    queries never request escalation.

  Dependencies:
    None beyond crate::host.

  Operational Scope:
    Consulted by detection (probe order) and by every flow that
    touches system packages.

  Revision History:
    2026-10-19 COD  Introduced closed package-manager table.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Exhaustive matching over a closed set of managers
    - Non-interactive invocations only
============================================================*/

use std::fmt;

use crate::host::CommandSpec;

/// Supported system package managers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Pacman,
    Zypper,
    Unknown,
}

impl PackageManager {
    /// Probe order; the first manager whose executable exists wins.
    pub const PROBE_ORDER: [PackageManager; 5] = [
        PackageManager::Apt,
        PackageManager::Dnf,
        PackageManager::Yum,
        PackageManager::Pacman,
        PackageManager::Zypper,
    ];

    /// Executable used to detect and drive this manager.
    pub fn executable(self) -> Option<&'static str> {
        match self {
            PackageManager::Apt => Some("apt-get"),
            PackageManager::Dnf => Some("dnf"),
            PackageManager::Yum => Some("yum"),
            PackageManager::Pacman => Some("pacman"),
            PackageManager::Zypper => Some("zypper"),
            PackageManager::Unknown => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PackageManager::Apt => "apt",
            PackageManager::Dnf => "dnf",
            PackageManager::Yum => "yum",
            PackageManager::Pacman => "pacman",
            PackageManager::Zypper => "zypper",
            PackageManager::Unknown => "unknown",
        }
    }

    /// Refresh package metadata.
    pub fn refresh(self) -> Option<CommandSpec> {
        let spec = match self {
            PackageManager::Apt => CommandSpec::new("apt-get", ["update"]),
            PackageManager::Dnf => CommandSpec::new("dnf", ["makecache"]),
            PackageManager::Yum => CommandSpec::new("yum", ["makecache"]),
            PackageManager::Pacman => CommandSpec::new("pacman", ["-Sy"]),
            PackageManager::Zypper => CommandSpec::new("zypper", ["--non-interactive", "refresh"]),
            PackageManager::Unknown => return None,
        };
        Some(spec.privileged())
    }

    fn install_base(self) -> Option<CommandSpec> {
        let spec = match self {
            PackageManager::Apt => CommandSpec::new("apt-get", ["install", "-y"]),
            PackageManager::Dnf => CommandSpec::new("dnf", ["install", "-y"]),
            PackageManager::Yum => CommandSpec::new("yum", ["install", "-y"]),
            PackageManager::Pacman => {
                CommandSpec::new("pacman", ["-S", "--noconfirm", "--needed"])
            }
            PackageManager::Zypper => CommandSpec::new("zypper", ["--non-interactive", "install"]),
            PackageManager::Unknown => return None,
        };
        Some(spec.privileged())
    }

    /// Install the given packages non-interactively.
    pub fn install<S: AsRef<str>>(self, packages: &[S]) -> Option<CommandSpec> {
        let mut spec = self.install_base()?;
        spec.args
            .extend(packages.iter().map(|pkg| pkg.as_ref().to_string()));
        Some(spec)
    }

    /// Remove a package non-interactively.
    pub fn remove(self, package: &str) -> Option<CommandSpec> {
        let spec = match self {
            PackageManager::Apt => CommandSpec::new("apt-get", ["remove", "-y", package]),
            PackageManager::Dnf => CommandSpec::new("dnf", ["remove", "-y", package]),
            PackageManager::Yum => CommandSpec::new("yum", ["remove", "-y", package]),
            PackageManager::Pacman => CommandSpec::new("pacman", ["-R", "--noconfirm", package]),
            PackageManager::Zypper => {
                CommandSpec::new("zypper", ["--non-interactive", "remove", package])
            }
            PackageManager::Unknown => return None,
        };
        Some(spec.privileged())
    }

    /// Read-only query printing the installed version of `package`.
    pub fn query_version(self, package: &str) -> Option<CommandSpec> {
        match self {
            PackageManager::Apt => Some(CommandSpec::new(
                "dpkg-query",
                ["-W", "-f=${db:Status-Abbrev} ${Version}", package],
            )),
            PackageManager::Dnf | PackageManager::Yum | PackageManager::Zypper => Some(
                CommandSpec::new("rpm", ["-q", "--qf", "%{VERSION}-%{RELEASE}", package]),
            ),
            PackageManager::Pacman => Some(CommandSpec::new("pacman", ["-Q", package])),
            PackageManager::Unknown => None,
        }
    }

    /// Extract the version from `query_version` output.
    pub fn parse_version(self, stdout: &str) -> Option<String> {
        let line = stdout.lines().map(str::trim).find(|line| !line.is_empty())?;
        let version = match self {
            // `pacman -Q` prints `<name> <version>`.
            PackageManager::Pacman => line.split_whitespace().nth(1)?,
            // dpkg keeps removed packages with config files as `rc`; only `ii` is installed.
            PackageManager::Apt => {
                let (status, version) = line.split_once(char::is_whitespace)?;
                if status != "ii" {
                    return None;
                }
                version.trim()
            }
            _ => line,
        };
        if version.is_empty() {
            return None;
        }
        Some(version.to_string())
    }

    /// Runtime dependencies for the smart-card CLI.
    pub fn runtime_dependencies(self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => &["pcscd", "libpcsclite1", "pcsc-tools", "python3-pip"],
            PackageManager::Dnf | PackageManager::Yum => {
                &["pcsc-lite", "pcsc-lite-ccid", "pcsc-tools", "python3-pip"]
            }
            PackageManager::Pacman => &["pcsclite", "ccid", "pcsc-tools", "python-pip"],
            PackageManager::Zypper => &["pcsc-lite", "pcsc-ccid", "pcsc-tools", "python3-pip"],
            PackageManager::Unknown => &[],
        }
    }

    /// Packages needed to build the Debian package; only apt hosts build.
    pub fn build_dependencies(self) -> &'static [&'static str] {
        match self {
            PackageManager::Apt => &[
                "build-essential",
                "debhelper",
                "dh-python",
                "python3-all",
                "python3-setuptools",
                "python3-pip",
                "pybuild-plugin-pyproject",
                "devscripts",
            ],
            _ => &[],
        }
    }

    /// Enable and start the smart-card service.
    pub fn service_enable(self, service: &str) -> Option<CommandSpec> {
        match self {
            PackageManager::Unknown => None,
            _ => Some(CommandSpec::new("systemctl", ["enable", "--now", service]).privileged()),
        }
    }
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_order_is_fixed() {
        let labels: Vec<&str> = PackageManager::PROBE_ORDER
            .iter()
            .map(|manager| manager.label())
            .collect();
        assert_eq!(labels, ["apt", "dnf", "yum", "pacman", "zypper"]);
    }

    #[test]
    fn install_commands_are_privileged_and_non_interactive() {
        let spec = PackageManager::Pacman.install(&["ccid"]).unwrap();
        assert!(spec.privileged);
        assert_eq!(spec.to_string(), "pacman -S --noconfirm --needed ccid");

        let spec = PackageManager::Apt.install(&["pcscd", "pcsc-tools"]).unwrap();
        assert_eq!(spec.to_string(), "apt-get install -y pcscd pcsc-tools");
    }

    #[test]
    fn unknown_manager_has_no_commands() {
        let unknown = PackageManager::Unknown;
        assert!(unknown.executable().is_none());
        assert!(unknown.refresh().is_none());
        assert!(unknown.install(&["pcscd"]).is_none());
        assert!(unknown.remove("cardshell").is_none());
        assert!(unknown.runtime_dependencies().is_empty());
        assert!(unknown.build_dependencies().is_empty());
        assert!(unknown.service_enable("pcscd").is_none());
    }

    #[test]
    fn every_known_manager_lists_dependencies() {
        for manager in PackageManager::PROBE_ORDER {
            assert!(!manager.runtime_dependencies().is_empty(), "{manager}");
            assert!(manager.query_version("cardshell").is_some());
        }
    }

    #[test]
    fn version_parsing_per_manager() {
        assert_eq!(
            PackageManager::Pacman.parse_version("cardshell 1.0.3-1\n"),
            Some("1.0.3-1".into())
        );
        assert_eq!(
            PackageManager::Apt.parse_version("ii  2.0.0-1"),
            Some("2.0.0-1".into())
        );
        assert_eq!(PackageManager::Dnf.parse_version("\n"), None);
    }

    #[test]
    fn removed_deb_with_leftover_config_is_not_installed() {
        assert_eq!(PackageManager::Apt.parse_version("rc  2.0.0-1"), None);
        assert_eq!(PackageManager::Apt.parse_version("un "), None);
        assert_eq!(PackageManager::Apt.parse_version("ii "), None);
        assert_eq!(
            PackageManager::Apt.query_version("cardshell").unwrap().to_string(),
            "dpkg-query -W -f=${db:Status-Abbrev} ${Version} cardshell"
        );
    }
}
