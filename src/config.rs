/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load distribution settings (package names, endpoints,
    paths) from an optional TOML file and read the process
    environment overrides used by the installer and builder.

  Security / Safety Notes:
    Configuration is read-only; unknown keys are rejected so a
    mistyped endpoint never silently falls back to a default.

  Dependencies:
    serde + toml for parsing, dirs for the XDG config location.

  Operational Scope:
    Resolved once at start-up by both binaries and passed by
    reference into every flow.

  Revision History:
    2026-10-19 COD  Introduced distribution configuration.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic defaults with explicit overrides
    - Strict parsing with actionable diagnostics
============================================================*/

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{DistError, Result};

pub const ENV_VERSION: &str = "CARDSHELL_VERSION";
pub const ENV_WORK_DIR: &str = "CARDSHELL_WORK_DIR";
pub const ENV_SKIP_DEPS: &str = "CARDSHELL_SKIP_DEPS";
pub const ENV_CI: &str = "CI";
pub const ENV_WORKSPACE: &str = "GITHUB_WORKSPACE";

/// Top-level distribution settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DistConfig {
    /// Project name on the package index.
    pub pypi_package: String,
    /// Snap name in the store.
    pub snap_name: String,
    /// Debian binary package name.
    pub deb_package: String,
    /// Executable installed by every channel.
    pub binary_name: String,
    /// Version baked into the packaging metadata.
    pub default_version: String,
    /// Debian revision appended to the upstream version.
    pub debian_revision: String,
    pub pypi_files_url: String,
    pub pypi_api_url: String,
    /// Release directory; `{version}` is substituted.
    pub release_url: String,
    pub checksum_manifest: String,
    pub connect_timeout_secs: u64,
    pub blacklist_path: PathBuf,
    pub blacklisted_modules: Vec<String>,
    pub service_name: String,
    pub snap_interfaces: Vec<String>,
    /// Extra packages installed with pip after a deb install.
    pub supplementary_pip: Vec<String>,
    pub deb_fallback_to_native: bool,
    pub packaging_dir: Option<PathBuf>,
}

impl Default for DistConfig {
    fn default() -> Self {
        Self {
            pypi_package: "cardshell".into(),
            snap_name: "cardshell".into(),
            deb_package: "cardshell".into(),
            binary_name: "cardshell".into(),
            default_version: "1.0.3".into(),
            debian_revision: "1".into(),
            pypi_files_url: "https://files.pythonhosted.org/packages/source".into(),
            pypi_api_url: "https://pypi.org/pypi".into(),
            release_url: "https://github.com/cardshell/cardshell/releases/download/v{version}"
                .into(),
            checksum_manifest: "SHA256SUMS".into(),
            connect_timeout_secs: 10,
            blacklist_path: PathBuf::from("/etc/modprobe.d/blacklist-cardshell-nfc.conf"),
            blacklisted_modules: vec!["pn533".into(), "pn533_usb".into(), "nfc".into()],
            service_name: "pcscd".into(),
            snap_interfaces: vec!["raw-usb".into(), "pcscd".into()],
            supplementary_pip: vec!["pyscard".into()],
            deb_fallback_to_native: true,
            packaging_dir: None,
        }
    }
}

impl DistConfig {
    /// Load configuration from an explicit path, or the default location if present.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load(explicit),
            None => match default_config_path() {
                Some(candidate) if candidate.is_file() => Self::load(&candidate),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            DistError::Config(format!("Failed to read {}: {err}", path.display()))
        })?;
        Self::from_toml(&raw)
            .map_err(|err| DistError::Config(format!("{}: {err}", path.display())))
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(raw).map_err(|err| DistError::Config(err.to_string()))?;
        if config.connect_timeout_secs == 0 {
            return Err(DistError::Config(
                "connect_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(config)
    }

    /// Release directory URL for a given version.
    pub fn release_dir(&self, version: &str) -> String {
        self.release_url
            .replace("{version}", version)
            .trim_end_matches('/')
            .to_string()
    }

    /// Debian version string (`<upstream>-<revision>`).
    pub fn debian_version(&self, upstream: &str) -> String {
        format!("{upstream}-{}", self.debian_revision)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("cardshell").join("dist.toml"))
}

/// Environment overrides consumed by the installer and builder.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub version: Option<String>,
    pub work_dir: Option<PathBuf>,
    pub skip_deps: bool,
    pub ci: bool,
    pub workspace: Option<PathBuf>,
}

impl EnvOverrides {
    /// Read overrides from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read overrides through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        Self {
            version: non_empty(ENV_VERSION).map(|value| value.trim().to_string()),
            work_dir: non_empty(ENV_WORK_DIR).map(PathBuf::from),
            skip_deps: non_empty(ENV_SKIP_DEPS).is_some_and(|value| is_truthy(&value)),
            ci: non_empty(ENV_CI).is_some_and(|value| is_truthy(&value)),
            workspace: non_empty(ENV_WORKSPACE).map(PathBuf::from),
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = DistConfig::from_toml(
            r#"
            snap_name = "cardshell-edge"
            deb_fallback_to_native = false
            "#,
        )
        .unwrap();
        assert_eq!(config.snap_name, "cardshell-edge");
        assert!(!config.deb_fallback_to_native);
        assert_eq!(config.pypi_package, "cardshell");
        assert_eq!(config.default_version, "1.0.3");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = DistConfig::from_toml("snap = \"x\"").unwrap_err();
        assert!(matches!(err, DistError::Config(_)));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(DistConfig::from_toml("connect_timeout_secs = 0").is_err());
    }

    #[test]
    fn release_dir_substitutes_version() {
        let config = DistConfig::default();
        assert_eq!(
            config.release_dir("2.0.0"),
            "https://github.com/cardshell/cardshell/releases/download/v2.0.0"
        );
        assert_eq!(config.debian_version("2.0.0"), "2.0.0-1");
    }

    #[test]
    fn env_overrides_parse_flags() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_VERSION, " 2.1.0 "),
            (ENV_SKIP_DEPS, "yes"),
            (ENV_CI, "true"),
            (ENV_WORKSPACE, "/github/workspace"),
            (ENV_WORK_DIR, ""),
        ]);
        let overrides = EnvOverrides::from_lookup(|key| vars.get(key).map(|v| v.to_string()));
        assert_eq!(overrides.version.as_deref(), Some("2.1.0"));
        assert!(overrides.skip_deps);
        assert!(overrides.ci);
        assert_eq!(overrides.work_dir, None);
        assert_eq!(
            overrides.workspace,
            Some(PathBuf::from("/github/workspace"))
        );
    }

    #[test]
    fn falsy_flags_stay_off() {
        let overrides = EnvOverrides::from_lookup(|key| match key {
            ENV_SKIP_DEPS => Some("0".into()),
            ENV_CI => Some("false".into()),
            _ => None,
        });
        assert!(!overrides.skip_deps);
        assert!(!overrides.ci);
    }
}
