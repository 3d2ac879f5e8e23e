/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::version
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Validate release version strings and resolve the target
    version from arguments, environment and the package index.

  Security / Safety Notes:
    Validation happens before any version string reaches a URL
    or a filesystem path.

  Dependencies:
    regex for the release pattern.

  Operational Scope:
    Used by the builder at start-up and by deb mode before
    composing release URLs.

  Revision History:
    2026-10-19 COD  Authored version validation.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Validate first, act second
    - Explicit provenance for resolved values
============================================================*/

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{DistError, Result};

const VERSION_PATTERN: &str = r"^\d+\.\d+\.\d+(-[A-Za-z0-9.]+)?$";

fn version_regex() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(VERSION_PATTERN).expect("version pattern is valid"))
}

/// A validated release version (`MAJOR.MINOR.PATCH[-PRERELEASE]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Version(String);

impl Version {
    /// Validate and wrap a version string.
    pub fn parse(raw: &str) -> Result<Self> {
        if version_regex().is_match(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(DistError::InvalidVersion(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Version {
    type Err = DistError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSource {
    Argument,
    Environment,
    PackageIndex,
    Default,
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            VersionSource::Argument => "argument",
            VersionSource::Environment => "environment",
            VersionSource::PackageIndex => "package index",
            VersionSource::Default => "default",
        };
        f.write_str(label)
    }
}

/// Pick the first available candidate and validate it.
///
/// Candidates are consulted in order: explicit argument, environment override,
/// package-index answer, built-in default. Only the chosen value is validated;
/// an invalid choice is an error rather than a reason to fall through.
pub fn resolve(
    argument: Option<&str>,
    environment: Option<&str>,
    index: Option<&str>,
    default: &str,
) -> Result<(Version, VersionSource)> {
    let (raw, source) = if let Some(value) = argument {
        (value, VersionSource::Argument)
    } else if let Some(value) = environment {
        (value, VersionSource::Environment)
    } else if let Some(value) = index {
        (value, VersionSource::PackageIndex)
    } else {
        (default, VersionSource::Default)
    };
    Ok((Version::parse(raw.trim())?, source))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_release_and_prerelease() {
        for raw in ["1.0.3", "2.0.0", "10.20.30", "1.0.0-rc.1", "0.9.1-beta2"] {
            assert!(Version::parse(raw).is_ok(), "{raw} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_versions() {
        for raw in ["1.0", "v1.0.3", "1.0.3.4", "", "1.0.3-", "1.0.3-rc_1", "1.a.3"] {
            let err = Version::parse(raw).unwrap_err();
            assert!(matches!(err, DistError::InvalidVersion(_)), "{raw}");
        }
    }

    #[test]
    fn resolve_prefers_argument_then_environment() {
        let (version, source) = resolve(Some("2.0.0"), Some("3.0.0"), None, "1.0.3").unwrap();
        assert_eq!(version.as_str(), "2.0.0");
        assert_eq!(source, VersionSource::Argument);

        let (version, source) = resolve(None, Some("3.0.0"), Some("4.0.0"), "1.0.3").unwrap();
        assert_eq!(version.as_str(), "3.0.0");
        assert_eq!(source, VersionSource::Environment);

        let (version, source) = resolve(None, None, Some("4.0.0"), "1.0.3").unwrap();
        assert_eq!(version.as_str(), "4.0.0");
        assert_eq!(source, VersionSource::PackageIndex);

        let (version, source) = resolve(None, None, None, "1.0.3").unwrap();
        assert_eq!(version.as_str(), "1.0.3");
        assert_eq!(source, VersionSource::Default);
    }

    #[test]
    fn resolve_does_not_skip_invalid_choice() {
        assert!(resolve(Some("v2"), None, None, "1.0.3").is_err());
    }
}
