/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::error
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Centralise installer and builder error types to provide
    consistent diagnostics and exit semantics.

  Security / Safety Notes:
    Error contexts expose command lines, paths and URLs only;
    no credentials are ever part of an error payload.

  Dependencies:
    thiserror for ergonomic error definitions.

  Operational Scope:
    Used across modules to propagate recoverable failures and
    consolidate exit codes for both binary entry points.

  Revision History:
    2026-10-19 COD  Established shared error definitions.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit error taxonomy with actionable context
    - No silent failure paths
    - Stable exit codes for operational tooling
============================================================*/

use std::io;
use std::process::ExitCode;

use thiserror::Error;

/// Result alias for CardShell distribution operations.
pub type Result<T> = std::result::Result<T, DistError>;

/// Enumerates high-level error domains surfaced by the installer and builder.
#[derive(Debug, Error)]
pub enum DistError {
    #[error("Invalid version `{0}`: expected MAJOR.MINOR.PATCH[-PRERELEASE]")]
    InvalidVersion(String),
    #[error("Required command `{command}` not found in PATH")]
    CommandMissing { command: String },
    #[error("Command `{command}` failed with status {status}: {stderr}")]
    CommandFailure {
        command: String,
        status: i32,
        stderr: String,
    },
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Network: {0}")]
    Network(String),
    #[error("Serialization: {0}")]
    Serialization(String),
    #[error("Filesystem: {0}")]
    Filesystem(String),
    #[error("Missing resource: {0}")]
    MissingResource(String),
    #[error("Unsupported environment: {0}")]
    Unsupported(String),
    #[error("Checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("Dependencies: {installed} of {total} installed (failed: {})", .failed.join(", "))]
    PartialDependencies {
        installed: usize,
        total: usize,
        failed: Vec<String>,
    },
    #[error("Runtime: {0}")]
    Runtime(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl DistError {
    /// Every fatal condition terminates with status 1.
    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(1)
    }

    /// Short tag used as the log code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            DistError::InvalidVersion(_) => "VERSION",
            DistError::CommandMissing { .. } => "CMD404",
            DistError::CommandFailure { .. } => "CMDFAIL",
            DistError::Config(_) => "CONFIG",
            DistError::Network(_) => "NETWORK",
            DistError::Serialization(_) => "DECODE",
            DistError::Filesystem(_) => "FS",
            DistError::MissingResource(_) => "MISSING",
            DistError::Unsupported(_) => "UNSUPPORTED",
            DistError::ChecksumMismatch { .. } => "CHECKSUM",
            DistError::PartialDependencies { .. } => "DEPS",
            DistError::Runtime(_) => "RUNTIME",
            DistError::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_dependencies_lists_failures() {
        let err = DistError::PartialDependencies {
            installed: 3,
            total: 4,
            failed: vec!["pcsc-tools".into()],
        };
        assert_eq!(
            err.to_string(),
            "Dependencies: 3 of 4 installed (failed: pcsc-tools)"
        );
        assert_eq!(err.code(), "DEPS");
    }
}
