/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Distribution tooling for the CardShell smart-card CLI: the
    universal installer and the Debian package builder share
    host probing, command execution and logging from here.

  Security / Safety Notes:
    All privileged work is funnelled through host::Privilege.
    Network access is limited to the package index and the
    project's release downloads.

  Dependencies:
    tokio, reqwest, clap (binaries), serde/toml, thiserror.

  Operational Scope:
    Linked by cardshell-install and cardshell-build-deb.

  Revision History:
    2026-10-19 COD  Authored library surface.
  ------------------------------------------------------------
  SSE Principles Observed:
    - One seam per side effect: Host for processes, Fetch for HTTP
    - Result-first error handling with deterministic exits
============================================================*/

pub mod builder;
pub mod checksum;
pub mod config;
pub mod detect;
pub mod error;
pub mod fetch;
pub mod flows;
pub mod host;
pub mod logger;
pub mod manager;
pub mod pypi;
pub mod version;

#[cfg(test)]
mod testing;
