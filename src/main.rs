/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::main (cardshell-install)
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Universal installer entry point. Parses the mode flag,
    detects the host and dispatches exactly one flow: native,
    snap, deb, update, uninstall, version, status or setup.

  Security / Safety Notes:
    Escalates through sudo only for mutating commands when not
    already root. Read-only modes never escalate.

  Dependencies:
    clap for CLI parsing, tokio for the runtime and Ctrl-C.

  Operational Scope:
    Run by operators directly or piped from the release page.

  Revision History:
    2026-10-19 COD  Authored installer runtime.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Result-first error handling with deterministic exits
    - Structured logging following Synavera cadence
    - Configurable execution via CLI and config file
============================================================*/

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, ArgGroup, Parser};

use cardshell_dist::config::{DistConfig, EnvOverrides};
use cardshell_dist::error::{DistError, Result};
use cardshell_dist::fetch::HttpFetcher;
use cardshell_dist::flows::{dispatch, Context, FlowOutcome, Mode};
use cardshell_dist::host::SystemHost;
use cardshell_dist::logger::Logger;

/// Command-line arguments for cardshell-install.
#[derive(Debug, Parser)]
#[command(
    name = "cardshell-install",
    author = "Synavera Systems",
    about = "Install, update or inspect the CardShell smart-card CLI",
    disable_version_flag = true
)]
#[command(group(
    ArgGroup::new("mode")
        .args(["native", "snap", "deb", "update", "uninstall", "show_version", "status", "setup"])
))]
struct Cli {
    /// Install with pip and system smart-card libraries (default).
    #[arg(long, action = ArgAction::SetTrue)]
    native: bool,
    /// Install the snap and connect its interfaces.
    #[arg(long, action = ArgAction::SetTrue)]
    snap: bool,
    /// Install the prebuilt Debian package (Ubuntu/Debian only).
    #[arg(long, action = ArgAction::SetTrue)]
    deb: bool,
    /// Update whichever installation is present.
    #[arg(long, action = ArgAction::SetTrue)]
    update: bool,
    /// Remove every installation found.
    #[arg(long, action = ArgAction::SetTrue)]
    uninstall: bool,
    /// Show installed versions.
    #[arg(long = "version", action = ArgAction::SetTrue)]
    show_version: bool,
    /// Show installation and reader service status.
    #[arg(long, action = ArgAction::SetTrue)]
    status: bool,
    /// Blacklist kernel NFC modules that claim the reader.
    #[arg(long, action = ArgAction::SetTrue)]
    setup: bool,
    /// Override configuration file path.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Explicit log file path.
    #[arg(long, value_name = "PATH")]
    log: Option<PathBuf>,
    /// Enable debug output on stderr.
    #[arg(long, action = ArgAction::SetTrue)]
    verbose: bool,
}

impl Cli {
    fn mode(&self) -> Mode {
        [
            (self.snap, Mode::Snap),
            (self.deb, Mode::Deb),
            (self.update, Mode::Update),
            (self.uninstall, Mode::Uninstall),
            (self.show_version, Mode::Version),
            (self.status, Mode::Status),
            (self.setup, Mode::Setup),
        ]
        .into_iter()
        .find_map(|(set, mode)| set.then_some(mode))
        .unwrap_or(Mode::Native)
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(parse_failure_status(err.kind()));
        }
    };

    let result = tokio::select! {
        result = run(cli) => result,
        _ = tokio::signal::ctrl_c() => Err(DistError::Runtime("interrupted".into())),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("[cardshell-install] {err}");
            err.exit_code()
        }
    }
}

/// `--help` is a successful exit; every other parse error is fatal.
fn parse_failure_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp => 0,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = DistConfig::load_from_optional_path(cli.config.as_deref())?;
    let overrides = EnvOverrides::from_env();
    let logger = Logger::new(cli.log.clone(), cli.verbose)?;
    let host = SystemHost;
    let fetch = HttpFetcher::new(config.connect_timeout_secs)?;

    let ctx = Context {
        host: &host,
        fetch: &fetch,
        config: &config,
        overrides: &overrides,
        logger: &logger,
    };

    let code = match dispatch(cli.mode(), &ctx).await {
        Ok(outcome) => {
            report(&logger, &outcome);
            ExitCode::SUCCESS
        }
        Err(err) => {
            logger.error(err.code(), err.to_string());
            err.exit_code()
        }
    };
    logger.finalize()?;
    Ok(code)
}

fn report(logger: &Logger, outcome: &FlowOutcome) {
    match outcome {
        FlowOutcome::Installed {
            channel,
            version,
            fell_back,
        } => {
            let version = version
                .as_deref()
                .map(|v| format!(" {v}"))
                .unwrap_or_default();
            let note = if *fell_back { " (fallback)" } else { "" };
            logger.success("DONE", format!("Installed{version} via {channel}{note}"));
        }
        FlowOutcome::Updated { channel } => {
            logger.success("DONE", format!("Updated via {channel}"));
        }
        FlowOutcome::Removed { channels } => {
            logger.success("DONE", format!("Removed {} installation(s)", channels.len()));
        }
        FlowOutcome::NotInstalled => logger.info("DONE", "Nothing to do"),
        FlowOutcome::Report(status) => print!("{}", status.render()),
        FlowOutcome::Configured { path, changed } => {
            let state = if *changed { "updated" } else { "unchanged" };
            logger.success("DONE", format!("{} {state}", path.display()));
        }
    }
}
