/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::bin::cardshell-build-deb
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Build a Debian package of a released CardShell version from
    its published source distribution.

  Security / Safety Notes:
    Validates the version before any download or command runs.
    The scratch work directory is removed on exit, including on
    Ctrl-C, unless CI asks for it to be kept.

  Dependencies:
    clap for CLI parsing, tokio for the runtime and Ctrl-C.

  Operational Scope:
    Release CI and maintainers building packages locally.

  Revision History:
    2026-10-19 COD  Authored package builder entry point.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Validate first, act second
    - Result-first error handling with deterministic exits
============================================================*/

use std::path::PathBuf;
use std::process::ExitCode;

use clap::error::ErrorKind;
use clap::{ArgAction, Parser};

use cardshell_dist::builder::{resolve_packaging_dir, PackageBuilder};
use cardshell_dist::config::{DistConfig, EnvOverrides};
use cardshell_dist::error::{DistError, Result};
use cardshell_dist::fetch::HttpFetcher;
use cardshell_dist::flows::Context;
use cardshell_dist::host::SystemHost;
use cardshell_dist::logger::Logger;
use cardshell_dist::version;

/// Command-line arguments for cardshell-build-deb.
#[derive(Debug, Parser)]
#[command(
    name = "cardshell-build-deb",
    version,
    author = "Synavera Systems",
    about = "Build a CardShell Debian package from the published sources"
)]
struct Cli {
    /// Upstream version to package (falls back to CARDSHELL_VERSION, then the baseline).
    #[arg(value_name = "VERSION")]
    target_version: Option<String>,
    /// Directory holding the debian/ packaging metadata.
    #[arg(long, value_name = "PATH")]
    packaging_dir: Option<PathBuf>,
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
            eprintln!("[cardshell-build-deb] {err}");
            err.exit_code()
        }
    }
}

/// `--help` and `--version` are successful exits; every other parse error is fatal.
fn parse_failure_status(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = DistConfig::load_from_optional_path(cli.config.as_deref())?;
    let overrides = EnvOverrides::from_env();

    let (version, source) = version::resolve(
        cli.target_version.as_deref(),
        overrides.version.as_deref(),
        None,
        &config.default_version,
    )?;
    let packaging_dir = resolve_packaging_dir(cli.packaging_dir.as_deref(), &config)?;

    let logger = Logger::new(cli.log.clone(), cli.verbose)?;
    logger.info("VERSION", format!("{version} ({source})"));
    logger.info("DEBIAN", format!("Metadata from {}", packaging_dir.display()));

    let host = SystemHost;
    let fetch = HttpFetcher::new(config.connect_timeout_secs)?;
    let ctx = Context {
        host: &host,
        fetch: &fetch,
        config: &config,
        overrides: &overrides,
        logger: &logger,
    };

    let code = match PackageBuilder::new(&ctx).build(&version, &packaging_dir).await {
        Ok(report) => {
            let location = if report.retained {
                report.work_dir.display().to_string()
            } else {
                format!("{} (removed on exit)", report.work_dir.display())
            };
            logger.success(
                "COMPLETE",
                format!("{} artifact(s) built in {location}", report.artifacts.len()),
            );
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
