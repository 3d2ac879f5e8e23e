/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows::update
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Update mode: refresh whichever channel currently holds the
    tool, preferring the snap over a pip installation.

  Security / Safety Notes:
    snap refresh is privileged; pip upgrade is user scope.

  Dependencies:
    crate::flows shared pip and snap helpers.

  Operational Scope:
    Hosts with an existing installation.

  Revision History:
    2026-10-19 COD  Authored update flow.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Nothing installed is a warning, not a failure
============================================================*/

use super::{pip_install, pip_show, snap_list, Channel, Context, FlowOutcome};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::host::{CommandSpec, Host};

pub(super) async fn run<H: Host, F: Fetch>(ctx: &Context<'_, H, F>) -> Result<FlowOutcome> {
    let env = ctx.detect_for_changes().await;
    let snap = &ctx.config.snap_name;
    let package = &ctx.config.pypi_package;

    if env.snap_available && ctx.probe(snap_list(snap)).await? {
        ctx.logger.info("UPDATE", format!("Refreshing snap {snap}"));
        ctx.run(&env, CommandSpec::new("snap", ["refresh", snap.as_str()]).privileged())
            .await?;
        ctx.logger.success("UPDATE", format!("snap {snap} refreshed"));
        return Ok(FlowOutcome::Updated {
            channel: Channel::Snap,
        });
    }

    if ctx.probe(pip_show(package)).await? {
        ctx.logger.info("UPDATE", format!("Upgrading pip package {package}"));
        ctx.run(&env, pip_install(&[package], true)).await?;
        ctx.logger.success("UPDATE", format!("{package} upgraded"));
        return Ok(FlowOutcome::Updated {
            channel: Channel::Pip,
        });
    }

    ctx.logger.warn(
        "UPDATE",
        format!("{package} is not installed; run with --native, --snap or --deb first"),
    );
    Ok(FlowOutcome::NotInstalled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutput;
    use crate::testing::{Harness, ScriptedFetch, ScriptedHost};

    #[tokio::test]
    async fn snap_takes_precedence() {
        let host = ScriptedHost::new()
            .with_commands(&["snap"])
            .on("snap list cardshell", CommandOutput::ok("Name Version\ncardshell 1.0.3\n"))
            .on("snap refresh cardshell", CommandOutput::ok(""))
            .on("python3 -m pip show cardshell", CommandOutput::ok("Version: 1.0.3\n"));
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Updated {
                channel: Channel::Snap
            }
        );
        assert!(!harness.host.ran("python3 -m pip"));
    }

    #[tokio::test]
    async fn pip_upgrade_when_no_snap() {
        let host = ScriptedHost::new()
            .on("python3 -m pip show cardshell", CommandOutput::ok("Version: 1.0.3\n"))
            .on(
                "python3 -m pip install --user --upgrade cardshell",
                CommandOutput::ok(""),
            );
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Updated {
                channel: Channel::Pip
            }
        );
        assert!(!harness.host.ran("snap"));
    }

    #[tokio::test]
    async fn nothing_installed_is_not_an_error() {
        let harness = Harness::new(ScriptedHost::new().with_commands(&["snap"]), ScriptedFetch::new());
        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(outcome, FlowOutcome::NotInstalled);
    }
}
