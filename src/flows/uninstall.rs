/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows::uninstall
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Uninstall mode: remove the tool from every channel that
    holds it.

  Security / Safety Notes:
    Snap and system package removal are privileged.

  Dependencies:
    crate::manager for the system package query.

  Operational Scope:
    Any host with a prior installation.

  Revision History:
    2026-10-19 COD  Authored uninstall flow.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Only channels confirmed installed are touched
============================================================*/

use super::{pip_show, pip_uninstall, snap_list, Channel, Context, FlowOutcome};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::host::{CommandSpec, Host};

pub(super) async fn run<H: Host, F: Fetch>(ctx: &Context<'_, H, F>) -> Result<FlowOutcome> {
    let env = ctx.detect_for_changes().await;
    let mut removed = Vec::new();

    let snap = &ctx.config.snap_name;
    if env.snap_available && ctx.probe(snap_list(snap)).await? {
        ctx.logger.info("REMOVE", format!("Removing snap {snap}"));
        ctx.run(&env, CommandSpec::new("snap", ["remove", snap.as_str()]).privileged())
            .await?;
        removed.push(Channel::Snap);
    }

    let deb = &ctx.config.deb_package;
    if let (Some(query), Some(remove)) = (env.manager.query_version(deb), env.manager.remove(deb)) {
        let installed = ctx
            .query(query)
            .await?
            .and_then(|out| env.manager.parse_version(&out));
        if installed.is_some() {
            ctx.logger
                .info("REMOVE", format!("Removing {} package {deb}", env.manager));
            ctx.run(&env, remove).await?;
            removed.push(Channel::System);
        }
    }

    let package = &ctx.config.pypi_package;
    if ctx.probe(pip_show(package)).await? {
        ctx.logger.info("REMOVE", format!("Removing pip package {package}"));
        ctx.run(&env, pip_uninstall(package)).await?;
        removed.push(Channel::Pip);
    }

    if removed.is_empty() {
        ctx.logger
            .warn("REMOVE", format!("{package} was not found in any channel"));
        return Ok(FlowOutcome::NotInstalled);
    }

    let summary: Vec<String> = removed.iter().map(ToString::to_string).collect();
    ctx.logger
        .success("REMOVE", format!("Removed from: {}", summary.join(", ")));
    Ok(FlowOutcome::Removed { channels: removed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutput;
    use crate::testing::{Harness, ScriptedFetch, ScriptedHost};

    #[tokio::test]
    async fn only_pip_channel_is_removed() {
        let host = ScriptedHost::new()
            .with_file("/etc/os-release", "ID=ubuntu\nVERSION_ID=\"24.04\"\n")
            .with_commands(&["apt-get", "snap"])
            .on("python3 -m pip show cardshell", CommandOutput::ok("Version: 1.0.3\n"))
            .on("python3 -m pip uninstall -y cardshell", CommandOutput::ok(""));
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Removed {
                channels: vec![Channel::Pip]
            }
        );
        assert!(harness.host.ran("snap list cardshell"));
        assert!(harness.host.ran("dpkg-query -W"));
        assert!(!harness.host.ran("snap remove"));
        assert!(!harness.host.ran("apt-get remove"));
    }

    #[tokio::test]
    async fn every_present_channel_is_removed() {
        let host = ScriptedHost::lenient()
            .with_file("/etc/os-release", "ID=ubuntu\nVERSION_ID=\"22.04\"\n")
            .with_commands(&["apt-get", "snap"])
            .on("dpkg-query -W", CommandOutput::ok("ii  1.0.3-1"));
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Removed {
                channels: vec![Channel::Snap, Channel::System, Channel::Pip]
            }
        );
        assert!(harness.host.ran("snap remove cardshell"));
        assert!(harness.host.ran("apt-get remove -y cardshell"));
    }

    #[tokio::test]
    async fn residual_config_package_is_not_removed_again() {
        let host = ScriptedHost::new()
            .with_file("/etc/os-release", "ID=debian\nVERSION_ID=\"12\"\n")
            .with_commands(&["apt-get"])
            .on("dpkg-query -W", CommandOutput::ok("rc  2.0.0-1"));
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(outcome, FlowOutcome::NotInstalled);
        assert!(!harness.host.ran("apt-get remove"));
    }

    #[tokio::test]
    async fn nothing_found_reports_not_installed() {
        let host = ScriptedHost::new().with_commands(&["pacman"]);
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(outcome, FlowOutcome::NotInstalled);
        assert!(harness.host.ran("pacman -Q cardshell"));
        assert!(!harness.host.ran("snap"));
    }
}
