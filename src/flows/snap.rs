/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows::snap
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Snap mode: install snapd if needed, then the snap, then
    connect its hardware interfaces.

  Security / Safety Notes:
    snap install and interface connects are privileged.

  Dependencies:
    crate::manager for snapd installation.

  Operational Scope:
    Hosts with snapd or a package manager that can install it.

  Revision History:
    2026-10-19 COD  Authored snap install flow.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Interface connection failures are warnings only
============================================================*/

use super::{Channel, Context, FlowOutcome};
use crate::error::{DistError, Result};
use crate::fetch::Fetch;
use crate::host::{CommandSpec, Host};

pub(super) async fn run<H: Host, F: Fetch>(ctx: &Context<'_, H, F>) -> Result<FlowOutcome> {
    let env = ctx.detect_for_changes().await;
    let snap = &ctx.config.snap_name;

    if !env.snap_available {
        let install = env.manager.install(&["snapd"]).ok_or_else(|| {
            DistError::Unsupported(format!(
                "snapd is missing and no supported package manager was found on {}",
                env.os.name
            ))
        })?;
        ctx.logger.info("SNAPD", "Installing snapd");
        ctx.run(&env, install).await?;
        ctx.run_optional(
            &env,
            CommandSpec::new("systemctl", ["enable", "--now", "snapd.socket"]).privileged(),
            "Enabling snapd.socket",
        )
        .await;
    }

    ctx.logger.info("SNAP", format!("Installing snap {snap}"));
    ctx.run(&env, CommandSpec::new("snap", ["install", snap.as_str()]).privileged())
        .await?;

    for interface in &ctx.config.snap_interfaces {
        let plug = format!("{snap}:{interface}");
        if ctx
            .run_optional(
                &env,
                CommandSpec::new("snap", ["connect", plug.as_str()]).privileged(),
                &format!("Connecting {plug}"),
            )
            .await
        {
            ctx.logger.success("SNAP", format!("Connected {plug}"));
        }
    }

    ctx.logger.success("SNAP", format!("{snap} installed from the snap store"));
    Ok(FlowOutcome::Installed {
        channel: Channel::Snap,
        version: None,
        fell_back: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutput;
    use crate::testing::{Harness, ScriptedFetch, ScriptedHost};

    #[tokio::test]
    async fn interface_failures_are_warnings() {
        let host = ScriptedHost::lenient()
            .with_commands(&["apt-get", "snap"])
            .on("snap connect cardshell:raw-usb", CommandOutput::failed(1, "no slot"));
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert!(matches!(
            outcome,
            FlowOutcome::Installed {
                channel: Channel::Snap,
                ..
            }
        ));
        assert!(harness.host.ran("snap connect cardshell:pcscd"));
        assert!(!harness.host.ran("apt-get install -y snapd"));
    }

    #[tokio::test]
    async fn installs_snapd_when_absent() {
        let host = ScriptedHost::lenient().with_commands(&["pacman"]);
        let harness = Harness::new(host, ScriptedFetch::new());

        run(&harness.ctx()).await.unwrap();
        let calls = harness.host.calls();
        let snapd = calls
            .iter()
            .position(|c| c == "pacman -S --noconfirm --needed snapd")
            .unwrap();
        let snap = calls
            .iter()
            .position(|c| c == "snap install cardshell")
            .unwrap();
        assert!(snapd < snap);
    }

    #[tokio::test]
    async fn snap_install_failure_is_fatal() {
        let host = ScriptedHost::lenient()
            .with_commands(&["snap"])
            .on("snap install", CommandOutput::failed(1, "store unreachable"));
        let harness = Harness::new(host, ScriptedFetch::new());

        let err = run(&harness.ctx()).await.unwrap_err();
        assert!(matches!(err, DistError::CommandFailure { .. }));
        assert!(!harness.host.ran("snap connect"));
    }

    #[tokio::test]
    async fn no_snapd_and_no_manager_is_unsupported() {
        let harness = Harness::new(ScriptedHost::lenient(), ScriptedFetch::new());
        let err = run(&harness.ctx()).await.unwrap_err();
        assert!(matches!(err, DistError::Unsupported(_)));
    }
}
