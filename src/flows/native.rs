/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows::native
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Native mode: install the runtime dependencies through the
    host package manager, then the tool itself with pip in
    user scope, and enable the smart-card service.

  Security / Safety Notes:
    Dependency installation is privileged; pip never is.

  Dependencies:
    crate::flows shared steps.

  Operational Scope:
    Default installer mode on any supported distribution.

  Revision History:
    2026-10-19 COD  Authored native install flow.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Every dependency attempted before failure is reported
    - Service enablement is optional
============================================================*/

use super::{enable_service, install_system_dependencies, pip_install, Channel, Context, FlowOutcome};
use crate::error::Result;
use crate::fetch::Fetch;
use crate::host::Host;

pub(super) async fn run<H: Host, F: Fetch>(ctx: &Context<'_, H, F>) -> Result<FlowOutcome> {
    let env = ctx.detect_for_changes().await;

    install_system_dependencies(ctx, &env).await?;

    let package = &ctx.config.pypi_package;
    ctx.logger
        .info("PIP", format!("Installing {package} for the current user"));
    ctx.run(&env, pip_install(&[package], false)).await?;
    ctx.logger.success("PIP", format!("{package} installed"));

    enable_service(ctx, &env).await;

    if !ctx.host.has_command(&ctx.config.binary_name) {
        ctx.logger.warn(
            "PATH",
            format!(
                "`{}` is not on PATH yet; add ~/.local/bin to PATH",
                ctx.config.binary_name
            ),
        );
    }

    Ok(FlowOutcome::Installed {
        channel: Channel::Pip,
        version: None,
        fell_back: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DistError;
    use crate::host::CommandOutput;
    use crate::testing::{Harness, ScriptedFetch, ScriptedHost};

    const FEDORA: &str = "ID=fedora\nVERSION_ID=40\nPRETTY_NAME=\"Fedora Linux 40\"\n";

    #[tokio::test]
    async fn installs_dependencies_then_pip_package() {
        let host = ScriptedHost::lenient()
            .with_file("/etc/os-release", FEDORA)
            .with_commands(&["dnf", "yum"]);
        let harness = Harness::new(host, ScriptedFetch::new());

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Installed {
                channel: Channel::Pip,
                version: None,
                fell_back: false
            }
        );

        let calls = harness.host.calls();
        let refresh = calls.iter().position(|c| c == "dnf makecache").unwrap();
        let pip = calls
            .iter()
            .position(|c| c == "python3 -m pip install --user cardshell")
            .unwrap();
        assert!(refresh < pip);
        assert!(harness.host.ran("dnf install -y pcsc-lite-ccid"));
        assert!(harness.host.ran("systemctl enable --now pcscd"));
        assert!(harness.fetch.requests().is_empty());
    }

    #[tokio::test]
    async fn partial_dependency_failure_is_reported() {
        let host = ScriptedHost::lenient()
            .with_file("/etc/os-release", FEDORA)
            .with_commands(&["dnf"])
            .on("dnf install -y pcsc-tools", CommandOutput::failed(1, "No match"));
        let harness = Harness::new(host, ScriptedFetch::new());

        let err = run(&harness.ctx()).await.unwrap_err();
        match err {
            DistError::PartialDependencies {
                installed,
                total,
                failed,
            } => {
                assert_eq!((installed, total), (3, 4));
                assert_eq!(failed, vec!["pcsc-tools".to_string()]);
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(harness.host.ran("dnf install -y python3-pip"));
        assert!(!harness.host.ran("python3 -m pip"));
    }

    #[tokio::test]
    async fn unknown_manager_skips_system_dependencies() {
        let host = ScriptedHost::lenient().with_file("/etc/os-release", "ID=nixos\n");
        let harness = Harness::new(host, ScriptedFetch::new());

        run(&harness.ctx()).await.unwrap();
        assert!(harness.host.ran("python3 -m pip install --user cardshell"));
        assert!(!harness.host.ran("systemctl"));
    }
}
