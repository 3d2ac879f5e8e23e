/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows::setup
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Setup mode: blacklist the kernel NFC stack so the
    smart-card service can claim the reader.

  Security / Safety Notes:
    Writes under /etc/modprobe.d; uses sudo install from a
    staged temp file when not root.

  Dependencies:
    tempfile for staging the config file.

  Operational Scope:
    Hosts with PN533-based readers.

  Revision History:
    2026-10-19 COD  Authored NFC blacklist setup.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Unchanged file means no reload
    - Module unload and service restart are optional
============================================================*/

use std::path::Path;

use super::{Context, FlowOutcome};
use crate::detect::Environment;
use crate::error::{DistError, Result};
use crate::fetch::Fetch;
use crate::host::{CommandSpec, Host, Privilege};

/// modprobe configuration blacklisting `modules`.
pub fn blacklist_contents<S: AsRef<str>>(modules: &[S]) -> String {
    let mut contents = String::from(
        "# Written by cardshell-install --setup\n\
         # The kernel NFC drivers grab PN533-based readers before pcscd can.\n",
    );
    for module in modules {
        contents.push_str("blacklist ");
        contents.push_str(module.as_ref());
        contents.push('\n');
    }
    contents
}

pub(super) async fn run<H: Host, F: Fetch>(ctx: &Context<'_, H, F>) -> Result<FlowOutcome> {
    let env = ctx.detect_for_changes().await;
    let path = &ctx.config.blacklist_path;
    let contents = blacklist_contents(&ctx.config.blacklisted_modules);

    if std::fs::read_to_string(path).is_ok_and(|current| current == contents) {
        ctx.logger
            .info("SETUP", format!("{} already up to date", path.display()));
        return Ok(FlowOutcome::Configured {
            path: path.clone(),
            changed: false,
        });
    }

    write_config(ctx, &env, path, &contents).await?;
    ctx.logger.success("SETUP", format!("Wrote {}", path.display()));

    let mut unload = CommandSpec::new("modprobe", ["-r"]).privileged();
    // Dependents first: pn533_usb pins pn533, which pins nfc.
    for module in ctx.config.blacklisted_modules.iter().rev() {
        unload = unload.arg(module.as_str());
    }
    ctx.run_optional(&env, unload, "Unloading NFC modules").await;
    ctx.run_optional(
        &env,
        CommandSpec::new("systemctl", ["restart", ctx.config.service_name.as_str()]).privileged(),
        &format!("Restarting {}", ctx.config.service_name),
    )
    .await;

    ctx.logger
        .info("SETUP", "Replug the reader if it is still claimed by the NFC stack");
    Ok(FlowOutcome::Configured {
        path: path.clone(),
        changed: true,
    })
}

async fn write_config<H: Host, F: Fetch>(
    ctx: &Context<'_, H, F>,
    env: &Environment,
    path: &Path,
    contents: &str,
) -> Result<()> {
    if env.privilege != Privilege::Sudo {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|err| {
                DistError::Filesystem(format!("Failed to create {}: {err}", parent.display()))
            })?;
        }
        return std::fs::write(path, contents).map_err(|err| {
            DistError::Filesystem(format!(
                "Failed to write {} (run as root?): {err}",
                path.display()
            ))
        });
    }

    let staged = tempfile::NamedTempFile::new()
        .map_err(|err| DistError::Filesystem(format!("Failed to stage config: {err}")))?;
    std::fs::write(staged.path(), contents)?;
    let source = staged.path().display().to_string();
    let target = path.display().to_string();
    ctx.run(
        env,
        CommandSpec::new("install", ["-D", "-m", "0644", source.as_str(), target.as_str()])
            .privileged(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::CommandOutput;
    use crate::testing::{Harness, ScriptedFetch, ScriptedHost};

    #[test]
    fn contents_list_every_module() {
        let contents = blacklist_contents(&["pn533", "pn533_usb", "nfc"]);
        let rules: Vec<&str> = contents
            .lines()
            .filter(|line| !line.starts_with('#'))
            .collect();
        assert_eq!(rules, ["blacklist pn533", "blacklist pn533_usb", "blacklist nfc"]);
    }

    #[tokio::test]
    async fn root_writes_file_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = Harness::new(ScriptedHost::lenient(), ScriptedFetch::new());
        harness.config.blacklist_path = dir.path().join("modprobe.d/blacklist-cardshell-nfc.conf");

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Configured {
                path: harness.config.blacklist_path.clone(),
                changed: true
            }
        );
        let written = std::fs::read_to_string(&harness.config.blacklist_path).unwrap();
        assert!(written.contains("blacklist pn533_usb\n"));
        assert!(harness.host.ran("modprobe -r nfc pn533_usb pn533"));
        assert!(harness.host.ran("systemctl restart pcscd"));
    }

    #[tokio::test]
    async fn unchanged_file_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blacklist.conf");
        let mut harness = Harness::new(ScriptedHost::lenient(), ScriptedFetch::new());
        std::fs::write(&path, blacklist_contents(&harness.config.blacklisted_modules)).unwrap();
        harness.config.blacklist_path = path.clone();

        let outcome = run(&harness.ctx()).await.unwrap();
        assert_eq!(
            outcome,
            FlowOutcome::Configured {
                path,
                changed: false
            }
        );
        assert!(!harness.host.ran("modprobe"));
    }

    #[tokio::test]
    async fn sudo_stages_and_installs() {
        let host = ScriptedHost::lenient()
            .as_user()
            .with_commands(&["sudo"])
            .on("sudo modprobe", CommandOutput::failed(1, "module in use"));
        let mut harness = Harness::new(host, ScriptedFetch::new());
        harness.config.blacklist_path = "/nonexistent/modprobe.d/cardshell.conf".into();

        run(&harness.ctx()).await.unwrap();
        assert!(harness.host.calls().iter().any(|call| call.starts_with("sudo install -D -m 0644 ")
            && call.ends_with(" /nonexistent/modprobe.d/cardshell.conf")));
        assert!(harness.host.ran("sudo systemctl restart pcscd"));
    }
}
