/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::flows::deb
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Deb mode: download a prebuilt Debian package from the
    release host, verify it against the release checksum
    manifest and install it. A failed download hands over to
    native mode when deb_fallback_to_native is set.

  Security / Safety Notes:
    A checksum mismatch deletes the artifact and is fatal.
    dpkg and apt-get run privileged.

  Dependencies:
    crate::checksum, crate::pypi, tempfile for the download dir.

  Operational Scope:
    apt-based hosts only.

  Revision History:
    2026-10-19 COD  Authored deb install flow.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Verify before install
    - Fallback only on download failure
============================================================*/

use std::path::Path;

use super::{
    enable_service, install_system_dependencies, native, pip_install, Channel, Context,
    FlowOutcome,
};
use crate::checksum;
use crate::detect::Environment;
use crate::error::{DistError, Result};
use crate::fetch::Fetch;
use crate::host::{CommandSpec, Host};
use crate::manager::PackageManager;
use crate::pypi::PackageIndex;
use crate::version::{self, Version};

pub(super) async fn run<H: Host, F: Fetch>(ctx: &Context<'_, H, F>) -> Result<FlowOutcome> {
    let env = ctx.detect_for_changes().await;
    if env.manager != PackageManager::Apt {
        return Err(DistError::Unsupported(format!(
            "deb packages require apt; detected {} on {}",
            env.manager, env.os.name
        )));
    }

    let version = target_version(ctx).await?;

    install_system_dependencies(ctx, &env).await?;

    let filename = artifact_name(&ctx.config.deb_package, &version, &env);
    let release_dir = ctx.config.release_dir(version.as_str());
    let url = format!("{release_dir}/{filename}");

    let scratch = tempfile::Builder::new()
        .prefix("cardshell-deb-")
        .tempdir()
        .map_err(|err| DistError::Filesystem(format!("Failed to create scratch dir: {err}")))?;
    let artifact = scratch.path().join(&filename);

    ctx.logger.info("DOWNLOAD", format!("Fetching {url}"));
    match ctx.fetch.download(&url, &artifact).await {
        Ok(bytes) => ctx
            .logger
            .success("DOWNLOAD", format!("{filename} ({bytes} bytes)")),
        Err(err) => {
            ctx.logger.error("DOWNLOAD", format!("{err}"));
            if !ctx.config.deb_fallback_to_native {
                return Err(err);
            }
            ctx.logger.warn(
                "FALLBACK",
                "Prebuilt package unavailable; switching to native installation",
            );
            return match native::run(ctx).await? {
                FlowOutcome::Installed {
                    channel, version, ..
                } => Ok(FlowOutcome::Installed {
                    channel,
                    version,
                    fell_back: true,
                }),
                other => Ok(other),
            };
        }
    }

    verify(ctx, &release_dir, &filename, &artifact).await?;
    install_package(ctx, &env, &artifact).await?;

    if !ctx.config.supplementary_pip.is_empty() {
        ctx.logger.info(
            "PIP",
            format!(
                "Installing supplementary packages: {}",
                ctx.config.supplementary_pip.join(", ")
            ),
        );
        ctx.run(&env, pip_install(&ctx.config.supplementary_pip, false))
            .await?;
    }

    enable_service(ctx, &env).await;

    ctx.logger.success(
        "DEB",
        format!("{} {version} installed", ctx.config.deb_package),
    );
    Ok(FlowOutcome::Installed {
        channel: Channel::System,
        version: Some(version.to_string()),
        fell_back: false,
    })
}

/// Environment override, else the latest index release, else the default.
async fn target_version<H: Host, F: Fetch>(ctx: &Context<'_, H, F>) -> Result<Version> {
    let latest = if ctx.overrides.version.is_some() {
        None
    } else {
        match PackageIndex::new(ctx.fetch, ctx.config).latest_version().await {
            Ok(latest) => Some(latest),
            Err(err) => {
                ctx.logger.warn(
                    "VERSION",
                    format!(
                        "Could not query latest release ({err}); using {}",
                        ctx.config.default_version
                    ),
                );
                None
            }
        }
    };
    let (version, source) = version::resolve(
        None,
        ctx.overrides.version.as_deref(),
        latest.as_deref(),
        &ctx.config.default_version,
    )?;
    ctx.logger
        .info("VERSION", format!("Target version {version} ({source})"));
    Ok(version)
}

/// `<package>_<version>_<target>_<arch>.deb`
pub(crate) fn artifact_name(package: &str, version: &Version, env: &Environment) -> String {
    format!("{package}_{version}_{}_{}.deb", env.deb_target(), env.arch)
}

async fn verify<H: Host, F: Fetch>(
    ctx: &Context<'_, H, F>,
    release_dir: &str,
    filename: &str,
    artifact: &Path,
) -> Result<()> {
    let manifest_url = format!("{release_dir}/{}", ctx.config.checksum_manifest);
    let manifest = match ctx.fetch.get_text(&manifest_url).await {
        Ok(manifest) => manifest,
        Err(err) => {
            ctx.logger.warn(
                "CHECKSUM",
                format!("No checksum manifest ({err}); installing unverified"),
            );
            return Ok(());
        }
    };
    let Some(expected) = checksum::expected_digest(&manifest, filename) else {
        ctx.logger.warn(
            "CHECKSUM",
            format!("{filename} not listed in manifest; installing unverified"),
        );
        return Ok(());
    };
    checksum::verify_file(artifact, &expected)?;
    ctx.logger.success("CHECKSUM", format!("{filename} verified"));
    Ok(())
}

async fn install_package<H: Host, F: Fetch>(
    ctx: &Context<'_, H, F>,
    env: &Environment,
    artifact: &Path,
) -> Result<()> {
    let path = artifact.display().to_string();
    let spec = env.elevate(CommandSpec::new("dpkg", ["-i", path.as_str()]).privileged());
    ctx.logger.info("DPKG", format!("Installing {path}"));
    let output = ctx.host.run(&spec).await?;
    if output.success() {
        return Ok(());
    }

    if !reports_unmet_dependencies(&output.stdout, &output.stderr) {
        return output.check(&spec).map(|_| ());
    }

    ctx.logger
        .warn("DPKG", "Unmet dependencies reported; letting apt resolve them");
    ctx.run(
        env,
        CommandSpec::new("apt-get", ["install", "-f", "-y"]).privileged(),
    )
    .await?;
    Ok(())
}

fn reports_unmet_dependencies(stdout: &str, stderr: &str) -> bool {
    const MARKERS: [&str; 3] = [
        "dependency problems",
        "unmet dependencies",
        "depends on",
    ];
    [stdout, stderr]
        .iter()
        .any(|text| MARKERS.iter().any(|marker| text.contains(marker)))
}
