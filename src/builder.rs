/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::builder
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Build a native Debian package from the published source
    distribution: download, extract, lay out the source tree,
    overlay packaging metadata and run dpkg-buildpackage.

  Security / Safety Notes:
    Archive extraction refuses entries escaping the work dir.
    Only dependency installation and the build itself request
    privilege escalation.

  Dependencies:
    flate2 + tar for sdist extraction, walkdir for copying the
    packaging tree, tempfile for the scratch work directory.

  Operational Scope:
    Driven by the cardshell-build-deb binary, locally or in CI.

  Revision History:
    2026-10-19 COD  Authored Debian package builder.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Validate first, act second
    - Scratch directories never outlive the run unless asked
    - Warnings only for optional artifact collection
============================================================*/

use std::fs::File;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tempfile::TempDir;
use walkdir::WalkDir;

use crate::config::DistConfig;
use crate::error::{DistError, Result};
use crate::fetch::Fetch;
use crate::flows::Context;
use crate::host::{CommandSpec, Host};
use crate::pypi::PackageIndex;
use crate::version::Version;

const ARTIFACT_EXTENSIONS: [&str; 3] = ["deb", "changes", "buildinfo"];

/// Outcome of a successful build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub work_dir: PathBuf,
    pub artifacts: Vec<PathBuf>,
    /// Whether the work directory survives the process.
    pub retained: bool,
    pub collected: Vec<PathBuf>,
}

/// Build work directory: a scratch dir removed on drop, or a kept path.
enum WorkDir {
    Scratch(TempDir),
    Kept(PathBuf),
}

impl WorkDir {
    fn path(&self) -> &Path {
        match self {
            WorkDir::Scratch(dir) => dir.path(),
            WorkDir::Kept(path) => path,
        }
    }

    fn retained(&self) -> bool {
        matches!(self, WorkDir::Kept(_))
    }
}

/// Locate the packaging metadata directory.
///
/// An explicit or configured path must exist; otherwise `debian/` next to the
/// executable and `packaging/debian` under the current directory are tried.
pub fn resolve_packaging_dir(explicit: Option<&Path>, config: &DistConfig) -> Result<PathBuf> {
    if let Some(dir) = explicit.or(config.packaging_dir.as_deref()) {
        return validate_packaging_dir(dir);
    }

    let mut candidates = Vec::new();
    if let Some(exe_dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        candidates.push(exe_dir.join("debian"));
    }
    if let Ok(cwd) = std::env::current_dir() {
        candidates.push(cwd.join("packaging").join("debian"));
    }

    candidates
        .iter()
        .find_map(|candidate| validate_packaging_dir(candidate).ok())
        .ok_or_else(|| {
            DistError::MissingResource(format!(
                "packaging metadata not found (looked in {})",
                candidates
                    .iter()
                    .map(|c| c.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ))
        })
}

fn validate_packaging_dir(dir: &Path) -> Result<PathBuf> {
    if dir.join("control").is_file() {
        Ok(dir.to_path_buf())
    } else {
        Err(DistError::MissingResource(format!(
            "packaging metadata directory {} has no control file",
            dir.display()
        )))
    }
}

/// Rewrite the baked-in changelog version to `requested`.
///
/// Returns `None` when no rewrite is needed or the placeholder is absent.
pub fn rewrite_changelog_version(
    changelog: &str,
    baked: &str,
    requested: &str,
    revision: &str,
) -> Option<String> {
    if baked == requested {
        return None;
    }
    let from = format!("({baked}-{revision})");
    if !changelog.contains(&from) {
        return None;
    }
    Some(changelog.replacen(&from, &format!("({requested}-{revision})"), 1))
}

fn normalize_project(name: &str) -> String {
    name.to_ascii_lowercase().replace(['_', '.'], "-")
}

/// Find the extracted source tree: exact `<project>-<version>` first, then a
/// directory whose name matches it once case, `_` and `.` are normalized.
pub fn locate_source_dir(root: &Path, project: &str, version: &str) -> Result<PathBuf> {
    let expected = format!("{project}-{version}");
    let exact = root.join(&expected);
    if exact.is_dir() {
        return Ok(exact);
    }

    let wanted = normalize_project(&expected);
    let entries = std::fs::read_dir(root).map_err(|err| {
        DistError::Filesystem(format!("Failed to list {}: {err}", root.display()))
    })?;
    let mut matches: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .filter(|entry| normalize_project(&entry.file_name().to_string_lossy()) == wanted)
        .map(|entry| entry.path())
        .collect();
    matches.sort();
    matches.into_iter().next().ok_or_else(|| {
        DistError::MissingResource(format!(
            "no {expected} source directory found in {}",
            root.display()
        ))
    })
}

/// Unpack a `.tar.gz` source distribution into `dest`.
pub fn extract_sdist(archive: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive).map_err(|err| {
        DistError::Filesystem(format!("Failed to open {}: {err}", archive.display()))
    })?;
    let mut tarball = tar::Archive::new(GzDecoder::new(file));
    tarball.unpack(dest).map_err(|err| {
        DistError::Filesystem(format!("Failed to extract {}: {err}", archive.display()))
    })
}

/// Recursively copy `src` into `dest`, returning the number of files copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(src) {
        let entry = entry.map_err(|err| {
            DistError::Filesystem(format!("Failed to walk {}: {err}", src.display()))
        })?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .map_err(|err| DistError::Runtime(format!("walkdir escaped its root: {err}")))?;
        let target = dest.join(relative);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target).map_err(|err| {
                DistError::Filesystem(format!(
                    "Failed to copy {} to {}: {err}",
                    entry.path().display(),
                    target.display()
                ))
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Build outputs (`.deb`, `.changes`, `.buildinfo`) directly under `dir` whose
/// file name starts with `prefix` (`<package>_<debian version>_`).
pub fn collect_artifacts(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|err| {
        DistError::Filesystem(format!("Failed to list {}: {err}", dir.display()))
    })?;
    let mut artifacts: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix))
        })
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ARTIFACT_EXTENSIONS.contains(&ext))
        })
        .collect();
    artifacts.sort();
    Ok(artifacts)
}

fn artifact_prefix(config: &DistConfig, version: &Version) -> String {
    format!(
        "{}_{}_",
        config.deb_package,
        config.debian_version(version.as_str())
    )
}

/// Drives one package build.
pub struct PackageBuilder<'c, 'a, H, F> {
    ctx: &'c Context<'a, H, F>,
}

impl<'c, 'a, H: Host, F: Fetch> PackageBuilder<'c, 'a, H, F> {
    pub fn new(ctx: &'c Context<'a, H, F>) -> Self {
        Self { ctx }
    }

    /// Produce a Debian package for `version` using `packaging_dir` metadata.
    pub async fn build(&self, version: &Version, packaging_dir: &Path) -> Result<BuildReport> {
        let ctx = self.ctx;
        let config = ctx.config;
        ctx.logger.info(
            "BUILD",
            format!("Building {} {version}", config.deb_package),
        );

        let env = ctx.detect_for_changes().await;

        let work = self.work_dir()?;
        let root = work.path();
        ctx.logger.info("WORKDIR", format!("Using {}", root.display()));

        let archive = root.join(format!("{}-{version}.tar.gz", config.pypi_package));
        self.download_sdist(version, &archive).await?;
        extract_sdist(&archive, root)?;

        let extracted = locate_source_dir(root, &config.pypi_package, version.as_str())?;
        let source = root.join(format!("{}-{version}", config.deb_package));
        if extracted != source {
            if source.exists() {
                std::fs::remove_dir_all(&source)?;
            }
            std::fs::rename(&extracted, &source).map_err(|err| {
                DistError::Filesystem(format!(
                    "Failed to rename {} to {}: {err}",
                    extracted.display(),
                    source.display()
                ))
            })?;
        }

        let debian = source.join("debian");
        let copied = copy_tree(packaging_dir, &debian)?;
        ctx.logger.info(
            "DEBIAN",
            format!("Copied {copied} packaging files from {}", packaging_dir.display()),
        );
        self.stamp_changelog(&debian.join("changelog"), version)?;

        if ctx.overrides.skip_deps {
            ctx.logger.info("DEPS", "Skipping build dependency installation");
        } else {
            let deps = env.manager.build_dependencies();
            if deps.is_empty() {
                return Err(DistError::Unsupported(format!(
                    "build dependencies need apt; detected {}",
                    env.manager
                )));
            }
            if let Some(refresh) = env.manager.refresh() {
                ctx.run(&env, refresh).await?;
            }
            if let Some(install) = env.manager.install(deps) {
                ctx.logger
                    .info("DEPS", format!("Installing {} build dependencies", deps.len()));
                ctx.run(&env, install).await?;
            }
        }

        // A reused work dir may hold outputs of an earlier build of this version.
        let prefix = artifact_prefix(config, version);
        for stale in collect_artifacts(root, &prefix)? {
            ctx.logger
                .debug("ARTIFACT", format!("Removing stale {}", stale.display()));
            std::fs::remove_file(&stale)?;
        }

        ctx.logger.info("BUILD", "Running dpkg-buildpackage");
        ctx.run(
            &env,
            CommandSpec::new("dpkg-buildpackage", ["-us", "-uc", "-b"])
                .current_dir(&source)
                .privileged(),
        )
        .await?;

        let artifacts = collect_artifacts(root, &prefix)?;
        for artifact in &artifacts {
            ctx.logger.success("ARTIFACT", artifact.display().to_string());
        }
        if artifacts.is_empty() {
            ctx.logger.warn("ARTIFACT", "dpkg-buildpackage produced no artifacts");
        }

        let collected = self.collect_into_workspace(&artifacts);
        if !work.retained() && ctx.overrides.workspace.is_none() {
            ctx.logger.warn(
                "WORKDIR",
                "Scratch directory is removed on exit; set CARDSHELL_WORK_DIR to keep artifacts",
            );
        }

        Ok(BuildReport {
            work_dir: root.to_path_buf(),
            artifacts,
            retained: work.retained(),
            collected,
        })
    }

    fn work_dir(&self) -> Result<WorkDir> {
        let ctx = self.ctx;
        if let Some(dir) = &ctx.overrides.work_dir {
            std::fs::create_dir_all(dir).map_err(|err| {
                DistError::Filesystem(format!("Failed to create {}: {err}", dir.display()))
            })?;
            return Ok(WorkDir::Kept(dir.clone()));
        }

        let scratch = tempfile::Builder::new()
            .prefix("cardshell-build-")
            .tempdir()
            .map_err(|err| DistError::Filesystem(format!("Failed to create work dir: {err}")))?;
        if ctx.overrides.ci {
            #[allow(deprecated)]
            let kept = scratch.into_path();
            ctx.logger.info(
                "WORKDIR",
                format!("CI run: retaining {}", kept.display()),
            );
            return Ok(WorkDir::Kept(kept));
        }
        Ok(WorkDir::Scratch(scratch))
    }

    async fn download_sdist(&self, version: &Version, archive: &Path) -> Result<()> {
        let ctx = self.ctx;
        let index = PackageIndex::new(ctx.fetch, ctx.config);

        let direct = index.direct_sdist_url(version.as_str());
        ctx.logger.info("DOWNLOAD", format!("Fetching {direct}"));
        let direct_err = match ctx.fetch.download(&direct, archive).await {
            Ok(_) => return Ok(()),
            Err(err) => err,
        };
        ctx.logger.warn(
            "DOWNLOAD",
            format!("Direct download failed ({direct_err}); asking the package index"),
        );

        let resolved = index.sdist_url(version.as_str()).await.map_err(|err| {
            DistError::Network(format!(
                "source download failed ({direct_err}) and index lookup failed ({err})"
            ))
        })?;
        ctx.logger.info("DOWNLOAD", format!("Fetching {resolved}"));
        ctx.fetch
            .download(&resolved, archive)
            .await
            .map(|_| ())
            .map_err(|err| {
                DistError::Network(format!(
                    "source download failed from {direct} and {resolved}: {err}"
                ))
            })
    }

    fn stamp_changelog(&self, changelog: &Path, version: &Version) -> Result<()> {
        let ctx = self.ctx;
        let config = ctx.config;
        if version.as_str() == config.default_version {
            return Ok(());
        }
        let current = std::fs::read_to_string(changelog).map_err(|err| {
            DistError::MissingResource(format!("{}: {err}", changelog.display()))
        })?;
        match rewrite_changelog_version(
            &current,
            &config.default_version,
            version.as_str(),
            &config.debian_revision,
        ) {
            Some(updated) => {
                std::fs::write(changelog, updated)?;
                ctx.logger.info(
                    "CHANGELOG",
                    format!(
                        "Version {} -> {}",
                        config.debian_version(&config.default_version),
                        config.debian_version(version.as_str())
                    ),
                );
            }
            None => ctx.logger.warn(
                "CHANGELOG",
                format!(
                    "No ({}) entry in changelog; leaving it untouched",
                    config.debian_version(&config.default_version)
                ),
            ),
        }
        Ok(())
    }

    fn collect_into_workspace(&self, artifacts: &[PathBuf]) -> Vec<PathBuf> {
        let ctx = self.ctx;
        let Some(workspace) = &ctx.overrides.workspace else {
            return Vec::new();
        };
        let mut collected = Vec::new();
        for artifact in artifacts {
            let Some(name) = artifact.file_name() else {
                continue;
            };
            let target = workspace.join(name);
            match std::fs::copy(artifact, &target) {
                Ok(_) => collected.push(target),
                Err(err) => ctx.logger.warn(
                    "COLLECT",
                    format!("Could not copy {} to {}: {err}", artifact.display(), workspace.display()),
                ),
            }
        }
        if !collected.is_empty() {
            ctx.logger.success(
                "COLLECT",
                format!("Copied {} artifacts to {}", collected.len(), workspace.display()),
            );
        }
        collected
    }
}
