/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::pypi
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Resolve source-distribution URLs and the latest published
    version from the Python package index.

  Security / Safety Notes:
    Read-only HTTPS requests to the public index. No
    credentials are transmitted.

  Dependencies:
    serde for response parsing, urlencoding for path segments.

  Operational Scope:
    Used by the builder (sdist download and fallback URL) and
    by deb mode when no version override is supplied.

  Revision History:
    2026-10-19 COD  Implemented package index client.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Predictable URL first, authoritative metadata second
    - Structured response parsing with explicit error paths
============================================================*/

use serde::Deserialize;
use urlencoding::encode;

use crate::config::DistConfig;
use crate::error::{DistError, Result};
use crate::fetch::Fetch;

/// Client bound to the configured index endpoints.
pub struct PackageIndex<'a, F> {
    fetch: &'a F,
    files_url: String,
    api_url: String,
    project: String,
}

impl<'a, F: Fetch> PackageIndex<'a, F> {
    pub fn new(fetch: &'a F, config: &DistConfig) -> Self {
        Self {
            fetch,
            files_url: config.pypi_files_url.trim_end_matches('/').to_string(),
            api_url: config.pypi_api_url.trim_end_matches('/').to_string(),
            project: config.pypi_package.clone(),
        }
    }

    /// Conventional sdist location, without consulting the index.
    pub fn direct_sdist_url(&self, version: &str) -> String {
        let initial = self.project.chars().next().unwrap_or('_');
        let project = encode(&self.project);
        format!("{}/{initial}/{project}/{project}-{version}.tar.gz", self.files_url)
    }

    /// Authoritative sdist URL from the release metadata.
    pub async fn sdist_url(&self, version: &str) -> Result<String> {
        let url = format!("{}/{}/{}/json", self.api_url, encode(&self.project), encode(version));
        let body = self.fetch.get_text(&url).await?;
        let release: ReleaseResponse = serde_json::from_str(&body).map_err(|err| {
            DistError::Serialization(format!("Failed to decode index response {url}: {err}"))
        })?;
        release
            .urls
            .into_iter()
            .find(|file| file.packagetype == "sdist")
            .map(|file| file.url)
            .ok_or_else(|| {
                DistError::MissingResource(format!(
                    "No source distribution published for {} {version}",
                    self.project
                ))
            })
    }

    /// Latest published version.
    pub async fn latest_version(&self) -> Result<String> {
        let url = format!("{}/{}/json", self.api_url, encode(&self.project));
        let body = self.fetch.get_text(&url).await?;
        let project: ProjectResponse = serde_json::from_str(&body).map_err(|err| {
            DistError::Serialization(format!("Failed to decode index response {url}: {err}"))
        })?;
        Ok(project.info.version)
    }
}

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    #[serde(default)]
    urls: Vec<ReleaseFile>,
}

#[derive(Debug, Deserialize)]
struct ReleaseFile {
    packagetype: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct ProjectResponse {
    info: ProjectInfo,
}

#[derive(Debug, Deserialize)]
struct ProjectInfo {
    version: String,
}
