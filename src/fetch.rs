/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::fetch
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Download release artifacts, checksum manifests and package
    index metadata over HTTPS.

  Security / Safety Notes:
    Performs GET requests only. Partially written files are
    removed when a download fails midway.

  Dependencies:
    reqwest for HTTP, tokio::fs for writing artifacts.

  Operational Scope:
    Used by deb mode, version resolution and the builder's
    source download.

  Revision History:
    2026-10-19 COD  Implemented HTTP fetch layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Fixed connect timeouts, no hidden retries
    - Structured error paths naming the failing URL
============================================================*/

#![allow(async_fn_in_trait)]

use std::path::Path;
use std::time::Duration;

use crate::error::{DistError, Result};

/// Network seam for downloads.
pub trait Fetch {
    /// Download `url` into `dest`, replacing any existing file.
    async fn download(&self, url: &str, dest: &Path) -> Result<u64>;

    /// Fetch `url` as text.
    async fn get_text(&self, url: &str) -> Result<String>;
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(connect_timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .user_agent(concat!("cardshell-dist/", env!("CARGO_PKG_VERSION"), " (linux)"))
            .build()
            .map_err(|err| DistError::Network(format!("Failed to build HTTP client: {err}")))?;
        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| DistError::Network(format!("Request to {url} failed: {err}")))?;
        if !response.status().is_success() {
            return Err(DistError::Network(format!(
                "Request to {url} failed with status {}",
                response.status()
            )));
        }
        Ok(response)
    }
}

impl Fetch for HttpFetcher {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let response = self.get(url).await?;
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                return Err(DistError::Network(format!(
                    "Reading body from {url} failed: {err}"
                )))
            }
        };
        if let Err(err) = tokio::fs::write(dest, &body).await {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(DistError::Filesystem(format!(
                "Failed to write {}: {err}",
                dest.display()
            )));
        }
        Ok(body.len() as u64)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.get(url)
            .await?
            .text()
            .await
            .map_err(|err| DistError::Network(format!("Reading body from {url} failed: {err}")))
    }
}
