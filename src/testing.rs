/*============================================================
  Synavera Project: CardShell Dist
  Module: cardshell_dist::testing
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Scripted host and fetcher doubles for flow and builder
    tests.

  Security / Safety Notes:
    Test-only; never compiled into the binaries.

  Dependencies:
    crate::host, crate::fetch, crate::flows::Context.

  Operational Scope:
    #[cfg(test)] modules across the crate.

  Revision History:
    2026-10-19 COD  Authored test doubles.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Every command recorded for assertions
============================================================*/

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::config::{DistConfig, EnvOverrides};
use crate::error::{DistError, Result};
use crate::fetch::Fetch;
use crate::flows::Context;
use crate::host::{CommandOutput, CommandSpec, Host};
use crate::logger::Logger;

/// Answers commands from a prefix table and records every invocation.
pub struct ScriptedHost {
    rules: Vec<(String, CommandOutput)>,
    commands: HashSet<String>,
    files: HashMap<PathBuf, String>,
    outputs: Vec<(String, PathBuf)>,
    root: bool,
    default_success: bool,
    calls: Mutex<Vec<String>>,
}

impl ScriptedHost {
    /// Unmatched commands fail with status 1.
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            commands: HashSet::new(),
            files: HashMap::new(),
            outputs: Vec::new(),
            root: true,
            default_success: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Unmatched commands succeed with empty output.
    pub fn lenient() -> Self {
        Self {
            default_success: true,
            ..Self::new()
        }
    }

    pub fn with_commands(mut self, names: &[&str]) -> Self {
        self.commands.extend(names.iter().map(|name| name.to_string()));
        self
    }

    pub fn with_file(mut self, path: &str, contents: &str) -> Self {
        self.files.insert(PathBuf::from(path), contents.to_string());
        self
    }

    pub fn as_user(mut self) -> Self {
        self.root = false;
        self
    }

    /// First rule whose prefix matches the rendered command wins.
    pub fn on(mut self, prefix: &str, output: CommandOutput) -> Self {
        self.rules.push((prefix.to_string(), output));
        self
    }

    /// A command matching `prefix` leaves an empty file at `path`.
    pub fn produces(mut self, prefix: &str, path: impl Into<PathBuf>) -> Self {
        self.outputs.push((prefix.to_string(), path.into()));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|calls| calls.clone()).unwrap_or_default()
    }

    pub fn ran(&self, prefix: &str) -> bool {
        self.calls().iter().any(|call| call.starts_with(prefix))
    }
}

impl Host for ScriptedHost {
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        let rendered = spec.to_string();
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(rendered.clone());
        }
        for (prefix, path) in &self.outputs {
            if rendered.starts_with(prefix.as_str()) {
                std::fs::write(path, b"")?;
            }
        }
        if let Some((_, output)) = self
            .rules
            .iter()
            .find(|(prefix, _)| rendered.starts_with(prefix.as_str()))
        {
            return Ok(output.clone());
        }
        if self.default_success {
            Ok(CommandOutput::ok(""))
        } else {
            Ok(CommandOutput::failed(1, format!("unscripted: {rendered}")))
        }
    }

    fn has_command(&self, name: &str) -> bool {
        self.commands.contains(name)
    }

    fn read_to_string(&self, path: &Path) -> Option<String> {
        self.files.get(path).cloned()
    }

    fn is_root(&self) -> bool {
        self.root
    }
}

/// Serves canned bodies by URL; unknown URLs fail as network errors.
#[derive(Default)]
pub struct ScriptedFetch {
    bodies: HashMap<String, Vec<u8>>,
    requests: Mutex<Vec<String>>,
}

impl ScriptedFetch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    fn lookup(&self, url: &str) -> Result<Vec<u8>> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(url.to_string());
        }
        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| DistError::Network(format!("Request to {url} failed with status 404")))
    }
}

impl Fetch for ScriptedFetch {
    async fn download(&self, url: &str, dest: &Path) -> Result<u64> {
        let body = self.lookup(url)?;
        std::fs::write(dest, &body)?;
        Ok(body.len() as u64)
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let body = self.lookup(url)?;
        String::from_utf8(body).map_err(|err| DistError::Serialization(err.to_string()))
    }
}

/// Owns the collaborators a flow borrows through `Context`.
pub struct Harness {
    pub host: ScriptedHost,
    pub fetch: ScriptedFetch,
    pub config: DistConfig,
    pub overrides: EnvOverrides,
    pub logger: Logger,
}

impl Harness {
    pub fn new(host: ScriptedHost, fetch: ScriptedFetch) -> Self {
        Self {
            host,
            fetch,
            config: DistConfig::default(),
            overrides: EnvOverrides::default(),
            logger: Logger::quiet(None).expect("quiet logger without file"),
        }
    }

    pub fn ctx(&self) -> Context<'_, ScriptedHost, ScriptedFetch> {
        Context {
            host: &self.host,
            fetch: &self.fetch,
            config: &self.config,
            overrides: &self.overrides,
            logger: &self.logger,
        }
    }
}
