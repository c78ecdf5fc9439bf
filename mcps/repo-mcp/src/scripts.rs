//! Script whitelist
//!
//! Callers only ever name a script; the command line comes from the project
//! manifest, which is read again on every lookup so edits apply immediately.
//! `package.json` scripts run through `npm run` so local bins and `pre`/`post`
//! hooks behave as they do for a developer; `[scripts]` tables run via the shell.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::guard::Root;
use crate::runner::Invocation;
use crate::types::ManifestError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManifestFormat {
    /// `package.json`-style `"scripts": { name: line }`
    Json,
    /// `[scripts]` table
    Toml,
}

impl ManifestFormat {
    fn for_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ManifestFormat::Toml,
            _ => ManifestFormat::Json,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptWhitelist {
    path: PathBuf,
    display_name: String,
    format: ManifestFormat,
}

impl ScriptWhitelist {
    /// `manifest` is relative to the root (e.g. `package.json`)
    pub fn new(root: &Root, manifest: &str) -> Self {
        let path = root.join(manifest);
        Self {
            format: ManifestFormat::for_path(&path),
            display_name: manifest.to_string(),
            path,
        }
    }

    pub fn manifest_path(&self) -> &Path {
        &self.path
    }

    /// Command line registered under `name`
    pub async fn lookup(&self, name: &str) -> Result<String, ManifestError> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ManifestError::Unreadable {
                path: self.path.clone(),
                source,
            })?;

        let entry = match self.format {
            ManifestFormat::Json => self.json_entry(&raw, name)?,
            ManifestFormat::Toml => self.toml_entry(&raw, name)?,
        };

        entry.ok_or_else(|| ManifestError::ScriptNotFound {
            name: name.to_string(),
            manifest: self.display_name.clone(),
        })
    }

    /// Whitelist check, then the invocation that runs `name`
    pub async fn invocation(&self, name: &str, shell: &str) -> Result<Invocation, ManifestError> {
        let line = self.lookup(name).await?;
        Ok(match self.format {
            ManifestFormat::Json => Invocation::new("npm", ["run", name]),
            ManifestFormat::Toml => Invocation::shell(shell, &line),
        })
    }

    fn json_entry(&self, raw: &str, name: &str) -> Result<Option<String>, ManifestError> {
        let doc: Value = serde_json::from_str(raw).map_err(|e| self.malformed(e))?;
        match doc.get("scripts").and_then(|scripts| scripts.get(name)) {
            None => Ok(None),
            Some(Value::String(line)) => Ok(Some(line.clone())),
            Some(_) => Err(self.malformed(format!("script '{}' is not a string", name))),
        }
    }

    fn toml_entry(&self, raw: &str, name: &str) -> Result<Option<String>, ManifestError> {
        let doc: toml::Table = toml::from_str(raw).map_err(|e| self.malformed(e))?;
        match doc.get("scripts").and_then(|scripts| scripts.get(name)) {
            None => Ok(None),
            Some(toml::Value::String(line)) => Ok(Some(line.clone())),
            Some(_) => Err(self.malformed(format!("script '{}' is not a string", name))),
        }
    }

    fn malformed(&self, detail: impl ToString) -> ManifestError {
        ManifestError::Malformed {
            path: self.path.clone(),
            detail: detail.to_string(),
        }
    }
}
