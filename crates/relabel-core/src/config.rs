//! Configuration for relabel
//!
//! Stored in .relabel/config.toml. Credentials never live here; the GitHub
//! token comes from the environment.

use crate::plan::Convergence;
use crate::rules::{Rule, RuleTable};
use crate::snapshot::{RELABEL_DIR, SNAPSHOT_FILE};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.toml";

/// relabel configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Whether applying a rule also removes the legacy labels it supersedes
    pub convergence: Convergence,

    /// GitHub repository settings
    pub github: GitHubConfig,

    /// Snapshot cache settings
    pub snapshot: SnapshotConfig,

    /// Consolidation rules; the built-in table is used when empty
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

/// GitHub repository settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    /// Repository owner (user or organization)
    pub owner: String,

    /// Repository name
    pub repo: String,

    /// API base URL
    pub api_url: String,

    /// Page size for issue and timeline listings (max 100)
    pub per_page: u8,

    /// Timeline requests in flight while fetching
    pub concurrency: usize,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            owner: String::new(),
            repo: String::new(),
            api_url: "https://api.github.com".to_string(),
            per_page: 100,
            concurrency: crate::fetch::DEFAULT_CONCURRENCY,
        }
    }
}

impl GitHubConfig {
    /// "owner/repo", or an error when either part is missing
    pub fn slug(&self) -> Result<String> {
        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(Error::Configuration(
                "github.owner and github.repo must be set".into(),
            ));
        }
        Ok(format!("{}/{}", self.owner, self.repo))
    }
}

/// Snapshot cache settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Snapshot file; defaults to .relabel/issues.jsonl
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load config from a TOML file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save config to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Pick the config file: an explicit path, then ./.relabel/config.toml,
    /// then the user config directory. Falls back to the local path.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        if let Some(path) = explicit {
            return path.to_path_buf();
        }

        let local = PathBuf::from(RELABEL_DIR).join(CONFIG_FILE);
        if local.exists() {
            return local;
        }

        dirs::config_dir()
            .map(|dir| dir.join("relabel").join(CONFIG_FILE))
            .filter(|p| p.exists())
            .unwrap_or(local)
    }

    /// Validated rule table for this config
    pub fn rule_table(&self) -> Result<RuleTable> {
        if self.rules.is_empty() {
            return Ok(RuleTable::default());
        }
        RuleTable::new(self.rules.clone())
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.snapshot
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(RELABEL_DIR).join(SNAPSHOT_FILE))
    }

    /// Generate a default config file with comments
    pub fn default_with_comments() -> String {
        r#"# relabel configuration

# What to do once a rule wins for an issue:
#   "add"     - only add the rule's result label
#   "replace" - also remove the legacy labels the result supersedes
convergence = "add"

[github]
# Repository whose closed issues are reconciled
owner = ""
repo = ""

# API base URL (change for GitHub Enterprise)
api_url = "https://api.github.com"

# Page size for listings (max 100)
per_page = 100

# Timeline requests in flight while fetching
concurrency = 10

[snapshot]
# Where the fetched issues and timelines are cached
# path = ".relabel/issues.jsonl"

# Consolidation rules. Leave out to use the built-in table.
# Lower priority wins; ties go to the rule declared first.
#
# [[rules]]
# result = "prioridade:critico"
# old = ["sup:gravidade:não consegue contornar"]
# priority = 0
"#
        .to_string()
    }
}
