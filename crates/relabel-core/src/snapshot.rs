//! JSONL snapshot of issues and their timelines
//!
//! One issue per line. The snapshot is a full materialization, never a
//! delta, and is read-only once loaded.

use crate::{Error, Issue, Result};
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const RELABEL_DIR: &str = ".relabel";
pub const SNAPSHOT_FILE: &str = "issues.jsonl";

/// File-backed snapshot cache
#[derive(Debug, Clone)]
pub struct SnapshotCache {
    path: PathBuf,
}

impl SnapshotCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Default location under `root`
    pub fn in_dir(root: &Path) -> Self {
        Self::new(root.join(RELABEL_DIR).join(SNAPSHOT_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load all issues, or `None` when no snapshot has been taken yet
    pub fn load(&self) -> Result<Option<Vec<Issue>>> {
        if !self.exists() {
            return Ok(None);
        }

        let file = File::open(&self.path)?;
        let reader = BufReader::new(file);
        let mut issues = Vec::new();

        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let issue: Issue = serde_json::from_str(&line).map_err(|e| {
                Error::Other(format!(
                    "Invalid snapshot line {} in {}: {}",
                    n + 1,
                    self.path.display(),
                    e
                ))
            })?;
            issues.push(issue);
        }

        debug!(count = issues.len(), path = %self.path.display(), "loaded snapshot");
        Ok(Some(issues))
    }

    /// Write all issues, replacing any previous snapshot.
    ///
    /// Goes through a sibling temp file so a failed write leaves the old
    /// snapshot in place.
    pub fn save(&self, issues: &[Issue]) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let tmp = self.path.with_extension("jsonl.tmp");
        {
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            for issue in issues {
                serde_json::to_writer(&mut writer, issue)?;
                writeln!(writer)?;
            }
            writer.flush()?;
        }
        fs::rename(&tmp, &self.path)?;

        debug!(count = issues.len(), path = %self.path.display(), "saved snapshot");
        Ok(())
    }
}
