//! Filesystem view of a pipeline working directory.
//!
//! Every stage takes a [`WorkDir`] as its only required location input. The
//! directory is created on first use by pull and never deleted by the pipeline.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::lineage::{WorkdirSummary, summarize};
use crate::core::naming::{ArtifactKind, classify, is_apk_name, sort_for_install};
use crate::error::{PipelineError, PipelineResult};

/// One direct child of the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub name: String,
    pub path: PathBuf,
    pub is_dir: bool,
}

impl Entry {
    pub fn kind(&self) -> ArtifactKind {
        classify(&self.name, self.is_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    root: PathBuf,
}

impl WorkDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn join(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Create the directory if needed. Idempotent.
    pub fn ensure_created(&self) -> PipelineResult<()> {
        fs::create_dir_all(&self.root)
            .map_err(|e| PipelineError::io(format!("create {}", self.root.display()), e))
    }

    /// Fail with `DirectoryNotFound` unless the directory exists.
    pub fn require_exists(&self) -> PipelineResult<()> {
        if self.root.is_dir() {
            return Ok(());
        }
        Err(PipelineError::DirectoryNotFound {
            path: self.root.clone(),
        })
    }

    /// Direct children sorted by name. Names that are not valid UTF-8 are skipped.
    pub fn entries(&self) -> PipelineResult<Vec<Entry>> {
        self.require_exists()?;
        let read = fs::read_dir(&self.root)
            .map_err(|e| PipelineError::io(format!("read {}", self.root.display()), e))?;
        let mut entries = Vec::new();
        for entry in read {
            let entry =
                entry.map_err(|e| PipelineError::io(format!("read {}", self.root.display()), e))?;
            let path = entry.path();
            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %path.display(), "skipping non UTF-8 file name");
                continue;
            };
            let is_dir = path.is_dir();
            entries.push(Entry { name, path, is_dir });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(root = %self.root.display(), count = entries.len(), "listed workdir");
        Ok(entries)
    }

    /// Every `*.apk` file directly inside, whatever stage produced it.
    pub fn apk_files(&self) -> PipelineResult<Vec<PathBuf>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| !e.is_dir && is_apk_name(&e.name))
            .map(|e| e.path)
            .collect())
    }

    /// Candidate decompiled trees: subdirectories not named `*.apk`.
    pub fn trees(&self) -> PipelineResult<Vec<Entry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.kind() == ArtifactKind::Tree)
            .collect())
    }

    /// Ready-to-install APKs in install order.
    pub fn signed_apks(&self) -> PipelineResult<Vec<PathBuf>> {
        let mut names: Vec<String> = self
            .entries()?
            .into_iter()
            .filter(|e| e.kind() == ArtifactKind::Signed)
            .map(|e| e.name)
            .collect();
        sort_for_install(&mut names);
        Ok(names.iter().map(|name| self.join(name)).collect())
    }

    pub fn bundles(&self) -> PipelineResult<Vec<PathBuf>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.kind() == ArtifactKind::Bundle)
            .map(|e| e.path)
            .collect())
    }

    /// Names already present, files and directories alike.
    pub fn taken_names(&self) -> PipelineResult<HashSet<String>> {
        Ok(self.entries()?.into_iter().map(|e| e.name).collect())
    }

    pub fn summary(&self) -> PipelineResult<WorkdirSummary> {
        let entries = self.entries()?;
        Ok(summarize(
            entries.iter().map(|e| (e.name.as_str(), e.is_dir)),
        ))
    }
}
