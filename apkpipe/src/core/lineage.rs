//! Per-APK progress through the pipeline, derived from working-directory names.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::core::naming::{ArtifactKind, classify, signed_name, tree_name, unsigned_name};

/// Furthest stage an APK lineage has reached on disk.
///
/// `Installed` is not observable from the workdir and is never reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LineageStage {
    Pulled,
    Decompiled,
    Unsigned,
    Signed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Lineage {
    /// Raw APK file name.
    pub apk: String,
    pub stage: LineageStage,
}

/// Working-directory contents grouped by artifact kind, each list sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkdirSummary {
    pub raw: Vec<String>,
    pub trees: Vec<String>,
    pub unsigned: Vec<String>,
    pub signed: Vec<String>,
    pub bundles: Vec<String>,
    pub lineages: Vec<Lineage>,
}

/// Summarize a directory listing given as `(name, is_dir)` pairs.
pub fn summarize<'a>(entries: impl IntoIterator<Item = (&'a str, bool)>) -> WorkdirSummary {
    let mut summary = WorkdirSummary::default();
    let mut dirs = BTreeSet::new();
    let mut files = BTreeSet::new();

    for (name, is_dir) in entries {
        if is_dir {
            dirs.insert(name);
        } else {
            files.insert(name);
        }
        let bucket = match classify(name, is_dir) {
            ArtifactKind::Raw => &mut summary.raw,
            ArtifactKind::Tree => &mut summary.trees,
            ArtifactKind::Unsigned => &mut summary.unsigned,
            ArtifactKind::Signed => &mut summary.signed,
            ArtifactKind::Bundle => &mut summary.bundles,
            ArtifactKind::Other => continue,
        };
        bucket.push(name.to_string());
    }

    for list in [
        &mut summary.raw,
        &mut summary.trees,
        &mut summary.unsigned,
        &mut summary.signed,
        &mut summary.bundles,
    ] {
        list.sort();
    }

    summary.lineages = summary
        .raw
        .iter()
        .map(|apk| Lineage {
            apk: apk.clone(),
            stage: lineage_stage(apk, &dirs, &files),
        })
        .collect();
    summary
}

fn lineage_stage(apk: &str, dirs: &BTreeSet<&str>, files: &BTreeSet<&str>) -> LineageStage {
    let Some(tree) = tree_name(apk) else {
        return LineageStage::Pulled;
    };
    let unsigned = unsigned_name(tree);
    if files.contains(signed_name(&unsigned).as_str()) {
        LineageStage::Signed
    } else if files.contains(unsigned.as_str()) {
        LineageStage::Unsigned
    } else if dirs.contains(tree) {
        LineageStage::Decompiled
    } else {
        LineageStage::Pulled
    }
}
