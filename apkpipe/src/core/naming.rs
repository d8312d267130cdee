//! Working-directory naming contract.
//!
//! Stage recognition is encoded in file names: the external signer appends
//! [`SIGNED_SUFFIX`] and the install stage selects on it, so these strings are
//! an interface with those tools and must not change.

use serde::Serialize;

/// Extension of raw, unsigned and signed APK files.
pub const APK_EXTENSION: &str = ".apk";
/// Extension of Android App Bundles consumed by the universal build.
pub const BUNDLE_EXTENSION: &str = ".aab";
/// Suffix of a rebuilt tree before signing.
pub const UNSIGNED_SUFFIX: &str = "-unsigned.apk";
/// Suffix the signer gives its output; marks an artifact as ready to install.
pub const SIGNED_SUFFIX: &str = "-aligned-debugSigned.apk";
/// Default file name for the universal APK set.
pub const UNIVERSAL_OUTPUT: &str = "universal.apks";

/// Kind of a working-directory entry, derived from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// APK pulled from the device (or placed by the operator).
    Raw,
    /// Decoded directory produced by the decompiler.
    Tree,
    /// Rebuilt APK awaiting the signer.
    Unsigned,
    /// Signer output, ready to install.
    Signed,
    /// App bundle for the universal build.
    Bundle,
    Other,
}

/// Classify a directory entry by name.
///
/// Directories are trees unless their name ends in `.apk`. Files are matched
/// on the most specific suffix first.
pub fn classify(name: &str, is_dir: bool) -> ArtifactKind {
    if is_dir {
        return if name.ends_with(APK_EXTENSION) {
            ArtifactKind::Other
        } else {
            ArtifactKind::Tree
        };
    }
    if name.ends_with(SIGNED_SUFFIX) {
        ArtifactKind::Signed
    } else if name.ends_with(UNSIGNED_SUFFIX) {
        ArtifactKind::Unsigned
    } else if is_apk_name(name) {
        ArtifactKind::Raw
    } else if name.len() > BUNDLE_EXTENSION.len() && name.ends_with(BUNDLE_EXTENSION) {
        ArtifactKind::Bundle
    } else {
        ArtifactKind::Other
    }
}

/// True if `name` has the `.apk` extension and a non-empty stem.
pub fn is_apk_name(name: &str) -> bool {
    name.len() > APK_EXTENSION.len() && name.ends_with(APK_EXTENSION)
}

/// Base file name of an on-device path (devices always use `/`).
pub fn remote_basename(remote: &str) -> &str {
    let trimmed = remote.trim();
    match trimmed.rfind('/') {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Choose the local file name for the `index`-th pulled APK.
///
/// The device base name is used when free. Otherwise the name becomes
/// `split_<index>_<basename>`, and if even that is taken a counter is added
/// (`split_<index>_<n>_<basename>`). `is_taken` must report both files already
/// on disk and names handed out earlier in the same pull, so distinct device
/// paths never map to the same local file.
pub fn allocate_local_name(
    basename: &str,
    index: usize,
    is_taken: impl Fn(&str) -> bool,
) -> String {
    if !is_taken(basename) {
        return basename.to_string();
    }
    let split = format!("split_{index}_{basename}");
    if !is_taken(&split) {
        return split;
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("split_{index}_{n}_{basename}");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Directory name a decompiled APK is written to: the file name minus `.apk`.
pub fn tree_name(apk_name: &str) -> Option<&str> {
    if !is_apk_name(apk_name) {
        return None;
    }
    apk_name.strip_suffix(APK_EXTENSION)
}

/// `<tree>-unsigned.apk`
pub fn unsigned_name(tree: &str) -> String {
    format!("{tree}{UNSIGNED_SUFFIX}")
}

/// Name the signer gives the signed copy of `apk_name`.
pub fn signed_name(apk_name: &str) -> String {
    let stem = apk_name.strip_suffix(APK_EXTENSION).unwrap_or(apk_name);
    format!("{stem}{SIGNED_SUFFIX}")
}

/// Sort file names for `install-multiple`.
///
/// Plain lexicographic byte order: base APKs conventionally sort before their
/// `split_*` siblings, and installers expect the base first.
pub fn sort_for_install(names: &mut [String]) {
    names.sort_unstable();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn allocate_all(existing: &[&str], remotes: &[&str]) -> Vec<String> {
        let mut taken: HashSet<String> = existing.iter().map(|s| s.to_string()).collect();
        let mut out = Vec::new();
        for (idx, remote) in remotes.iter().enumerate() {
            let name = allocate_local_name(remote_basename(remote), idx, |n| taken.contains(n));
            taken.insert(name.clone());
            out.push(name);
        }
        out
    }

    #[test]
    fn duplicate_basenames_get_split_prefix() {
        let names = allocate_all(&[], &["/data/app/a/base.apk", "/data/app/a/base.apk"]);
        assert_eq!(names, vec!["base.apk", "split_1_base.apk"]);
    }

    #[test]
    fn distinct_basenames_keep_device_names() {
        let names = allocate_all(
            &[],
            &[
                "/data/app/x/base.apk",
                "/data/app/x/split_config.arm64_v8a.apk",
                "/data/app/x/split_config.en.apk",
            ],
        );
        assert_eq!(
            names,
            vec![
                "base.apk",
                "split_config.arm64_v8a.apk",
                "split_config.en.apk"
            ]
        );
    }

    #[test]
    fn existing_files_are_never_reused() {
        let existing = ["base.apk", "split_0_base.apk", "split_0_1_base.apk"];
        let names = allocate_all(&existing, &["/data/app/base.apk"]);
        assert_eq!(names, vec!["split_0_2_base.apk"]);
    }

    #[test]
    fn allocation_is_injective_for_duplicate_heavy_sequences() {
        let pool = ["base.apk", "split_1_base.apk", "config.apk", "split_0_config.apk"];
        // Every subset of pre-existing names against 6 pulls drawn from two base names.
        for mask in 0u32..16 {
            let existing: Vec<&str> = pool
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, n)| *n)
                .collect();
            for pattern in 0u32..64 {
                let remotes: Vec<String> = (0..6)
                    .map(|i| {
                        if pattern & (1 << i) != 0 {
                            format!("/data/app/p{i}/base.apk")
                        } else {
                            format!("/data/app/p{i}/config.apk")
                        }
                    })
                    .collect();
                let refs: Vec<&str> = remotes.iter().map(String::as_str).collect();
                let names = allocate_all(&existing, &refs);

                let unique: HashSet<&String> = names.iter().collect();
                assert_eq!(unique.len(), names.len(), "collision in {names:?}");
                for name in &names {
                    assert!(
                        !existing.contains(&name.as_str()),
                        "{name} overwrites a pre-existing file"
                    );
                }
            }
        }
    }

    #[test]
    fn remote_basename_handles_plain_names() {
        assert_eq!(remote_basename("/data/app/~~x==/pkg-1/base.apk"), "base.apk");
        assert_eq!(remote_basename("base.apk"), "base.apk");
        assert_eq!(remote_basename(" /a/b.apk \r"), "b.apk");
    }

    #[test]
    fn tree_and_artifact_names_follow_convention() {
        assert_eq!(tree_name("split_1_base.apk"), Some("split_1_base"));
        assert_eq!(tree_name("notes.txt"), None);
        assert_eq!(tree_name(".apk"), None);
        assert_eq!(unsigned_name("base"), "base-unsigned.apk");
        assert_eq!(
            signed_name(&unsigned_name("base")),
            "base-unsigned-aligned-debugSigned.apk"
        );
    }

    #[test]
    fn classify_prefers_most_specific_suffix() {
        assert_eq!(classify("base.apk", false), ArtifactKind::Raw);
        assert_eq!(classify("base-unsigned.apk", false), ArtifactKind::Unsigned);
        assert_eq!(
            classify("base-unsigned-aligned-debugSigned.apk", false),
            ArtifactKind::Signed
        );
        assert_eq!(classify("app.aab", false), ArtifactKind::Bundle);
        assert_eq!(classify("README", false), ArtifactKind::Other);
        assert_eq!(classify("base", true), ArtifactKind::Tree);
        assert_eq!(classify("weird.apk", true), ArtifactKind::Other);
    }

    #[test]
    fn install_order_puts_base_first() {
        let mut names = vec![
            "split_1_base-unsigned-aligned-debugSigned.apk".to_string(),
            "base-unsigned-aligned-debugSigned.apk".to_string(),
            "Split_config-unsigned-aligned-debugSigned.apk".to_string(),
        ];
        sort_for_install(&mut names);
        assert_eq!(
            names,
            vec![
                "Split_config-unsigned-aligned-debugSigned.apk",
                "base-unsigned-aligned-debugSigned.apk",
                "split_1_base-unsigned-aligned-debugSigned.apk",
            ]
        );
    }
}
