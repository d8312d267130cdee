//! Parsing for package-manager output returned by the device.

use std::sync::LazyLock;

use regex::Regex;

const PACKAGE_PREFIX: &str = "package:";

/// Parse `pm list packages` / `pm path` output into its values.
///
/// Each line looks like `package:<value>`; the prefix is stripped, lines are
/// trimmed (device shells emit `\r\n`) and blank lines dropped.
pub fn parse_package_lines(output: &str) -> Vec<String> {
    output
        .lines()
        .map(|line| {
            let line = line.trim();
            line.strip_prefix(PACKAGE_PREFIX).unwrap_or(line).trim()
        })
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}

/// Keep identifiers containing `filter` as a case-insensitive substring.
pub fn filter_packages(packages: Vec<String>, filter: Option<&str>) -> Vec<String> {
    let Some(filter) = filter.map(str::to_lowercase) else {
        return packages;
    };
    packages
        .into_iter()
        .filter(|pkg| pkg.to_lowercase().contains(&filter))
        .collect()
}

/// True for a well-formed package id: dot-separated segments of letters,
/// digits and `_`. Single-segment ids such as `android` are valid.
pub fn is_valid_package_id(id: &str) -> bool {
    static PACKAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$").expect("static package regex")
    });
    PACKAGE_RE.is_match(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_output_with_crlf() {
        let raw = "package:com.android.camera2\r\npackage:com.example.app\r\n\r\n";
        assert_eq!(
            parse_package_lines(raw),
            vec!["com.android.camera2", "com.example.app"]
        );
    }

    #[test]
    fn parses_path_output() {
        let raw = "package:/data/app/a/base.apk\npackage:/data/app/a/split_config.en.apk\n";
        assert_eq!(
            parse_package_lines(raw),
            vec!["/data/app/a/base.apk", "/data/app/a/split_config.en.apk"]
        );
    }

    #[test]
    fn filter_is_case_insensitive_substring() {
        let packages = vec![
            "com.android.camera2".to_string(),
            "com.example.app".to_string(),
        ];
        assert_eq!(
            filter_packages(packages.clone(), Some("CAMERA")),
            vec!["com.android.camera2"]
        );
        assert_eq!(filter_packages(packages.clone(), None), packages);
        assert!(filter_packages(packages, Some("maps")).is_empty());
    }

    #[test]
    fn package_id_validation() {
        assert!(is_valid_package_id("com.example.app"));
        assert!(is_valid_package_id("org.mozilla.firefox_beta"));
        assert!(is_valid_package_id("android"));
        assert!(!is_valid_package_id("com.example/../../etc"));
        assert!(!is_valid_package_id("-s"));
        assert!(!is_valid_package_id("com.example; reboot"));
        assert!(!is_valid_package_id("com..example"));
        assert!(!is_valid_package_id(".com.example"));
        assert!(!is_valid_package_id(""));
    }
}
