//! Version extraction from free-text `-version` output.

use regex::Regex;
use semver::{Version, VersionReq};
use std::sync::OnceLock;

fn version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\d+)\.(\d+)(?:\.(\d+))?").expect("version pattern is valid")
    })
}

/// Extract the first semver-shaped token from tool output.
///
/// The first line is searched first since that is where tools print their own
/// version; later lines often carry compiler or library versions. Two-part
/// versions such as `6.1` are padded with a zero patch component.
pub fn extract_version(output: &str) -> Option<Version> {
    let first_line = output.lines().next().unwrap_or("");
    find_version(first_line).or_else(|| find_version(output))
}

fn find_version(text: &str) -> Option<Version> {
    let caps = version_pattern().captures(text)?;
    let major = caps.get(1)?.as_str().parse().ok()?;
    let minor = caps.get(2)?.as_str().parse().ok()?;
    let patch = caps
        .get(3)
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// Check tool output against `req`.
///
/// A wildcard requirement accepts output with no recognizable version (git
/// snapshot builds print none).
pub fn check_version(
    name: &str,
    output: &str,
    req: &VersionReq,
) -> fp_core::Result<Option<Version>> {
    match extract_version(output) {
        Some(version) if req.matches(&version) => Ok(Some(version)),
        Some(version) => Err(fp_core::Error::version_mismatch(
            name,
            version.to_string(),
            req.to_string(),
        )),
        None if *req == VersionReq::STAR => Ok(None),
        None => {
            let first_line = output.lines().next().unwrap_or("").trim();
            Err(fp_core::Error::version_mismatch(
                name,
                format!("no version in output '{first_line}'"),
                req.to_string(),
            ))
        }
    }
}
