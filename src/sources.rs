//! Source List Parser - turns `repolist.txt` into the set of repositories to mirror

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MirrorError, Result};

/// An upstream repository selected for mirroring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySpec {
    /// Last path segment of the source URL, used verbatim (`app.git` stays `app.git`)
    pub name: String,
    pub source_url: String,
}

/// Read a repository list: one URL per line, blank lines and `#` comments ignored.
///
/// Keys are derived names. When two URLs derive the same name the later line
/// wins and a warning is logged.
pub fn parse_repo_list(path: &Path) -> Result<BTreeMap<String, String>> {
    let content = std::fs::read_to_string(path).map_err(|e| MirrorError::io(path, e))?;
    Ok(parse_repo_lines(&content))
}

/// Parse repository list content already in memory
pub fn parse_repo_lines(content: &str) -> BTreeMap<String, String> {
    let mut repos = BTreeMap::new();

    for (index, line) in content.lines().enumerate() {
        let url = line.trim();
        if url.is_empty() || url.starts_with('#') {
            continue;
        }

        let Some(name) = derive_repo_name(url) else {
            warn!("Line {}: cannot derive a repository name from {:?}, skipping", index + 1, url);
            continue;
        };

        if let Some(previous) = repos.insert(name.clone(), url.to_string()) {
            warn!(
                "Line {}: {} replaces {} for repository name {}",
                index + 1,
                url,
                previous,
                name
            );
        } else {
            debug!("Queued {} from {}", name, url);
        }
    }

    repos
}

/// Final path segment of a URL, ignoring a trailing slash
pub fn derive_repo_name(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    let segment = trimmed.rsplit(['/', ':']).next()?;

    // "https:" or a bare host leaves nothing usable
    if segment.is_empty() || trimmed.ends_with("//") || !trimmed.contains(['/', ':']) {
        return None;
    }
    if trimmed.split("://").nth(1).is_some_and(|rest| !rest.contains('/')) {
        return None;
    }

    Some(segment.to_string())
}

/// Repository specs in name order
pub fn specs(repos: &BTreeMap<String, String>) -> Vec<RepositorySpec> {
    repos
        .iter()
        .map(|(name, url)| RepositorySpec {
            name: name.clone(),
            source_url: url.clone(),
        })
        .collect()
}
