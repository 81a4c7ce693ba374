// Artifact lookup: resolve the configured glob pattern under the workspace
// root to exactly one regular file.

use glob::{MatchOptions, Pattern};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Error, Result};

/// Find the single file under `root` matching `pattern`. No match, or more
/// than one, is reported with the candidates so the user can disambiguate.
pub fn search_for_artifact(root: &Path, pattern: &str) -> Result<PathBuf> {
    let matches = find_matches(root, pattern)?;
    match matches.as_slice() {
        [single] => Ok(single.clone()),
        [] => Err(Error::Artifact(format!(
            "Found no files as candidates for pattern '{}'",
            pattern
        ))),
        many => {
            let names: Vec<String> = many
                .iter()
                .map(|p| p.strip_prefix(root).unwrap_or(p).display().to_string())
                .collect();
            Err(Error::Artifact(format!(
                "Found ambiguous list [{}] as candidates for pattern '{}'",
                names.join(", "),
                pattern
            )))
        }
    }
}

fn find_matches(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let full = format!(
        "{}/{}",
        Pattern::escape(&root.to_string_lossy()),
        pattern.trim_start_matches("./")
    );
    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };
    let paths = glob::glob_with(&full, options)
        .map_err(|e| Error::Artifact(format!("Invalid file pattern '{}': {}", pattern, e.msg)))?;

    Ok(regular_files(paths))
}

/// Keep the regular files among `entries`, sorted. Unreadable entries are
/// logged and skipped.
fn regular_files<I, E>(entries: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = std::result::Result<PathBuf, E>>,
    E: fmt::Display,
{
    let mut files = Vec::new();
    for entry in entries {
        match entry {
            Ok(path) if path.is_file() => files.push(path),
            Ok(_) => {}
            Err(e) => warn!("skipping unreadable entry: {}", e),
        }
    }
    files.sort();
    files
}
