use std::collections::HashSet;
use std::fs;
use std::path::Path;

use regex::Regex;

use crate::error::{Error, Result};

/// Files directly under `source_dir` that match a recognized extension and
/// are neither watched, ignored, nor caught by an ignored-name pattern.
pub fn new_documents(
    source_dir: &Path,
    recognized_extensions: &[String],
    watched: &[String],
    ignored: &[String],
    ignored_patterns: &[Regex],
) -> Result<Vec<String>> {
    let watched: HashSet<&str> = watched.iter().map(String::as_str).collect();
    let ignored: HashSet<&str> = ignored.iter().map(String::as_str).collect();

    let entries = fs::read_dir(source_dir)
        .map_err(|err| Error::io(format!("read source directory {}", source_dir.display()), err))?;

    let mut out = Vec::new();
    for entry in entries {
        let entry = entry
            .map_err(|err| Error::io(format!("read entry in {}", source_dir.display()), err))?;
        let file_type = entry
            .file_type()
            .map_err(|err| Error::io(format!("file type of {}", entry.path().display()), err))?;
        if !file_type.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            // Non-UTF-8 names cannot become document keys.
            continue;
        };
        if !recognized_extensions.iter().any(|ext| name.ends_with(ext.as_str())) {
            continue;
        }
        if watched.contains(name.as_str()) || ignored.contains(name.as_str()) {
            continue;
        }
        if ignored_patterns.iter().any(|pattern| pattern.is_match(&name)) {
            continue;
        }
        out.push(name);
    }
    out.sort();
    Ok(out)
}
