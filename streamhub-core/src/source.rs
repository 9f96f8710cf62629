use std::path::{Path, PathBuf};
use streamhub_common::{Result, StreamHubError};

const RECORD_EXTENSIONS: [&str; 3] = ["json", "jsonl", "ndjson"];

fn is_record_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| RECORD_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

pub fn scan_directory(base: &Path) -> Result<Vec<PathBuf>> {
    let mut results = Vec::new();
    scan_recursive(base, &mut results)?;
    results.sort();
    Ok(results)
}

fn scan_recursive(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            scan_recursive(&path, out)?;
        } else if is_record_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// resolve an input string: single file, directory of record files, or glob pattern
pub fn resolve_inputs(input: &str) -> Result<Vec<PathBuf>> {
    let path = Path::new(input);
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if path.is_dir() {
        return scan_directory(path);
    }
    let entries = glob::glob(input)
        .map_err(|e| StreamHubError::Other(format!("bad input pattern '{input}': {e}")))?;
    let mut results: Vec<PathBuf> = entries
        .flatten()
        .filter(|p| p.is_file() && is_record_file(p))
        .collect();
    results.sort();
    Ok(results)
}
