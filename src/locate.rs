use anyhow::{Context, Result};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use crate::logging::{log_year_discovered, log_year_shadowed};

/// A yearly source file and the label cut from its name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YearSource {
    pub year: String,
    pub path: PathBuf,
}

/// Label for `<prefix>_<year>.<ext>`: the last `_` token before the extension.
pub fn year_label(file_name: &str, prefix: &str, ext: &str) -> Option<String> {
    let stem = file_name.strip_suffix(ext)?.strip_suffix('.')?;
    let rest = stem.strip_prefix(prefix)?.strip_prefix('_')?;
    let label = rest.rsplit('_').next()?;
    if label.is_empty() {
        return None;
    }
    Some(label.to_string())
}

/// Numeric labels sort by value, everything else after them lexically.
pub fn compare_years(a: &str, b: &str) -> Ordering {
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x.cmp(&y).then_with(|| a.cmp(b)),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// List the yearly files in `dir`, sorted by year. A missing directory
/// yields an empty list. When several files share a year label the last
/// one in path order is used and the others are logged as shadowed.
pub fn discover(dir: &Path, prefix: &str, ext: &str) -> Result<Vec<YearSource>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut found = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("list {}", dir.display()))? {
        let entry = entry.with_context(|| format!("list {}", dir.display()))?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if let Some(year) = year_label(name, prefix, ext) {
            found.push(YearSource { year, path });
        }
    }
    found.sort_by(|a, b| compare_years(&a.year, &b.year).then_with(|| a.path.cmp(&b.path)));
    let found = keep_last_per_year(found);
    for src in &found {
        log_year_discovered(&src.year, &src.path.display().to_string());
    }
    Ok(found)
}

/// Collapse runs of equal labels in a sorted list to their last entry.
fn keep_last_per_year(sorted: Vec<YearSource>) -> Vec<YearSource> {
    let mut kept: Vec<YearSource> = Vec::with_capacity(sorted.len());
    for src in sorted {
        if let Some(prev) = kept.last_mut() {
            if prev.year == src.year {
                log_year_shadowed(&src.year, &prev.path.display().to_string(), &src.path.display().to_string());
                *prev = src;
                continue;
            }
        }
        kept.push(src);
    }
    kept
}
