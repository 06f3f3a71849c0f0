use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use gatehouse_eval::{EvalError, TreeWalk};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    /// root-relative, `/`-separated
    pub rel: String,
    pub path: PathBuf,
    pub size: u64,
}

/// Matches the path itself or any of its ancestor directories, so `docs` selects everything below it.
fn matches_path_or_parent(set: &GlobSet, rel: &str) -> bool {
    if set.is_match(rel) {
        return true;
    }
    let mut cur = rel;
    while let Some(idx) = cur.rfind('/') {
        cur = &cur[..idx];
        if set.is_match(cur) {
            return true;
        }
    }
    false
}

/// `*` and `?` stop at `/`; only `**` crosses directories.
fn path_glob_set(patterns: &[String]) -> Result<GlobSet, EvalError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| EvalError::pattern(pattern, e))?;
        builder.add(glob);
    }
    builder.build().map_err(|e| EvalError::pattern(&patterns.join(","), e))
}

/// Union of include globs minus exclude globs, deduplicated and sorted by relative path.
/// `skip_dirs` are never descended into (VCS metadata, the release output tree).
pub fn select_files(
    root: &Path,
    include: &[String],
    exclude: &[String],
    skip_dirs: &[String],
) -> Result<Vec<SelectedFile>, EvalError> {
    let include = path_glob_set(include)?;
    let exclude = path_glob_set(exclude)?;
    let mut picked = BTreeMap::new();
    for f in TreeWalk::with_skip(root, skip_dirs.iter().cloned()).files() {
        if !matches_path_or_parent(&include, &f.rel) || matches_path_or_parent(&exclude, &f.rel) {
            continue;
        }
        picked.insert(
            f.rel.clone(),
            SelectedFile {
                rel: f.rel,
                path: f.path,
                size: f.size,
            },
        );
    }
    Ok(picked.into_values().collect())
}
