//! Read-only tree walking shared by every counting evaluator and the preflight scans.
//!
//! Top-level directories are walked in parallel with rayon; the result is always sorted by relative
//! path so callers never observe scheduling order.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use walkdir::WalkDir;

pub const DEFAULT_SKIP_DIRS: &[&str] = &[".git", "node_modules", "__pycache__", "htmlcov", "dist", "target"];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkedFile {
    /// Path relative to the walk root, `/`-separated.
    pub rel: String,
    pub path: PathBuf,
    pub size: u64,
}

#[derive(Clone, Debug)]
pub struct TreeWalk {
    root: PathBuf,
    skip_dirs: BTreeSet<String>,
}

impl TreeWalk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_skip(root, DEFAULT_SKIP_DIRS.iter().copied())
    }

    pub fn with_skip<I, S>(root: impl Into<PathBuf>, skip: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            root: root.into(),
            skip_dirs: skip.into_iter().map(Into::into).collect(),
        }
    }

    /// All regular files below the root. A missing root yields no files.
    pub fn files(&self) -> Vec<WalkedFile> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return vec![];
        };
        let mut top_files = Vec::new();
        let mut top_dirs = Vec::new();
        for entry in entries.flatten() {
            let Ok(ft) = entry.file_type() else { continue };
            let name = entry.file_name().to_string_lossy().to_string();
            if ft.is_dir() {
                if !self.skip_dirs.contains(&name) {
                    top_dirs.push(entry.path());
                }
            } else if ft.is_file() {
                if let Some(f) = self.walked(&entry.path()) {
                    top_files.push(f);
                }
            }
        }

        let nested: Vec<WalkedFile> = top_dirs.par_iter().flat_map_iter(|dir| self.walk_dir(dir)).collect();
        let mut all = top_files;
        all.extend(nested);
        all.sort_by(|a, b| a.rel.cmp(&b.rel));
        all
    }

    fn walk_dir(&self, dir: &Path) -> Vec<WalkedFile> {
        WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| !(e.file_type().is_dir() && self.skip_dirs.contains(&*e.file_name().to_string_lossy())))
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    tracing::debug!(error = %err, "skipping unreadable entry");
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| self.walked(e.path()))
            .collect()
    }

    fn walked(&self, path: &Path) -> Option<WalkedFile> {
        let size = std::fs::metadata(path).ok()?.len();
        Some(WalkedFile {
            rel: rel_path(&self.root, path)?,
            path: path.to_path_buf(),
            size,
        })
    }
}

/// `/`-separated path of `path` relative to `root`.
pub fn rel_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel.components().map(|c| c.as_os_str().to_string_lossy().to_string()).collect();
    Some(parts.join("/"))
}

/// Lossy file text; binary or unreadable files read as empty.
pub fn read_text(path: &Path) -> String {
    match std::fs::read(path) {
        Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
        Err(_) => String::new(),
    }
}
