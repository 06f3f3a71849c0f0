use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::EvalError;
use crate::source::glob_set;
use crate::walk::TreeWalk;

/// Repository layout policy: root allow-lists plus whole-tree deny rules.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutPolicy {
    pub allowed_root_files: BTreeSet<String>,
    pub allowed_root_dirs: BTreeSet<String>,
    /// Dot-directories exempt from the root allow-list (`.git`, `.github`, ...).
    pub allowed_dot_dirs: BTreeSet<String>,
    pub forbidden_globs: Vec<String>,
    pub max_file_bytes: u64,
    pub dist_dirs: Vec<String>,
    pub archive_extensions: Vec<String>,
    pub scan_skip_dirs: Vec<String>,
}

impl Default for LayoutPolicy {
    fn default() -> Self {
        let set = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<BTreeSet<_>>();
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
        Self {
            allowed_root_files: set(&[
                "README.md",
                "LICENSE",
                "CHANGELOG.md",
                "CONTRIBUTING.md",
                "SECURITY.md",
                ".gitignore",
                ".gitattributes",
                ".editorconfig",
                ".dockerignore",
                "pyproject.toml",
                "package.json",
                "Makefile",
                "Dockerfile",
                "docker-compose.yml",
            ]),
            allowed_root_dirs: set(&["src", "tests", "docs", "tools", "scripts", "governance", "reports", "studies", "infra", "dist"]),
            allowed_dot_dirs: set(&[".git", ".github"]),
            forbidden_globs: list(&[
                "**/.DS_Store",
                "**/Thumbs.db",
                "**/*.swp",
                "**/*~",
                "**/__pycache__/**",
                "**/*.pyc",
                "**/.pytest_cache/**",
                "**/.mypy_cache/**",
                "**/*.log",
            ]),
            max_file_bytes: 5 * 1024 * 1024,
            dist_dirs: list(&["dist"]),
            archive_extensions: list(&[".zip", ".tar", ".gz", ".tgz", ".bz2", ".xz", ".7z", ".rar"]),
            scan_skip_dirs: list(&[".git", "node_modules", ".venv"]),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RootLayout {
    pub illegal_files: Vec<String>,
    pub illegal_dirs: Vec<String>,
    pub total_files: usize,
    pub total_dirs: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct OversizedFile {
    pub path: String,
    pub bytes: u64,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TreeFindings {
    pub forbidden: Vec<String>,
    pub oversized: Vec<OversizedFile>,
    pub archives: Vec<String>,
}

impl LayoutPolicy {
    fn in_dist(&self, rel: &str) -> bool {
        self.dist_dirs.iter().any(|d| {
            let d = d.trim_matches('/');
            rel == d || rel.starts_with(&format!("{}/", d))
        })
    }

    fn is_archive(&self, rel: &str) -> bool {
        let lower = rel.to_ascii_lowercase();
        self.archive_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
    }
}

/// Classifies the direct children of `root` against the allow-lists. Not recursive.
pub fn check_root(root: &Path, policy: &LayoutPolicy) -> Result<RootLayout, EvalError> {
    let mut layout = RootLayout::default();
    for entry in std::fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        let ft = entry.file_type()?;
        if ft.is_dir() {
            layout.total_dirs += 1;
            let exempt = name.starts_with('.') && policy.allowed_dot_dirs.contains(&name);
            if !exempt && !policy.allowed_root_dirs.contains(&name) {
                layout.illegal_dirs.push(name);
            }
        } else {
            layout.total_files += 1;
            if !policy.allowed_root_files.contains(&name) {
                layout.illegal_files.push(name);
            }
        }
    }
    layout.illegal_files.sort();
    layout.illegal_dirs.sort();
    Ok(layout)
}

/// Whole-tree deny rules: forbidden globs anywhere, oversized files and archives outside dist-like dirs.
pub fn scan_tree(root: &Path, policy: &LayoutPolicy) -> Result<TreeFindings, EvalError> {
    let forbidden = glob_set(&policy.forbidden_globs)?;
    let mut findings = TreeFindings::default();
    for f in TreeWalk::with_skip(root, policy.scan_skip_dirs.iter().cloned()).files() {
        if forbidden.is_match(&f.rel) {
            findings.forbidden.push(f.rel.clone());
        }
        if policy.in_dist(&f.rel) {
            continue;
        }
        if f.size > policy.max_file_bytes {
            findings.oversized.push(OversizedFile { path: f.rel.clone(), bytes: f.size });
        }
        if policy.is_archive(&f.rel) {
            findings.archives.push(f.rel);
        }
    }
    Ok(findings)
}

/// Root entries violating the allow-lists, directories suffixed with `/`.
pub fn root_layout_violations(root: &Path, policy: &LayoutPolicy) -> Result<BTreeSet<String>, EvalError> {
    let layout = check_root(root, policy)?;
    Ok(layout
        .illegal_files
        .into_iter()
        .chain(layout.illegal_dirs.into_iter().map(|d| format!("{}/", d)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn allowed_tree(root: &Path) {
        std::fs::create_dir_all(root.join("src")).unwrap();
        std::fs::create_dir_all(root.join(".github/workflows")).unwrap();
        std::fs::write(root.join("README.md"), "").unwrap();
        std::fs::write(root.join("src/main.py"), "").unwrap();
    }

    #[test]
    fn allow_listed_root_is_clean() {
        let dir = tempdir().unwrap();
        allowed_tree(dir.path());
        let layout = check_root(dir.path(), &LayoutPolicy::default()).unwrap();
        assert!(layout.illegal_files.is_empty());
        assert!(layout.illegal_dirs.is_empty());
    }

    #[test]
    fn one_extra_file_flips_only_files() {
        let dir = tempdir().unwrap();
        allowed_tree(dir.path());
        std::fs::write(dir.path().join("notes.txt"), "").unwrap();
        let layout = check_root(dir.path(), &LayoutPolicy::default()).unwrap();
        assert_eq!(layout.illegal_files, vec!["notes.txt".to_string()]);
        assert!(layout.illegal_dirs.is_empty());
    }

    #[test]
    fn unlisted_dot_dir_is_illegal() {
        let dir = tempdir().unwrap();
        allowed_tree(dir.path());
        std::fs::create_dir_all(dir.path().join(".idea")).unwrap();
        let v = root_layout_violations(dir.path(), &LayoutPolicy::default()).unwrap();
        assert_eq!(v.into_iter().collect::<Vec<_>>(), vec![".idea/".to_string()]);
    }

    #[test]
    fn tree_scan_respects_dist_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        allowed_tree(root);
        std::fs::create_dir_all(root.join("src/__pycache__")).unwrap();
        std::fs::create_dir_all(root.join("dist/rc/1.0")).unwrap();
        std::fs::write(root.join("src/__pycache__/m.cpython-311.pyc"), "").unwrap();
        std::fs::write(root.join("src/debug.log"), "").unwrap();
        std::fs::write(root.join("src/bundle.zip"), "").unwrap();
        std::fs::write(root.join("dist/rc/1.0/release.zip"), vec![0u8; 64]).unwrap();
        let policy = LayoutPolicy { max_file_bytes: 32, ..Default::default() };
        let f = scan_tree(root, &policy).unwrap();
        assert_eq!(f.forbidden, vec!["src/__pycache__/m.cpython-311.pyc".to_string(), "src/debug.log".to_string()]);
        assert_eq!(f.archives, vec!["src/bundle.zip".to_string()]);
        assert!(f.oversized.is_empty());
    }
}
