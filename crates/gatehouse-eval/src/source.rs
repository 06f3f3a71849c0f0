//! Lexical source counters. These are cheap drift signals, not parsers: a decorator inside a string
//! literal counts the same as a real route.

use std::collections::BTreeMap;

use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::Deserialize;

use crate::error::EvalError;
use crate::walk::{read_text, TreeWalk, DEFAULT_SKIP_DIRS};

pub const DEFAULT_ENDPOINT_PATTERN: &str = r"@(?:app|router)\.(?:get|post|put|delete|patch)";

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct EndpointCountParams {
    pub roots: Vec<String>,
    pub extensions: Vec<String>,
    pub pattern: String,
}

impl Default for EndpointCountParams {
    fn default() -> Self {
        Self {
            roots: vec!["src".into()],
            extensions: vec!["py".into()],
            pattern: DEFAULT_ENDPOINT_PATTERN.into(),
        }
    }
}

pub fn endpoint_count(walk_root: &std::path::Path, p: &EndpointCountParams) -> Result<i64, EvalError> {
    let re = Regex::new(&p.pattern).map_err(|e| EvalError::pattern(&p.pattern, e))?;
    let mut total = 0i64;
    for root in &p.roots {
        for f in TreeWalk::new(walk_root.join(root)).files() {
            if !has_extension(&f.rel, &p.extensions) {
                continue;
            }
            total += re.find_iter(&read_text(&f.path)).count() as i64;
        }
    }
    Ok(total)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct TestsCountParams {
    pub globs: Vec<String>,
    /// When set, count occurrences of this regex inside matching files instead of the files themselves.
    pub pattern: Option<String>,
}

impl Default for TestsCountParams {
    fn default() -> Self {
        Self {
            globs: vec!["tests/**/test_*.py".into(), "tests/**/*_test.py".into()],
            pattern: None,
        }
    }
}

pub fn tests_count(walk_root: &std::path::Path, p: &TestsCountParams) -> Result<i64, EvalError> {
    let set = glob_set(&p.globs)?;
    let re = match &p.pattern {
        Some(pat) => Some(Regex::new(pat).map_err(|e| EvalError::pattern(pat, e))?),
        None => None,
    };
    let mut total = 0i64;
    for f in TreeWalk::new(walk_root).files() {
        if !set.is_match(&f.rel) {
            continue;
        }
        total += match &re {
            Some(re) => re.find_iter(&read_text(&f.path)).count() as i64,
            None => 1,
        };
    }
    Ok(total)
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LangsFilesParams {
    pub exclude_dirs: Vec<String>,
    /// file extension (no dot) -> language tag
    pub languages: BTreeMap<String, String>,
}

impl Default for LangsFilesParams {
    fn default() -> Self {
        let languages = [
            ("py", "py"),
            ("ts", "ts"),
            ("tsx", "ts"),
            ("js", "js"),
            ("jsx", "js"),
            ("dart", "dart"),
            ("rs", "rs"),
            ("go", "go"),
            ("java", "java"),
            ("kt", "kotlin"),
            ("rb", "rb"),
            ("php", "php"),
            ("cs", "cs"),
            ("swift", "swift"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            exclude_dirs: DEFAULT_SKIP_DIRS.iter().map(|s| s.to_string()).collect(),
            languages,
        }
    }
}

pub fn langs_files(walk_root: &std::path::Path, p: &LangsFilesParams) -> BTreeMap<String, i64> {
    let mut counts = BTreeMap::new();
    for f in TreeWalk::with_skip(walk_root, p.exclude_dirs.iter().cloned()).files() {
        let Some(ext) = extension(&f.rel) else { continue };
        if let Some(lang) = p.languages.get(&ext) {
            *counts.entry(lang.clone()).or_insert(0) += 1;
        }
    }
    counts
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct RepoSizeParams {
    pub exclude_dirs: Vec<String>,
}

impl Default for RepoSizeParams {
    fn default() -> Self {
        Self {
            exclude_dirs: vec![".git".into(), "node_modules".into(), "target".into()],
        }
    }
}

/// Total size in whole MiB, rounded down.
pub fn repo_size_megabytes(walk_root: &std::path::Path, p: &RepoSizeParams) -> i64 {
    let bytes: u64 = TreeWalk::with_skip(walk_root, p.exclude_dirs.iter().cloned())
        .files()
        .iter()
        .map(|f| f.size)
        .sum();
    (bytes / (1024 * 1024)) as i64
}

pub fn glob_set(patterns: &[String]) -> Result<GlobSet, EvalError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).map_err(|e| EvalError::pattern(pattern, e))?);
    }
    builder.build().map_err(|e| EvalError::pattern(&patterns.join(","), e))
}

fn extension(rel: &str) -> Option<String> {
    let name = rel.rsplit('/').next()?;
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn has_extension(rel: &str, exts: &[String]) -> bool {
    extension(rel).is_some_and(|e| exts.iter().any(|x| x.trim_start_matches('.').eq_ignore_ascii_case(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(root: &std::path::Path, rel: &str, body: &str) {
        let p = root.join(rel);
        std::fs::create_dir_all(p.parent().unwrap()).unwrap();
        std::fs::write(p, body).unwrap();
    }

    #[test]
    fn counts_route_decorators() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/backend/main.py", "@app.get('/')\ndef a(): ...\n@router.post('/x')\ndef b(): ...\n");
        write(dir.path(), "src/backend/notes.md", "@app.get('/ignored')");
        let n = endpoint_count(dir.path(), &EndpointCountParams::default()).unwrap();
        assert_eq!(n, 2);
    }

    #[test]
    fn missing_source_root_counts_zero() {
        let dir = tempdir().unwrap();
        assert_eq!(endpoint_count(dir.path(), &EndpointCountParams::default()).unwrap(), 0);
        assert_eq!(tests_count(dir.path(), &TestsCountParams::default()).unwrap(), 0);
    }

    #[test]
    fn counts_test_files_or_functions() {
        let dir = tempdir().unwrap();
        write(dir.path(), "tests/unit/test_a.py", "def test_one(): pass\ndef test_two(): pass\n");
        write(dir.path(), "tests/test_b.py", "def test_three(): pass\n");
        write(dir.path(), "tests/helpers.py", "def test_not_counted(): pass\n");
        assert_eq!(tests_count(dir.path(), &TestsCountParams::default()).unwrap(), 2);
        let p = TestsCountParams { pattern: Some(r"def test_".into()), ..Default::default() };
        assert_eq!(tests_count(dir.path(), &p).unwrap(), 3);
    }

    #[test]
    fn bad_pattern_is_config_error() {
        let dir = tempdir().unwrap();
        let p = EndpointCountParams { pattern: "(".into(), ..Default::default() };
        assert!(matches!(endpoint_count(dir.path(), &p), Err(EvalError::InvalidPattern { .. })));
    }

    #[test]
    fn language_map_and_dotfiles() {
        let dir = tempdir().unwrap();
        write(dir.path(), "src/a.py", "");
        write(dir.path(), "src/b.tsx", "");
        write(dir.path(), "src/c.ts", "");
        write(dir.path(), ".py", "");
        write(dir.path(), "node_modules/x.js", "");
        let m = langs_files(dir.path(), &LangsFilesParams::default());
        assert_eq!(m.get("py"), Some(&1));
        assert_eq!(m.get("ts"), Some(&2));
        assert_eq!(m.get("js"), None);
    }

    #[test]
    fn size_rounds_down_to_mib() {
        let dir = tempdir().unwrap();
        write(dir.path(), "small.bin", "abc");
        assert_eq!(repo_size_megabytes(dir.path(), &RepoSizeParams::default()), 0);
    }
}
