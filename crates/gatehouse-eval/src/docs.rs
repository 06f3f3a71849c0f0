use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;

use gatehouse_core::DocSync;
use regex::Regex;
use serde::Deserialize;

use crate::error::EvalError;
use crate::walk::TreeWalk;

const LINK_PATTERN: &str = r"\[[^\]]*\]\(([^)\s]+)(?:\s+[^)]*)?\)";

static LINK_RE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(LINK_PATTERN).ok());

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DocSide {
    #[default]
    Missing,
    Orphan,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DocLinkParams {
    pub index: String,
    pub tree: String,
    pub side: DocSide,
}

impl Default for DocLinkParams {
    fn default() -> Self {
        Self {
            index: "studies/MASTER_STUDIES_INDEX.md".into(),
            tree: "studies".into(),
            side: DocSide::Missing,
        }
    }
}

/// Diffs the paths referenced by the index document against the files under the documented tree.
///
/// Missing index means nothing is referenced and nothing is compared: both sets are empty. The index
/// file itself is never an orphan.
pub fn doc_link_sync(root: &Path, p: &DocLinkParams) -> Result<DocSync, EvalError> {
    let index = normalize(&p.index).unwrap_or_else(|| p.index.clone());
    let tree = p.tree.trim_matches('/').to_string();
    let mut sync = DocSync { index: index.clone(), ..Default::default() };

    let Ok(bytes) = std::fs::read(root.join(&index)) else {
        return Ok(sync);
    };
    let md = String::from_utf8_lossy(&bytes);
    sync.referenced = extract_references(&md, &index, &tree)?;
    sync.actual = TreeWalk::with_skip(root.join(&tree), Vec::<String>::new())
        .files()
        .into_iter()
        .map(|f| format!("{}/{}", tree, f.rel))
        .collect();
    sync.missing = sync.referenced.difference(&sync.actual).cloned().collect();
    sync.orphan = sync
        .actual
        .difference(&sync.referenced)
        .filter(|p| **p != index)
        .cloned()
        .collect();
    Ok(sync)
}

/// Markdown link targets plus bare `<tree>/...` mentions, resolved against the index directory and
/// restricted to the documented tree. Wildcard references are ignored.
pub fn extract_references(md: &str, index: &str, tree: &str) -> Result<BTreeSet<String>, EvalError> {
    let link_re = LINK_RE
        .as_ref()
        .ok_or_else(|| EvalError::pattern(LINK_PATTERN, "does not compile"))?;
    let bare_pattern = format!(r"({}/[^\s)\]`'<>]+)", regex::escape(tree));
    let bare_re = Regex::new(&bare_pattern).map_err(|e| EvalError::pattern(&bare_pattern, e))?;
    let index_dir = index.rsplit_once('/').map(|(d, _)| d).unwrap_or("");
    let prefix = format!("{}/", tree);

    let mut out = BTreeSet::new();
    for cap in link_re.captures_iter(md) {
        let target = cap[1].trim_matches(|c| c == '<' || c == '>');
        if is_external(target) {
            continue;
        }
        let target = target.split('#').next().unwrap_or("");
        let resolved = if target.starts_with(&prefix) {
            normalize(target)
        } else if index_dir.is_empty() {
            normalize(target)
        } else {
            normalize(&format!("{}/{}", index_dir, target))
        };
        if let Some(r) = resolved {
            out.insert(r);
        }
    }
    for cap in bare_re.captures_iter(md) {
        let raw = cap[1].trim_end_matches(|c: char| matches!(c, '.' | ',' | ';' | ':'));
        if let Some(r) = normalize(raw.split('#').next().unwrap_or("")) {
            out.insert(r);
        }
    }
    Ok(out
        .into_iter()
        .filter(|r| r.starts_with(&prefix) && !r.contains('*') && !r.ends_with('/'))
        .collect())
}

fn is_external(target: &str) -> bool {
    target.contains("://") || target.starts_with("mailto:") || target.starts_with('#')
}

/// Collapses `.` and `..` segments. Paths escaping the root are dropped.
fn normalize(path: &str) -> Option<String> {
    let mut parts: Vec<&str> = Vec::new();
    for seg in path.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                parts.pop()?;
            }
            s => parts.push(s),
        }
    }
    if parts.is_empty() {
        return None;
    }
    let mut s = parts.join("/");
    if path.ends_with('/') {
        s.push('/');
    }
    Some(s)
}
