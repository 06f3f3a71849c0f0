use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use crate::walk::read_text;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct FrontendParams {
    pub manifest: String,
    pub package: String,
    pub marker_files: Vec<String>,
}

impl Default for FrontendParams {
    fn default() -> Self {
        Self {
            manifest: "src/frontend/package.json".into(),
            package: "next".into(),
            marker_files: vec!["src/frontend/next.config.js".into(), "src/frontend/next.config.mjs".into()],
        }
    }
}

/// Marker package in the dependency manifest, else any marker file on disk.
pub fn frontend_framework_present(root: &Path, p: &FrontendParams) -> bool {
    let manifest = root.join(&p.manifest);
    if let Ok(bytes) = std::fs::read(&manifest) {
        if let Ok(doc) = serde_json::from_slice::<Value>(&bytes) {
            let declared = ["dependencies", "devDependencies"]
                .iter()
                .any(|section| doc.get(section).and_then(|d| d.get(&p.package)).is_some());
            if declared {
                return true;
            }
        } else {
            tracing::debug!(manifest = %manifest.display(), "unparseable manifest; using marker files");
        }
    }
    p.marker_files.iter().any(|m| root.join(m).exists())
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct FileExistsParams {
    pub path: String,
}

pub fn file_exists(root: &Path, p: &FileExistsParams) -> bool {
    !p.path.is_empty() && root.join(&p.path).exists()
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct DbLayerParams {
    pub migration_dirs: Vec<String>,
    pub config_files: Vec<String>,
    pub marker: String,
}

impl Default for DbLayerParams {
    fn default() -> Self {
        Self {
            migration_dirs: vec!["migrations".into(), "alembic".into(), "src/backend/migrations".into()],
            config_files: vec!["pyproject.toml".into()],
            marker: "sqlalchemy".into(),
        }
    }
}

pub fn db_layer_present(root: &Path, p: &DbLayerParams) -> bool {
    if p.migration_dirs.iter().any(|d| root.join(d).is_dir()) {
        return true;
    }
    let marker = p.marker.to_lowercase();
    !marker.is_empty()
        && p
            .config_files
            .iter()
            .any(|f| read_text(&root.join(f)).to_lowercase().contains(&marker))
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CiGatesParams {
    pub workflows_dir: String,
    pub scanners: Vec<String>,
}

impl Default for CiGatesParams {
    fn default() -> Self {
        Self {
            workflows_dir: ".github/workflows".into(),
            scanners: vec!["bandit".into(), "safety".into()],
        }
    }
}

/// Scanner names referenced anywhere in the workflow definitions.
pub fn ci_gates_present(root: &Path, p: &CiGatesParams) -> BTreeSet<String> {
    let mut found = BTreeSet::new();
    let Ok(entries) = std::fs::read_dir(root.join(&p.workflows_dir)) else {
        return found;
    };
    let mut files: Vec<_> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|path| matches!(path.extension().and_then(|e| e.to_str()), Some("yml") | Some("yaml")))
        .collect();
    files.sort();

    for path in files {
        let text = read_text(&path);
        let haystack = match serde_yaml::from_str::<serde_yaml::Value>(&text) {
            Ok(doc) => {
                let mut strings = Vec::new();
                collect_strings(&doc, &mut strings);
                strings.join("\n").to_lowercase()
            }
            Err(err) => {
                tracing::debug!(workflow = %path.display(), error = %err, "workflow is not valid YAML; scanning raw text");
                text.to_lowercase()
            }
        };
        for scanner in &p.scanners {
            if haystack.contains(&scanner.to_lowercase()) {
                found.insert(scanner.clone());
            }
        }
    }
    found
}

fn collect_strings(v: &serde_yaml::Value, out: &mut Vec<String>) {
    match v {
        serde_yaml::Value::String(s) => out.push(s.clone()),
        serde_yaml::Value::Sequence(items) => items.iter().for_each(|i| collect_strings(i, out)),
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                collect_strings(k, out);
                collect_strings(v, out);
            }
        }
        serde_yaml::Value::Tagged(t) => collect_strings(&t.value, out),
        _ => {}
    }
}
