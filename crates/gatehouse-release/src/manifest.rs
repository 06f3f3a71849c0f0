use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::select::SelectedFile;

/// Streams the file through the hasher; contents are never held in memory whole.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut f = File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut f, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

/// Build coordinates recorded in MANIFEST.json and SBOM_LITE.json. Contains no wall-clock time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInfo {
    pub channel: String,
    pub version: String,
    pub builder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    pub source_date_epoch: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub bytes: u64,
    pub sha256: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseManifest {
    pub name: String,
    pub files: Vec<ManifestEntry>,
    pub total_bytes: u64,
    pub build: BuildInfo,
}

impl ReleaseManifest {
    pub fn build(name: &str, files: &[SelectedFile], build: BuildInfo) -> io::Result<Self> {
        let mut entries = Vec::with_capacity(files.len());
        for f in files {
            entries.push(ManifestEntry {
                path: f.rel.clone(),
                bytes: f.size,
                sha256: sha256_file(&f.path)?,
            });
        }
        Ok(Self {
            name: name.to_string(),
            total_bytes: entries.iter().map(|e| e.bytes).sum(),
            files: entries,
            build,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomComponent {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub language: String,
    pub hashes: BTreeMap<String, String>,
    pub size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomMetadata {
    pub build: BuildInfo,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SbomLite {
    pub bom_format: String,
    pub spec_version: String,
    pub metadata: SbomMetadata,
    pub components: Vec<SbomComponent>,
}

impl SbomLite {
    /// One component per manifest entry, same order.
    pub fn from_manifest(m: &ReleaseManifest) -> Self {
        let components = m
            .files
            .iter()
            .map(|e| SbomComponent {
                name: e.path.clone(),
                kind: "file".into(),
                language: guess_language(&e.path).into(),
                hashes: BTreeMap::from([("SHA-256".to_string(), e.sha256.clone())]),
                size: e.bytes,
            })
            .collect();
        Self {
            bom_format: "CycloneDX-lite".into(),
            spec_version: "1.0".into(),
            metadata: SbomMetadata { build: m.build.clone() },
            components,
        }
    }
}

pub fn guess_language(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase()).unwrap_or_default();
    match ext.as_str() {
        "py" => "Python",
        "ts" | "tsx" => "TypeScript",
        "js" | "jsx" | "mjs" => "JavaScript",
        "rs" => "Rust",
        "dart" => "Dart",
        "json" => "JSON",
        "yml" | "yaml" => "YAML",
        "md" => "Markdown",
        "tf" => "Terraform",
        "tpl" => "Helm",
        "sh" => "Shell",
        "toml" => "TOML",
        _ => "Other",
    }
}
