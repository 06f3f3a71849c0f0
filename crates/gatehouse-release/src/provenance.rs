use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{SecondsFormat, Utc};
use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use gatehouse_core::EnvOverrides;
use serde::{Deserialize, Serialize};

use crate::config::ReleaseTarget;
use crate::error::ReleaseError;
use crate::manifest::sha256_file;
use crate::pack::{read_checksums, CHECKSUMS_FILE, MANIFEST_FILE, SBOM_FILE};

pub const PROVENANCE_FILE: &str = "PROVENANCE.json";
pub const SIGNATURE_FILE: &str = "CHECKSUMS.sha256.sig";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    pub path: String,
    pub sha256: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCoordinates {
    pub repo: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub sha: String,
    pub run_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerIdentity {
    pub signer: String,
    pub algorithm: String,
    /// hex-encoded ed25519 verifying key
    pub public_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    pub provenance_version: String,
    pub build_type: String,
    pub build_time: String,
    pub target: ReleaseTarget,
    pub materials: BTreeMap<String, Material>,
    pub source: SourceCoordinates,
    pub identity: SignerIdentity,
    pub signature_file: String,
}

/// Accepts a PKCS#8 PEM document or a 64-character hex seed.
pub fn parse_signing_key(material: &str) -> Result<SigningKey, ReleaseError> {
    let trimmed = material.trim();
    if trimmed.starts_with("-----BEGIN") {
        return SigningKey::from_pkcs8_pem(trimmed).map_err(|e| ReleaseError::InvalidSigningKey(e.to_string()));
    }
    let bytes = hex::decode(trimmed).map_err(|e| ReleaseError::InvalidSigningKey(e.to_string()))?;
    let seed: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ReleaseError::InvalidSigningKey(format!("expected 32-byte seed, got {} bytes", bytes.len())))?;
    Ok(SigningKey::from_bytes(&seed))
}

/// `RELEASE_SIGNING_KEY` inline, else the file named by `RELEASE_SIGNING_KEY_FILE`. Never optional.
pub fn signing_key_from_env(env: &EnvOverrides) -> Result<SigningKey, ReleaseError> {
    if let Some(inline) = env.get("RELEASE_SIGNING_KEY") {
        return parse_signing_key(inline);
    }
    if let Some(file) = env.get("RELEASE_SIGNING_KEY_FILE") {
        let text = std::fs::read_to_string(file)
            .map_err(|e| ReleaseError::InvalidSigningKey(format!("read {}: {}", file, e)))?;
        return parse_signing_key(&text);
    }
    Err(ReleaseError::MissingSigningKey)
}

fn material(out_dir: &Path, name: &str) -> Result<Material> {
    let path = out_dir.join(name);
    if !path.is_file() {
        return Err(ReleaseError::MissingMaterial(name.to_string()).into());
    }
    Ok(Material {
        path: name.to_string(),
        sha256: sha256_file(&path).with_context(|| format!("hash {}", path.display()))?,
    })
}

/// Signs CHECKSUMS.sha256 in `out_dir` and writes the raw signature plus PROVENANCE.json.
///
/// The key is resolved before anything is read or written, so a missing key fails the step outright.
pub fn sign_release(out_dir: &Path, target: &ReleaseTarget, env: &EnvOverrides) -> Result<Provenance> {
    let key = signing_key_from_env(env)?;

    let mut materials = BTreeMap::new();
    materials.insert("manifest".to_string(), material(out_dir, MANIFEST_FILE)?);
    materials.insert("sbom".to_string(), material(out_dir, SBOM_FILE)?);
    materials.insert("checksums".to_string(), material(out_dir, CHECKSUMS_FILE)?);
    for (i, line) in read_checksums(&out_dir.join(CHECKSUMS_FILE))?.iter().enumerate().take(2) {
        let role = if i == 0 { "zip" } else { "tar_gz" };
        materials.insert(role.to_string(), material(out_dir, &line.name)?);
    }

    let checksums = std::fs::read(out_dir.join(CHECKSUMS_FILE)).context("read checksums")?;
    let signature = key.sign(&checksums);
    let sig_path = out_dir.join(SIGNATURE_FILE);
    std::fs::write(&sig_path, signature.to_bytes()).with_context(|| format!("write {}", sig_path.display()))?;

    let var = |name: &str| env.get(name).unwrap_or_default().to_string();
    let provenance = Provenance {
        provenance_version: "1.0".into(),
        build_type: "release-pack".into(),
        build_time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        target: target.clone(),
        materials,
        source: SourceCoordinates {
            repo: var("GITHUB_REPOSITORY"),
            git_ref: var("GITHUB_REF"),
            sha: var("GITHUB_SHA"),
            run_id: var("GITHUB_RUN_ID"),
        },
        identity: SignerIdentity {
            signer: env.get("RELEASE_SIGNING_KEY_ID").unwrap_or("unknown").to_string(),
            algorithm: "ed25519".into(),
            public_key: hex::encode(key.verifying_key().as_bytes()),
        },
        signature_file: SIGNATURE_FILE.into(),
    };
    let path = out_dir.join(PROVENANCE_FILE);
    let mut bytes = serde_json::to_vec_pretty(&provenance)?;
    bytes.push(b'\n');
    std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    tracing::info!(signer = %provenance.identity.signer, path = %path.display(), "release signed");
    Ok(provenance)
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyOutcome {
    pub verified: Vec<String>,
    pub mismatched: Vec<String>,
    pub missing: Vec<String>,
    pub signature_valid: bool,
}

impl VerifyOutcome {
    pub fn ok(&self) -> bool {
        self.signature_valid && self.mismatched.is_empty() && self.missing.is_empty()
    }
}

/// Re-hashes every CHECKSUMS entry and checks the signature against the key recorded in PROVENANCE.json.
pub fn verify_release(out_dir: &Path) -> Result<VerifyOutcome> {
    let sums_path = out_dir.join(CHECKSUMS_FILE);
    if !sums_path.is_file() {
        return Err(ReleaseError::MissingMaterial(CHECKSUMS_FILE.into()).into());
    }
    let mut outcome = VerifyOutcome::default();
    for line in read_checksums(&sums_path)? {
        let path = out_dir.join(&line.name);
        if !path.is_file() {
            outcome.missing.push(line.name);
            continue;
        }
        if sha256_file(&path)? == line.sha256 {
            outcome.verified.push(line.name);
        } else {
            outcome.mismatched.push(line.name);
        }
    }

    let prov_path = out_dir.join(PROVENANCE_FILE);
    if !prov_path.is_file() {
        return Err(ReleaseError::MissingMaterial(PROVENANCE_FILE.into()).into());
    }
    let provenance: Provenance = serde_json::from_slice(&std::fs::read(&prov_path)?)
        .with_context(|| format!("parse {}", prov_path.display()))?;
    let sig_bytes = std::fs::read(out_dir.join(&provenance.signature_file)).unwrap_or_default();
    let checksums = std::fs::read(&sums_path)?;
    outcome.signature_valid = check_signature(&provenance.identity.public_key, &sig_bytes, &checksums);
    Ok(outcome)
}

fn check_signature(public_key_hex: &str, sig_bytes: &[u8], message: &[u8]) -> bool {
    let Ok(pk) = hex::decode(public_key_hex) else {
        return false;
    };
    let Ok(pk): Result<[u8; 32], _> = pk.as_slice().try_into() else {
        return false;
    };
    let Ok(sig): Result<[u8; 64], _> = sig_bytes.try_into() else {
        return false;
    };
    let Ok(key) = VerifyingKey::from_bytes(&pk) else {
        return false;
    };
    key.verify(message, &Signature::from_bytes(&sig)).is_ok()
}
