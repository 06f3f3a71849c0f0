use std::path::Path;

use gatehouse_core::GateError;
use serde::de::DeserializeOwned;

/// Loads a per-gate config. Absent → `T::default()`; unreadable or malformed → `InvalidConfig`.
/// `.yaml`/`.yml` files are parsed as YAML, everything else as JSON.
pub fn load_config<T: DeserializeOwned + Default>(path: &Path) -> Result<T, GateError> {
    if !path.is_file() {
        tracing::debug!(config = %path.display(), "config absent; using defaults");
        return Ok(T::default());
    }
    let invalid = |message: String| GateError::InvalidConfig {
        path: path.to_path_buf(),
        message,
    };
    let text = std::fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
    let is_yaml = matches!(path.extension().and_then(|e| e.to_str()), Some("yaml") | Some("yml"));
    if is_yaml {
        serde_yaml::from_str(&text).map_err(|e| invalid(e.to_string()))
    } else {
        serde_json::from_str(&text).map_err(|e| invalid(e.to_string()))
    }
}

/// First candidate that exists, or defaults when none do.
pub fn load_first_config<T: DeserializeOwned + Default>(candidates: &[&Path]) -> Result<T, GateError> {
    match candidates.iter().find(|p| p.is_file()) {
        Some(path) => load_config(path),
        None => Ok(T::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::tempdir;

    #[derive(Debug, Default, Deserialize, PartialEq)]
    #[serde(default)]
    struct Sample {
        limit: u32,
        name: String,
    }

    #[test]
    fn absent_is_default_malformed_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("x.config.json");
        assert_eq!(load_config::<Sample>(&path).unwrap(), Sample::default());

        std::fs::write(&path, "{ not json").unwrap();
        let err = load_config::<Sample>(&path).unwrap_err();
        assert!(matches!(err, GateError::InvalidConfig { .. }));

        std::fs::write(&path, r#"{"limit": 3}"#).unwrap();
        assert_eq!(load_config::<Sample>(&path).unwrap().limit, 3);
    }

    #[test]
    fn yaml_by_extension_and_json_wins() {
        let dir = tempdir().unwrap();
        let json = dir.path().join("c.config.json");
        let yaml = dir.path().join("c.config.yaml");
        std::fs::write(&yaml, "limit: 7\nname: y\n").unwrap();
        let s: Sample = load_first_config(&[&json, &yaml]).unwrap();
        assert_eq!(s, Sample { limit: 7, name: "y".into() });

        std::fs::write(&json, r#"{"limit": 1}"#).unwrap();
        let s: Sample = load_first_config(&[&json, &yaml]).unwrap();
        assert_eq!(s.limit, 1);
    }
}
