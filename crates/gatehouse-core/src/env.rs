use std::collections::BTreeMap;

/// Environment variables a run may consult, captured once so gates never read the process environment.
pub const OVERRIDE_VARS: &[&str] = &[
    "BUDGET_SNAPSHOT_JSON",
    "BUDGET_SNAPSHOT_FILE",
    "ERROR_RATE_PCT",
    "RUNTIME_PERF_JSON",
    "RUNTIME_PERF_FILE",
    "REL_CHANNEL",
    "REL_VERSION",
    "RELEASE_SIGNING_KEY",
    "RELEASE_SIGNING_KEY_FILE",
    "RELEASE_SIGNING_KEY_ID",
    "SOURCE_DATE_EPOCH",
    "GITHUB_REPOSITORY",
    "GITHUB_REF",
    "GITHUB_SHA",
    "GITHUB_RUN_ID",
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    vars: BTreeMap<String, String>,
}

impl EnvOverrides {
    pub fn capture() -> Self {
        Self::from_pairs(
            OVERRIDE_VARS
                .iter()
                .filter_map(|name| std::env::var(name).ok().map(|v| (name.to_string(), v))),
        )
    }

    /// Empty values count as unset.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .filter(|(_, v)| !v.trim().is_empty())
            .collect();
        Self { vars }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.vars.insert(name.into(), value.into());
    }

    pub fn source_date_epoch(&self) -> i64 {
        self.get("SOURCE_DATE_EPOCH")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_values_are_unset() {
        let env = EnvOverrides::from_pairs([("REL_CHANNEL", "rc"), ("REL_VERSION", "  ")]);
        assert_eq!(env.get("REL_CHANNEL"), Some("rc"));
        assert_eq!(env.get("REL_VERSION"), None);
    }

    #[test]
    fn source_date_epoch_defaults_to_zero() {
        assert_eq!(EnvOverrides::default().source_date_epoch(), 0);
        let env = EnvOverrides::from_pairs([("SOURCE_DATE_EPOCH", "1700000000")]);
        assert_eq!(env.source_date_epoch(), 1_700_000_000);
    }
}
