use std::fmt;
use std::str::FromStr;

use gatehouse_core::FactKind;

use crate::error::EvalError;

/// The closed catalog of repository evaluators. Config refers to them by the names in [`CATALOG`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EvaluatorKind {
    FrontendFrameworkPresent,
    BackendEndpointCount,
    FileExists,
    DbLayerPresent,
    TestsCount,
    CiGatesPresent,
    DocLinkSync,
    RepoSizeMegabytes,
    RootLayoutViolations,
    LangsFiles,
}

pub const CATALOG: &[(&str, EvaluatorKind)] = &[
    ("frontend-framework-present", EvaluatorKind::FrontendFrameworkPresent),
    ("backend-endpoint-count", EvaluatorKind::BackendEndpointCount),
    ("file-exists", EvaluatorKind::FileExists),
    ("db-layer-present", EvaluatorKind::DbLayerPresent),
    ("tests-count", EvaluatorKind::TestsCount),
    ("ci-gates-present", EvaluatorKind::CiGatesPresent),
    ("doc-link-sync", EvaluatorKind::DocLinkSync),
    ("repo-size-megabytes", EvaluatorKind::RepoSizeMegabytes),
    ("root-layout-violations", EvaluatorKind::RootLayoutViolations),
    ("langs-files", EvaluatorKind::LangsFiles),
];

impl EvaluatorKind {
    pub fn name(self) -> &'static str {
        CATALOG
            .iter()
            .find(|(_, k)| *k == self)
            .map(|(n, _)| *n)
            .unwrap_or("unknown")
    }

    pub fn parse(name: &str) -> Option<Self> {
        CATALOG.iter().find(|(n, _)| *n == name).map(|(_, k)| *k)
    }

    pub fn fact_kind(self) -> FactKind {
        match self {
            EvaluatorKind::FrontendFrameworkPresent | EvaluatorKind::FileExists | EvaluatorKind::DbLayerPresent => {
                FactKind::Bool
            }
            EvaluatorKind::BackendEndpointCount | EvaluatorKind::TestsCount | EvaluatorKind::RepoSizeMegabytes => {
                FactKind::Int
            }
            EvaluatorKind::CiGatesPresent | EvaluatorKind::DocLinkSync | EvaluatorKind::RootLayoutViolations => {
                FactKind::Set
            }
            EvaluatorKind::LangsFiles => FactKind::Map,
        }
    }
}

impl FromStr for EvaluatorKind {
    type Err = EvalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| EvalError::UnknownEvaluator(s.to_string()))
    }
}

impl fmt::Display for EvaluatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_names_round_trip() {
        for (name, kind) in CATALOG {
            assert_eq!(kind.name(), *name);
            assert_eq!(name.parse::<EvaluatorKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn unknown_name_is_error() {
        let err = "frontend-present".parse::<EvaluatorKind>().unwrap_err();
        assert!(matches!(err, EvalError::UnknownEvaluator(_)));
    }
}
