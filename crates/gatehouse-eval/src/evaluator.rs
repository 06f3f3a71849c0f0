use std::path::{Path, PathBuf};

use gatehouse_core::Fact;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::docs::{doc_link_sync, DocLinkParams, DocSide};
use crate::error::EvalError;
use crate::kind::EvaluatorKind;
use crate::layout::{root_layout_violations, LayoutPolicy};
use crate::presence::{
    ci_gates_present, db_layer_present, file_exists, frontend_framework_present, CiGatesParams, DbLayerParams,
    FileExistsParams, FrontendParams,
};
use crate::source::{
    endpoint_count, langs_files, repo_size_megabytes, tests_count, EndpointCountParams, LangsFilesParams,
    RepoSizeParams, TestsCountParams,
};

/// Runs catalog evaluators against one repository root. Holds no state between calls and never reads
/// reports, so the same tree always yields the same facts.
#[derive(Clone, Debug)]
pub struct Evaluator {
    root: PathBuf,
}

impl Evaluator {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn evaluate_named(&self, name: &str, params: &Value) -> Result<Fact, EvalError> {
        self.evaluate(name.parse()?, params)
    }

    pub fn evaluate(&self, kind: EvaluatorKind, params: &Value) -> Result<Fact, EvalError> {
        let root = self.root.as_path();
        let fact = match kind {
            EvaluatorKind::FrontendFrameworkPresent => {
                Fact::Bool(frontend_framework_present(root, &parse::<FrontendParams>(kind, params)?))
            }
            EvaluatorKind::BackendEndpointCount => {
                Fact::Int(endpoint_count(root, &parse::<EndpointCountParams>(kind, params)?)?)
            }
            EvaluatorKind::FileExists => Fact::Bool(file_exists(root, &parse::<FileExistsParams>(kind, params)?)),
            EvaluatorKind::DbLayerPresent => Fact::Bool(db_layer_present(root, &parse::<DbLayerParams>(kind, params)?)),
            EvaluatorKind::TestsCount => Fact::Int(tests_count(root, &parse::<TestsCountParams>(kind, params)?)?),
            EvaluatorKind::CiGatesPresent => Fact::Set(ci_gates_present(root, &parse::<CiGatesParams>(kind, params)?)),
            EvaluatorKind::DocLinkSync => {
                let p = parse::<DocLinkParams>(kind, params)?;
                let sync = doc_link_sync(root, &p)?;
                Fact::Set(match p.side {
                    DocSide::Missing => sync.missing,
                    DocSide::Orphan => sync.orphan,
                })
            }
            EvaluatorKind::RepoSizeMegabytes => {
                Fact::Int(repo_size_megabytes(root, &parse::<RepoSizeParams>(kind, params)?))
            }
            EvaluatorKind::RootLayoutViolations => {
                Fact::Set(root_layout_violations(root, &parse::<LayoutPolicy>(kind, params)?)?)
            }
            EvaluatorKind::LangsFiles => Fact::Map(langs_files(root, &parse::<LangsFilesParams>(kind, params)?)),
        };
        tracing::debug!(evaluator = %kind, fact = %fact, "evaluated");
        Ok(fact)
    }
}

/// `null` means "all defaults"; any other value must deserialize into the evaluator's params.
fn parse<T: DeserializeOwned + Default>(kind: EvaluatorKind, params: &Value) -> Result<T, EvalError> {
    if params.is_null() {
        return Ok(T::default());
    }
    serde_json::from_value(params.clone()).map_err(|source| EvalError::InvalidParams {
        evaluator: kind.name(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn every_kind_matches_declared_fact_kind_on_empty_tree() {
        let dir = tempdir().unwrap();
        let ev = Evaluator::new(dir.path());
        for (_, kind) in crate::kind::CATALOG {
            let fact = ev.evaluate(*kind, &Value::Null).unwrap();
            assert_eq!(fact.kind(), kind.fact_kind(), "{kind}");
        }
    }

    #[test]
    fn absence_is_false_or_zero() {
        let dir = tempdir().unwrap();
        let ev = Evaluator::new(dir.path());
        assert_eq!(ev.evaluate_named("frontend-framework-present", &Value::Null).unwrap(), Fact::Bool(false));
        assert_eq!(ev.evaluate_named("tests-count", &Value::Null).unwrap(), Fact::Int(0));
        assert_eq!(ev.evaluate_named("ci-gates-present", &Value::Null).unwrap(), Fact::set(Vec::<String>::new()));
    }

    #[test]
    fn params_are_typed() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("marker.txt"), "").unwrap();
        let ev = Evaluator::new(dir.path());
        let f = ev.evaluate_named("file-exists", &json!({"path": "marker.txt"})).unwrap();
        assert_eq!(f, Fact::Bool(true));
        let err = ev.evaluate_named("file-exists", &json!({"path": 5})).unwrap_err();
        assert!(matches!(err, EvalError::InvalidParams { evaluator: "file-exists", .. }));
        assert!(matches!(ev.evaluate_named("nope", &Value::Null), Err(EvalError::UnknownEvaluator(_))));
    }

    #[test]
    fn doc_sides() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("studies")).unwrap();
        std::fs::write(dir.path().join("studies/MASTER_STUDIES_INDEX.md"), "[x](x.md)").unwrap();
        std::fs::write(dir.path().join("studies/y.md"), "").unwrap();
        let ev = Evaluator::new(dir.path());
        let missing = ev.evaluate_named("doc-link-sync", &json!({"side": "missing"})).unwrap();
        let orphan = ev.evaluate_named("doc-link-sync", &json!({"side": "orphan"})).unwrap();
        assert_eq!(missing, Fact::set(["studies/x.md"]));
        assert_eq!(orphan, Fact::set(["studies/y.md"]));
    }
}
