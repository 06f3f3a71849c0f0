use anyhow::Result;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use gatehouse_core::{GateError, GateId, Issue, Report, Verdict};
use gatehouse_gates::{error_report, gate_for, run_gate, write_error_report, GateContext};
use gatehouse_store::{render_report, table};

/// Stages run in order; gates inside a stage only read reports written by earlier stages, so they run
/// in parallel.
pub const STAGES: [&[GateId]; 2] = [
    &[GateId::Snapshot, GateId::DocMap, GateId::Preflight, GateId::Runtime],
    &[GateId::Claims, GateId::Drift, GateId::Budget],
];

#[derive(Clone, Debug)]
pub struct GateRun {
    pub gate: GateId,
    pub report: Report,
    /// The gate returned an error and `report` is the stand-in error report.
    pub errored: bool,
}

impl GateRun {
    pub fn verdict(&self) -> Verdict {
        self.report.verdict()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GateSummary {
    pub gate: String,
    pub verdict: Verdict,
    pub hard: usize,
    pub soft: usize,
    pub errored: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SummaryPayload {
    pub run_id: String,
    pub gates: Vec<GateSummary>,
}

#[derive(Clone, Debug)]
pub struct PipelineOutcome {
    pub runs: Vec<GateRun>,
    pub summary: Report,
}

impl PipelineOutcome {
    pub fn verdict(&self) -> Verdict {
        self.summary.verdict()
    }
}

/// Runs one gate and always leaves a report behind: a gate error becomes a persisted error report.
pub fn run_one(ctx: &GateContext, id: GateId) -> Result<GateRun> {
    let gate = gate_for(id).ok_or_else(|| GateError::UnknownGate(id.to_string()))?;
    let run = match run_gate(gate.as_ref(), ctx) {
        Ok(report) => GateRun { gate: id, report, errored: false },
        Err(err) => {
            let report = match write_error_report(ctx, id, &err) {
                Ok(report) => report,
                Err(write_err) => {
                    tracing::error!(gate = %id, error = %format!("{:#}", write_err), "could not persist error report");
                    error_report(id, &err)
                }
            };
            GateRun { gate: id, report, errored: true }
        }
    };
    Ok(run)
}

pub fn run_pipeline(ctx: &GateContext) -> Result<PipelineOutcome> {
    let mut runs = Vec::new();
    for (i, stage) in STAGES.iter().enumerate() {
        tracing::info!(run = %ctx.run_id, stage = i + 1, gates = stage.len(), "stage start");
        let done = stage
            .par_iter()
            .map(|id| run_one(ctx, *id))
            .collect::<Result<Vec<_>>>()?;
        runs.extend(done);
    }

    let summary = summarize(&ctx.run_id.to_string(), &runs)?;
    let md = render_report(GateId::Summary.title(), &summary, &summary_body(&runs));
    ctx.store.write(&summary, &md)?;
    tracing::info!(run = %ctx.run_id, verdict = %summary.verdict(), "pipeline done");
    Ok(PipelineOutcome { runs, summary })
}

/// One hard issue per failed or errored gate, one soft issue per warned gate.
pub fn summarize(run_id: &str, runs: &[GateRun]) -> serde_json::Result<Report> {
    let gates = runs
        .iter()
        .map(|r| GateSummary {
            gate: r.gate.report_id().to_string(),
            verdict: r.verdict(),
            hard: r.report.issues_hard.len(),
            soft: r.report.issues_soft.len(),
            errored: r.errored,
        })
        .collect::<Vec<_>>();

    let mut issues = Vec::new();
    for g in &gates {
        match g.verdict {
            Verdict::Fail if g.errored => issues.push(Issue::hard(g.gate.clone(), "gate_error", "gate completes")),
            Verdict::Fail => issues.push(Issue::hard(g.gate.clone(), g.hard, 0)),
            Verdict::Warn => issues.push(Issue::soft(g.gate.clone(), g.soft, 0)),
            Verdict::Pass => {}
        }
    }

    let payload = SummaryPayload { run_id: run_id.to_string(), gates };
    let mut report = Report::with_payload(GateId::Summary.report_id(), &payload)?;
    report.extend(issues);
    Ok(report)
}

fn summary_body(runs: &[GateRun]) -> String {
    let rows = runs
        .iter()
        .map(|r| {
            vec![
                r.gate.title().to_string(),
                if r.errored { "ERROR".to_string() } else { r.verdict().to_string() },
                r.report.issues_hard.len().to_string(),
                r.report.issues_soft.len().to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table(&["Gate", "Verdict", "Hard", "Soft"], &rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(gate: GateId, hard: usize, soft: usize, errored: bool) -> GateRun {
        let mut report = Report::new(gate.report_id(), json!({}));
        for i in 0..hard {
            report.push(Issue::hard(format!("h{}", i), 1, 0));
        }
        for i in 0..soft {
            report.push(Issue::soft(format!("s{}", i), 1, 0));
        }
        GateRun { gate, report, errored }
    }

    #[test]
    fn summary_rolls_up_verdicts() {
        let runs = vec![
            run(GateId::Snapshot, 0, 0, false),
            run(GateId::DocMap, 0, 2, false),
            run(GateId::Drift, 1, 1, false),
            run(GateId::Runtime, 1, 0, true),
        ];
        let summary = summarize("r1", &runs).unwrap();
        assert_eq!(summary.id, "GOVERNANCE_SUMMARY");
        assert_eq!(summary.verdict(), Verdict::Fail);
        let hard: Vec<_> = summary.issues_hard.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(hard, vec!["DRIFT_GUARD", "RUNTIME_GUARD"]);
        assert_eq!(summary.issues_hard[1].actual, json!("gate_error"));
        assert_eq!(summary.issues_soft.len(), 1);
        assert_eq!(summary.issues_soft[0].key, "DOCMAP_SYNC");

        let payload: SummaryPayload = summary.payload_as().unwrap();
        assert_eq!(payload.gates.len(), 4);
        assert!(payload.gates[3].errored);
    }

    #[test]
    fn all_passing_summary_passes() {
        let runs = vec![run(GateId::Snapshot, 0, 0, false), run(GateId::Claims, 0, 0, false)];
        let summary = summarize("r2", &runs).unwrap();
        assert_eq!(summary.verdict(), Verdict::Pass);
    }

    #[test]
    fn stages_cover_every_pipeline_gate_once() {
        let mut all: Vec<GateId> = STAGES.iter().flat_map(|s| s.iter().copied()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 7);
        assert!(!all.contains(&GateId::Release));
        assert!(!all.contains(&GateId::Summary));
    }
}
