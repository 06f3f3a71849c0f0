use gatehouse_core::Report;
use gatehouse_store::ReportStore;
use serde::de::DeserializeOwned;

/// Issue key `error_report` writes for an aborted gate.
pub const GATE_ERROR_KEY: &str = "gate_error";

/// Another gate's report as seen by a downstream gate.
#[derive(Clone, Debug, PartialEq)]
pub enum Upstream<T> {
    Absent,
    /// Aborted upstream gate, corrupt JSON, or a payload of the wrong shape. Carries the reason.
    Unreadable(String),
    Ready(T),
}

impl<T> Upstream<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Upstream::Ready(v) => Some(v),
            Upstream::Absent | Upstream::Unreadable(_) => None,
        }
    }
}

/// Loads report `id` and decodes its payload. Never fails: a broken upstream report is reported as
/// `Unreadable` so the reading gate can degrade instead of aborting.
pub fn read_upstream<T: DeserializeOwned>(store: &dyn ReportStore, id: &str) -> Upstream<T> {
    let report = match store.load(id) {
        Ok(Some(report)) => report,
        Ok(None) => return Upstream::Absent,
        Err(err) => return unreadable(id, format!("{:#}", err)),
    };
    if let Some(reason) = aborted(&report) {
        return unreadable(id, reason);
    }
    match report.payload_as::<T>() {
        Ok(payload) => Upstream::Ready(payload),
        Err(err) => unreadable(id, format!("payload: {}", err)),
    }
}

fn aborted(report: &Report) -> Option<String> {
    report
        .issues_hard
        .iter()
        .find(|i| i.key == GATE_ERROR_KEY)
        .map(|i| i.actual.as_str().map(str::to_string).unwrap_or_else(|| i.actual.to_string()))
}

fn unreadable<T>(id: &str, reason: String) -> Upstream<T> {
    tracing::warn!(report = %id, %reason, "upstream report unreadable");
    Upstream::Unreadable(reason)
}
