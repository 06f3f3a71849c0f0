use gatehouse_core::{Issue, Report};
use serde_json::Value;

/// Standard Markdown rendering of a report: header, gate-specific body, then both issue tables.
pub fn render_report(title: &str, report: &Report, body: &str) -> String {
    let mut s = String::new();
    s.push_str(&format!("# {}\n\n", title));
    s.push_str(&format!("- Report: `{}`\n", report.id));
    s.push_str(&format!("- Generated: {}\n", report.generated_at.to_rfc3339()));
    s.push_str(&format!("- Verdict: **{}**\n\n", report.verdict()));
    if !body.trim().is_empty() {
        s.push_str(body.trim_end());
        s.push_str("\n\n");
    }
    s.push_str("## Hard Issues\n\n");
    s.push_str(&issue_table(&report.issues_hard));
    s.push_str("\n## Soft Issues\n\n");
    s.push_str(&issue_table(&report.issues_soft));
    s
}

fn issue_table(issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "_none_\n".to_string();
    }
    let rows: Vec<Vec<String>> = issues
        .iter()
        .map(|i| vec![format!("`{}`", i.key), cell(&i.actual), cell(&i.limit)])
        .collect();
    table(&["key", "actual", "limit"], &rows)
}

pub fn table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut s = String::new();
    s.push_str(&format!("| {} |\n", headers.join(" | ")));
    s.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
    for row in rows {
        s.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    s
}

/// Compact single-line rendering of a JSON value that is safe inside a table cell.
pub fn cell(value: &Value) -> String {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    };
    raw.replace('|', "\\|").replace('\n', " ")
}

pub fn bullet_list<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let lines: Vec<String> = items.into_iter().map(|i| format!("- {}", i.as_ref())).collect();
    if lines.is_empty() {
        "_none_\n".to_string()
    } else {
        format!("{}\n", lines.join("\n"))
    }
}
