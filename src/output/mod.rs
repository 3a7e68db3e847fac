//! Output formatting for kubefix

use crate::execute::{ActionStatus, ExecutionReport};
use crate::plan::{Plan, RemediationAction};
use crate::rules::{Finding, FindingSummary, Severity};
use owo_colors::OwoColorize;

/// Render findings grouped by severity, most severe first
pub fn format_findings(findings: &[Finding]) -> String {
    let summary = FindingSummary::from_findings(findings);
    let mut output = String::new();

    let mut counts = Vec::new();
    if summary.blocking > 0 {
        counts.push(format!("{} blocking", summary.blocking).red().bold().to_string());
    }
    if summary.warning > 0 {
        counts.push(format!("{} warnings", summary.warning).yellow().to_string());
    }
    if summary.info > 0 {
        counts.push(format!("{} info", summary.info).blue().to_string());
    }
    if counts.is_empty() {
        counts.push("No issues found".green().to_string());
    }
    output.push_str(&format!("Summary: {}\n\n", counts.join(" ")));

    for (severity, heading) in [
        (Severity::Blocking, "BLOCKING".red().bold().to_string()),
        (Severity::Warning, "WARNINGS".yellow().bold().to_string()),
        (Severity::Info, "INFO".blue().bold().to_string()),
    ] {
        let group: Vec<&Finding> = findings.iter().filter(|f| f.severity == severity).collect();
        if group.is_empty() {
            continue;
        }

        output.push_str(&heading);
        output.push('\n');
        output.push_str(&"-".repeat(40));
        output.push('\n');
        for finding in group {
            output.push_str(&format_finding(finding));
            output.push('\n');
        }
    }

    output.trim_end().to_string()
}

fn format_finding(finding: &Finding) -> String {
    let marker = match finding.severity {
        Severity::Blocking => "✗".red().to_string(),
        Severity::Warning => "!".yellow().to_string(),
        Severity::Info => "i".blue().to_string(),
    };

    let affected: Vec<String> = finding.affected.iter().map(|o| o.to_string()).collect();
    let mut output = format!(
        "{} {} {}\n  {}\n",
        marker,
        finding.rule.bold(),
        affected.join(", ").dimmed(),
        finding.message
    );

    if let Some(remediation) = &finding.remediation {
        output.push_str(&format!("  {} {}\n", "Fix:".cyan(), remediation));
    }

    output
}

/// Render a plan as a numbered table followed by any planning errors
pub fn format_plan(plan: &Plan) -> String {
    let mut output = String::new();

    if plan.actions.is_empty() {
        output.push_str("No remediation actions planned");
    } else {
        let rows: Vec<Vec<String>> = plan
            .actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                vec![
                    (i + 1).to_string(),
                    action.verb().to_uppercase(),
                    action_target(action),
                    wait_label(action),
                ]
            })
            .collect();
        output.push_str(&format_table_raw(&["#", "ACTION", "TARGET", "WAIT"], &rows));
    }

    if !plan.errors.is_empty() {
        output.push_str(&format!("\n\n{}\n", "UNPLANNED FINDINGS".red().bold()));
        for error in &plan.errors {
            output.push_str(&format!("{} {}: {}\n", "✗".red(), error.rule.bold(), error.error));
        }
    }

    output.trim_end().to_string()
}

/// Render per-action outcomes of an execution
pub fn format_execution(report: &ExecutionReport) -> String {
    let rows: Vec<Vec<String>> = report
        .outcomes
        .iter()
        .enumerate()
        .map(|(i, outcome)| {
            let (status, detail) = match &outcome.status {
                ActionStatus::Succeeded { detail } => ("Succeeded".green().to_string(), detail.clone()),
                ActionStatus::Failed { error } => ("Failed".red().to_string(), error.to_string()),
                ActionStatus::NotAttempted => ("NotAttempted".dimmed().to_string(), String::new()),
            };
            vec![(i + 1).to_string(), outcome.action.to_string(), status, detail]
        })
        .collect();

    if rows.is_empty() {
        return "Nothing to execute".to_string();
    }

    let mut output = format_table_raw(&["#", "ACTION", "STATUS", "DETAIL"], &rows);
    let elapsed = report.finished_at - report.started_at;
    output.push_str(&format!(
        "\n\n{}/{} actions succeeded in {}s",
        report.succeeded_count(),
        report.outcomes.len(),
        elapsed.num_seconds()
    ));
    output
}

fn action_target(action: &RemediationAction) -> String {
    match action {
        RemediationAction::DeleteObject { target, .. } => target.to_string(),
        RemediationAction::ApplyManifest { objects, .. } => objects
            .iter()
            .map(|o| o.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        RemediationAction::ScaleDeployment {
            name,
            namespace,
            replicas,
        } => format!("deployment/{} ({}) -> {}", name, namespace, replicas),
    }
}

fn wait_label(action: &RemediationAction) -> String {
    match action.wait() {
        Some(wait) => format!("{} ({}s)", wait.condition, wait.timeout.as_secs()),
        None => "-".to_string(),
    }
}

/// Format raw headers and rows as a table
pub fn format_table_raw(headers: &[&str], rows: &[Vec<String>]) -> String {
    let num_cols = headers.len();
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();

    for row in rows {
        for (i, cell) in row.iter().enumerate().take(num_cols) {
            widths[i] = widths[i].max(visible_width(cell));
        }
    }

    let mut output = String::new();

    let header_line: String = headers
        .iter()
        .enumerate()
        .map(|(i, h)| format!("{}{}", h, " ".repeat(widths[i] - h.len() + 2)))
        .collect();
    output.push_str(&header_line.trim_end().bold().to_string());
    output.push('\n');

    for row in rows {
        let line: String = row
            .iter()
            .enumerate()
            .take(num_cols)
            .map(|(i, cell)| {
                let padding = widths[i].saturating_sub(visible_width(cell));
                format!("{}{}", cell, " ".repeat(padding + 2))
            })
            .collect();
        output.push_str(line.trim_end());
        output.push('\n');
    }

    output.trim_end().to_string()
}

/// Character count ignoring ANSI escape sequences
fn visible_width(s: &str) -> usize {
    let mut width = 0;
    let mut in_escape = false;

    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
        } else if in_escape {
            if c == 'm' {
                in_escape = false;
            }
        } else {
            width += 1;
        }
    }

    width
}

/// Format as pretty JSON
pub fn format_json<T: serde::Serialize>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(value)
}

/// Format as YAML
pub fn format_yaml<T: serde::Serialize>(value: &T) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(value)
}
