//! Diagnose command implementation

use super::ExitStatus;
use crate::cli::OutputFormat;
use crate::client::{create_client, current_context};
use crate::cluster::{ControlPlane, KubeControlPlane};
use crate::config::AppConfig;
use crate::error::Result;
use crate::inspect::ClusterInspector;
use crate::output;
use crate::rules::{Finding, FindingSummary, RuleEngine};
use chrono::{DateTime, Utc};
use owo_colors::OwoColorize;
use serde::Serialize;

/// Findings for one namespace at one point in time
#[derive(Debug, Serialize)]
pub struct DiagnosisReport {
    pub namespace: String,
    pub captured_at: DateTime<Utc>,
    pub summary: FindingSummary,
    pub findings: Vec<Finding>,
}

impl DiagnosisReport {
    pub fn exit_status(&self) -> ExitStatus {
        if self.summary.blocking > 0 {
            ExitStatus::Partial
        } else {
            ExitStatus::Success
        }
    }
}

/// Inspect `namespace` and evaluate every rule against the snapshot
pub async fn diagnose(cluster: &dyn ControlPlane, namespace: &str) -> Result<DiagnosisReport> {
    let snapshot = ClusterInspector::new(cluster).snapshot(namespace).await?;
    let findings = RuleEngine::new().evaluate(&snapshot);

    Ok(DiagnosisReport {
        namespace: snapshot.namespace,
        captured_at: snapshot.captured_at,
        summary: FindingSummary::from_findings(&findings),
        findings,
    })
}

/// Execute diagnose command
pub async fn run_diagnose(
    context: Option<&str>,
    namespace: &str,
    output: OutputFormat,
    config: &AppConfig,
) -> Result<ExitStatus> {
    let client = create_client(context).await?;
    let cluster = KubeControlPlane::new(client, &config.field_manager);

    let report = diagnose(&cluster, namespace).await?;

    match output {
        OutputFormat::Json => println!("{}", output::format_json(&report)?),
        OutputFormat::Yaml => println!("{}", output::format_yaml(&report)?),
        OutputFormat::Table => {
            let context = context
                .map(String::from)
                .or_else(|| current_context().ok())
                .unwrap_or_else(|| "unknown".to_string());

            println!();
            println!(
                "{}",
                format!("Diagnosis: namespace {} (context {})", report.namespace, context).bold()
            );
            println!("{}", "=".repeat(50));
            println!("Status: {}", report.summary.health_status());
            println!("{}", output::format_findings(&report.findings));
            println!();
        }
    }

    Ok(report.exit_status())
}
