//! Remediate command implementation

use super::ExitStatus;
use crate::cli::{OutputFormat, RemediateArgs};
use crate::client::create_client;
use crate::cluster::{ControlPlane, KubeControlPlane};
use crate::config::AppConfig;
use crate::error::{KfError, Result};
use crate::execute::{ExecutionReport, Executor};
use crate::inspect::ClusterInspector;
use crate::output;
use crate::plan::{Plan, PlannerPolicy, RemediationPlanner};
use crate::rules::{Finding, RuleEngine};
use owo_colors::OwoColorize;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Everything a remediation run decided and did
#[derive(Debug, Serialize)]
pub struct RemediationReport {
    pub namespace: String,
    pub dry_run: bool,
    pub findings: Vec<Finding>,
    pub plan: Plan,
    /// Absent on dry runs
    pub execution: Option<ExecutionReport>,
}

impl RemediationReport {
    /// Unreachable when execution lost the cluster, Partial when any finding
    /// went unplanned or execution halted
    pub fn exit_status(&self) -> ExitStatus {
        if let Some(err) = self.execution.as_ref().and_then(|e| e.failure()) {
            if err.is_fatal() {
                return ExitStatus::Unreachable;
            }
        }

        let halted = self.execution.as_ref().is_some_and(|e| !e.succeeded());
        if halted || !self.plan.errors.is_empty() {
            ExitStatus::Partial
        } else {
            ExitStatus::Success
        }
    }
}

/// Inspect, plan, and unless `dry_run` execute the plan
pub async fn remediate(
    cluster: &dyn ControlPlane,
    namespace: &str,
    policy: PlannerPolicy,
    dry_run: bool,
    deadline: Duration,
) -> Result<RemediationReport> {
    let snapshot = ClusterInspector::new(cluster).snapshot(namespace).await?;
    let findings = RuleEngine::new().evaluate(&snapshot);
    let plan = RemediationPlanner::for_snapshot(policy, &snapshot).plan(&findings);

    info!(
        actions = plan.actions.len(),
        unplanned = plan.errors.len(),
        dry_run,
        "remediation plan ready"
    );

    let execution = if dry_run || plan.actions.is_empty() {
        None
    } else {
        let report = Executor::new(cluster)
            .with_deadline(deadline)
            .apply(&plan.actions)
            .await;
        Some(report)
    };

    Ok(RemediationReport {
        namespace: snapshot.namespace,
        dry_run,
        findings,
        plan,
        execution,
    })
}

/// Execute remediate command
pub async fn run_remediate(
    context: Option<&str>,
    namespace: &str,
    args: &RemediateArgs,
    output: OutputFormat,
    config: &AppConfig,
) -> Result<ExitStatus> {
    let deadline = match args.deadline {
        Some(0) => {
            return Err(KfError::InvalidArgument(
                "--deadline must be at least one second".to_string(),
            ))
        }
        Some(secs) => Duration::from_secs(secs),
        None => config.deadline(),
    };
    let policy = PlannerPolicy::from_config(config)?;

    let client = create_client(context).await?;
    let cluster = KubeControlPlane::new(client, &config.field_manager);

    let report = remediate(&cluster, namespace, policy, args.dry_run, deadline).await?;

    match output {
        OutputFormat::Json => println!("{}", output::format_json(&report)?),
        OutputFormat::Yaml => println!("{}", output::format_yaml(&report)?),
        OutputFormat::Table => print_report(&report),
    }

    Ok(report.exit_status())
}

fn print_report(report: &RemediationReport) {
    let blocking = report.findings.iter().filter(|f| f.is_blocking()).count();
    let title = if report.dry_run {
        format!("Remediation plan (dry run): namespace {}", report.namespace)
    } else {
        format!("Remediation: namespace {}", report.namespace)
    };

    println!();
    println!("{}", title.bold());
    println!("{}", "=".repeat(50));
    println!("Blocking findings: {}", blocking);
    println!();
    println!("{}", output::format_plan(&report.plan));

    if let Some(execution) = &report.execution {
        println!();
        println!("{}", output::format_execution(execution));

        let unfinished = execution.unfinished();
        if !unfinished.is_empty() {
            println!();
            println!(
                "{} {} action(s) left unfinished; rerun `kf remediate` once the cause is fixed",
                "!".yellow(),
                unfinished.len()
            );
        }
    }
    println!();
}
