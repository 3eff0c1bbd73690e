//! Terminal rendering of plans, progress and run reports

use colored::Colorize;
use vpcflow_cloud::{
    ActionType, Outcome, Plan, ProviderError, Progress, ReconcileError, RunReport,
};

pub fn print_plan(plan: &Plan) {
    println!("{} {} plan", "▶".blue(), plan.mode.to_string().bold());
    for (index, operation) in plan.operations.iter().enumerate() {
        let marker = match operation.action_type() {
            ActionType::Check => "?".dimmed(),
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Delete => "-".red(),
        };
        println!("  {:>3}. {} {}", index + 1, marker, operation);
    }
    println!();
    println!("{}", plan.summary());
}

/// Progress callback for [`vpcflow_cloud::Executor::run_with_progress`]
pub fn progress(event: Progress<'_>) {
    match event {
        Progress::Started {
            index,
            total,
            operation,
        } => {
            println!(
                "{} {}",
                format!("[{}/{}]", index + 1, total).dimmed(),
                operation
            );
        }
        Progress::Finished(record) => {
            let line = match &record.outcome {
                Outcome::Created | Outcome::Deleted | Outcome::Updated => {
                    format!("✓ {}", record.outcome).green()
                }
                Outcome::Verified => format!("✓ {}", record.outcome).normal(),
                Outcome::Skipped(_) => format!("• {}", record.outcome).dimmed(),
                Outcome::Failed(_) => "✗ failed".red().bold(),
            };
            match &record.resource_id {
                Some(id) => println!("      {} ({})", line, id.cyan()),
                None => println!("      {}", line),
            }
        }
    }
}

pub fn print_report(report: &RunReport) {
    println!();
    let summary = report.summary().to_string();
    if report.is_success() {
        println!("{} {}", "✓".green().bold(), summary.bold());
    } else {
        println!("{} {}", "✗".red().bold(), summary.bold());
    }
    println!("  finished in {} ms", report.duration_ms);

    if let Some(err) = &report.failure {
        print_failure(report, err);
    }
}

fn print_failure(report: &RunReport, err: &ReconcileError) {
    eprintln!();
    if let Some(record) = report.records.last() {
        eprintln!(
            "{} {} '{}'",
            "Failed at".red().bold(),
            record.kind,
            record.name.cyan()
        );
    }
    if let ReconcileError::Provider { class, source, .. } = err {
        eprintln!("  classification: {}", class.to_string().yellow());
        if let ProviderError::Status { status, body, .. } = source {
            eprintln!("  status: {}", status);
            eprintln!("  provider response: {}", body);
        }
    }
}
