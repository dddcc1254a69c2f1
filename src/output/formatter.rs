use colored::Colorize;

use crate::automation::enforcer::EnforceSummary;
use crate::automation::queue::DrainSummary;
use crate::insights::recommend::GenerateSummary;
use crate::store::models::{outcome, ActivityLogEntry};

/// Report a failed run on stderr, keeping stdout for summaries.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "error:".red().bold(), msg);
}

/// Print the per-rule outcomes of an enforcement pass.
pub fn print_enforce_summary(summary: &EnforceSummary) {
    println!();
    if summary.runs.is_empty() {
        println!("{}", "No enabled automation rules.".dimmed());
        return;
    }

    println!("Rule outcomes:");
    for run in &summary.runs {
        if run.status == outcome::SUCCESS {
            println!(
                "  {} {} {}",
                "+".green().bold(),
                run.rule_id.bold(),
                format!("queued {}", run.count).dimmed()
            );
        } else {
            println!(
                "  {} {} {}",
                "!".red().bold(),
                run.rule_id.bold(),
                run.error.as_deref().unwrap_or("failed").red()
            );
        }
    }
    println!();
    println!("{}", summary);
}

pub fn print_drain_summary(summary: &DrainSummary) {
    println!();
    println!("{}", summary);
}

pub fn print_generate_summary(summary: &GenerateSummary) {
    println!();
    for (mode, count) in &summary.per_mode {
        println!("  {:<12} {}", mode.as_str(), count.to_string().bold());
    }
    println!();
    println!("{}", summary);
}

/// Print activity log entries as an aligned table.
pub fn print_activity(entries: &[ActivityLogEntry]) {
    if entries.is_empty() {
        println!("{}", "No activity recorded.".dimmed());
        return;
    }

    let type_width = entries
        .iter()
        .map(|e| e.entry_type.len())
        .max()
        .unwrap_or(4)
        .max(4);

    println!(
        "{:<25}  {:<width$}  {:<7}  SUMMARY",
        "CREATED",
        "TYPE",
        "STATUS",
        width = type_width
    );
    println!("{}", "─".repeat(25 + type_width + 7 + 6 + 40));
    for e in entries {
        let status = if e.status == outcome::SUCCESS {
            format!("{:<7}", e.status).green()
        } else {
            format!("{:<7}", e.status).red()
        };
        let created: String = e.created_at.chars().take(25).collect();
        println!(
            "{:<25}  {:<width$}  {}  {}",
            created.dimmed(),
            e.entry_type,
            status,
            e.summary,
            width = type_width
        );
    }
    println!("\n({} entries)", entries.len());
}
