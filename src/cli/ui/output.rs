use console::style;

use crate::repair::{FixAttempt, RepairStatistics};
use crate::types::{Issue, QualityReport, Severity};

pub struct Output;

impl Output {
    pub fn new() -> Self {
        Self
    }

    pub fn success(&self, message: &str) {
        println!("{} {}", style("✓").green(), message);
    }

    pub fn error(&self, message: &str) {
        eprintln!("{} {}", style("✗").red(), message);
    }

    pub fn warning(&self, message: &str) {
        println!("{} {}", style("⚠").yellow(), message);
    }

    pub fn info(&self, message: &str) {
        println!("{} {}", style("ℹ").blue(), message);
    }

    pub fn header(&self, message: &str) {
        println!("\n{}", style(message).bold().underlined());
    }

    pub fn section(&self, message: &str) {
        println!("\n{}", style(message).bold());
        println!("{}", "─".repeat(40));
    }

    pub fn issue(&self, issue: &Issue) {
        let marker = match issue.severity {
            Severity::Error => style("E").red().bold(),
            Severity::Warning => style("W").yellow().bold(),
            Severity::Info => style("I").blue(),
        };
        let location = issue
            .line
            .map_or_else(|| "    ".to_string(), |l| format!("{:>4}", l));
        let fixed = if issue.fixed {
            style(" (fixed)").green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {} {} {} {}{}",
            marker,
            style(location).dim(),
            style(&issue.issue_type).cyan(),
            issue.message,
            fixed
        );
    }

    pub fn report(&self, report: &QualityReport) {
        self.header(&format!("Quality report ({})", report.language));
        for pass in &report.passes {
            if pass.issues_found.is_empty() {
                continue;
            }
            self.section(&format!(
                "{} ({} found, {} fixed)",
                pass.pass_name,
                pass.issues_found.len(),
                pass.issues_fixed.len()
            ));
            for issue in &pass.issues_found {
                self.issue(issue);
            }
        }
        println!();
        let score = format!("{:.0}/100", report.overall_score);
        let score = if report.overall_score >= 80.0 {
            style(score).green()
        } else if report.overall_score >= 50.0 {
            style(score).yellow()
        } else {
            style(score).red()
        };
        println!("Score: {}  {}", score, style(&report.summary).dim());
    }

    pub fn attempt(&self, attempt: &FixAttempt) {
        let status = if attempt.success {
            style("ok").green()
        } else {
            style("failed").red()
        };
        println!(
            "  #{} {:<22} {} -> {}  {}{}",
            attempt.iteration,
            attempt.strategy.name(),
            attempt.errors_before,
            attempt.errors_after,
            status,
            attempt
                .failure_reason
                .as_deref()
                .map(|r| format!(" ({})", r))
                .unwrap_or_default()
        );
    }

    pub fn statistics(&self, stats: &RepairStatistics) {
        self.section("Strategy effectiveness");
        for (name, counters) in &stats.strategy_effectiveness {
            println!(
                "  {:<22} {}/{} ({:.0}%)",
                name,
                counters.successes,
                counters.attempts,
                counters.success_rate() * 100.0
            );
        }
    }
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}
