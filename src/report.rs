//! Terminal and JSON rendering of sweep runs

use crate::ui;
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::time::Duration;
use sweepkit::{DeleteOutcome, Error, Resource, ResourceType, SweepProgress, SweepReport};

// ============================================================================
// Live progress
// ============================================================================

/// Spinner per resource type plus one line per finished type
pub struct TerminalProgress {
    quiet: bool,
    dry_run: bool,
    spinner: Option<ProgressBar>,
    listed: usize,
    matched: usize,
    warnings: usize,
}

impl TerminalProgress {
    pub fn new(quiet: bool, dry_run: bool) -> Self {
        Self {
            quiet,
            dry_run,
            spinner: None,
            listed: 0,
            matched: 0,
            warnings: 0,
        }
    }

    fn spin(&mut self, message: String) {
        if self.quiet || !console::Term::stderr().is_term() {
            return;
        }
        let spinner = self.spinner.get_or_insert_with(|| {
            let spinner = ProgressBar::new_spinner();
            if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(100));
            spinner
        });
        spinner.set_message(message);
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }

    fn print(&self, line: impl FnOnce()) {
        if self.quiet {
            return;
        }
        match &self.spinner {
            Some(spinner) => spinner.suspend(line),
            None => line(),
        }
    }
}

impl SweepProgress for TerminalProgress {
    fn on_type_start(&mut self, resource_type: &ResourceType) {
        self.listed = 0;
        self.matched = 0;
        self.warnings = 0;
        self.spin(format!("Listing {resource_type}"));
    }

    fn on_listed(&mut self, resource_type: &ResourceType, count: usize) {
        self.listed = count;
        self.spin(format!("Filtering {}", ui::count(count, resource_type.as_str())));
    }

    fn on_matched(&mut self, resource_type: &ResourceType, matched: &[Resource]) {
        self.matched = matched.len();
        if !self.dry_run && !matched.is_empty() {
            self.spin(format!("Deleting {}", ui::count(matched.len(), resource_type.as_str())));
        }
    }

    fn on_deleted(&mut self, resource: &Resource, outcome: &DeleteOutcome) {
        let label = format!("{} {}", resource.resource_type, resource.display_name());
        self.print(|| match outcome {
            DeleteOutcome::Deleted => ui::success(&format!("Deleted {label}")),
            DeleteOutcome::Failed { error } => ui::error(&format!("Failed {label}: {error}")),
        });
    }

    fn on_warning(&mut self, _warning: &Error) {
        self.warnings += 1;
    }

    fn on_type_complete(&mut self, resource_type: &ResourceType) {
        self.clear();
        let mut line = format!(
            "{resource_type}: {} listed, {} matched",
            self.listed, self.matched
        );
        if self.warnings > 0 {
            line.push_str(&format!(", {}", ui::count(self.warnings, "warning")));
        }
        self.print(|| ui::dim(&line));
    }
}

// ============================================================================
// Final report
// ============================================================================

/// One region's report, as emitted in JSON output
#[derive(Serialize)]
pub struct RegionReport<'a> {
    pub region: &'a str,
    #[serde(flatten)]
    pub report: &'a SweepReport,
}

/// Pretty JSON array of region reports
pub fn render_json(reports: &[RegionReport<'_>]) -> Result<String> {
    serde_json::to_string_pretty(reports).context("Failed to serialize report")
}

/// One display line for a matched resource
pub fn resource_line(resource: &Resource) -> String {
    let mut line = resource.id.clone();
    if let Some(name) = resource.name.as_deref().filter(|n| *n != resource.id) {
        line.push_str(&format!(" ({name})"));
    }
    if !resource.tags.is_empty() {
        let tags: Vec<String> = resource
            .tags
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        line.push_str(&format!(" [{}]", ui::truncate(&tags.join(", "), 80)));
    }
    if let Some(created) = resource.created {
        line.push_str(&format!(" created {}", created.format("%Y-%m-%d %H:%M")));
    }
    line
}

/// A warning prefixed with its category, e.g. "Provider error: ..."
pub fn warning_line(warning: &Error) -> String {
    format!("{}: {warning}", warning.category().description())
}

/// Print a region's report grouped by type
pub fn print_text(region: &str, report: &SweepReport) {
    let mode = if report.dry_run { "dry run" } else { "live" };
    ui::header(&format!("Region {region} ({mode})"));

    if report.matched.is_empty() {
        ui::info("No resources matched");
    }

    let mut current: Option<&ResourceType> = None;
    for resource in &report.matched {
        if current != Some(&resource.resource_type) {
            current = Some(&resource.resource_type);
            ui::section(resource.resource_type.as_str());
        }
        println!("  {} {}", "•".dimmed(), resource_line(resource));
    }

    println!();
    let summary = &report.summary;
    ui::kv("Listed", &summary.listed.to_string());
    ui::kv("Matched", &summary.matched.to_string());
    if !report.dry_run {
        ui::kv("Deleted", &summary.deleted.to_string().green().to_string());
        if summary.failed > 0 {
            ui::kv("Failed", &summary.failed.to_string().red().to_string());
        }
    }

    if report.has_warnings() {
        ui::section("Warnings");
        for warning in &report.warnings {
            ui::warn(&warning_line(warning));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use sweepkit::SweepSummary;

    #[test]
    fn test_resource_line() {
        let resource = Resource::new("aws_instance", "i-1")
            .with_name("web")
            .with_tag("env", "test")
            .with_created(Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 0).unwrap());
        assert_eq!(
            resource_line(&resource),
            "i-1 (web) [env=test] created 2024-01-02 03:04"
        );
        assert_eq!(resource_line(&Resource::new("aws_vpc", "vpc-1")), "vpc-1");
    }

    #[test]
    fn test_warning_line() {
        let warning = Error::MissingResourceId {
            resource_type: ResourceType::from("aws_vpc"),
        };
        assert_eq!(
            warning_line(&warning),
            "Provider error: aws_vpc listing returned a resource without an id"
        );
    }

    #[test]
    fn test_render_json() {
        let report = SweepReport {
            dry_run: true,
            matched: vec![Resource::new("aws_vpc", "vpc-1").with_tag("env", "ci")],
            summary: SweepSummary {
                types: 1,
                listed: 3,
                matched: 1,
                ..Default::default()
            },
            warnings: vec![Error::MissingResourceId {
                resource_type: ResourceType::from("aws_vpc"),
            }],
        };
        let json = render_json(&[RegionReport {
            region: "eu-west-1",
            report: &report,
        }])
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let first = &value[0];
        assert_eq!(first["region"], "eu-west-1");
        assert_eq!(first["dry_run"], true);
        assert_eq!(first["matched"][0]["type"], "aws_vpc");
        assert_eq!(first["matched"][0]["tags"]["env"], "ci");
        assert_eq!(first["summary"]["listed"], 3);
        assert_eq!(
            first["warnings"][0],
            "aws_vpc listing returned a resource without an id"
        );
    }

    #[test]
    fn test_quiet_progress_counts() {
        let mut progress = TerminalProgress::new(true, false);
        let vpc = ResourceType::from("aws_vpc");
        progress.on_type_start(&vpc);
        progress.on_listed(&vpc, 4);
        progress.on_matched(&vpc, &[Resource::new("aws_vpc", "vpc-1")]);
        progress.on_warning(&Error::MissingResourceId {
            resource_type: vpc.clone(),
        });
        assert_eq!((progress.listed, progress.matched, progress.warnings), (4, 1, 1));
        progress.on_type_complete(&vpc);
        assert!(progress.spinner.is_none());
    }
}
