use anyhow::{Context as AnyhowContext, Result};
use std::sync::Arc;
use sweepkit::{FilterSet, SweepOptions, SweepReport};

use crate::Context;
use crate::cli::{OutputFormat, RunArgs};
use crate::commands::validate;
use crate::config::{self, Config};
use crate::provider::{self, Connect, ProcessConnector};
use crate::report::{self, RegionReport, TerminalProgress};
use crate::ui;

pub fn run(ctx: &Context, args: RunArgs) -> Result<()> {
    let path = config::resolve_path(args.config.as_deref())?;
    let mut config = Config::read(&path)?;
    apply_overrides(&mut config, &args);
    config
        .validate()
        .with_context(|| format!("Invalid config file: {}", path.display()))?;

    let filters = FilterSet::compile(&config.filters)?;
    let json = args.output == OutputFormat::Json;
    let interactive = !config.options.dry_run && !args.force;

    if interactive {
        if json {
            anyhow::bail!("JSON output needs --dry-run or --force");
        }
        if !console::Term::stderr().is_term() {
            anyhow::bail!("Refusing to delete without confirmation; pass --force or --dry-run");
        }
    }

    if ctx.verbose > 0 && !json {
        ui::kv("Config", &path.display().to_string());
        ui::kv("Regions", &config.options.regions.join(", "));
        ui::kv("Types", &filters.len().to_string());
    }

    let sweeper = Sweeper::new(
        &config,
        &filters,
        Arc::new(ProcessConnector::new()),
        ctx.quiet || json,
    )?;

    let mut reports = Vec::new();
    for region in &config.options.regions {
        log::info!("Sweeping region {region}");
        let report = if interactive {
            match sweeper.confirmed(region)? {
                Some(report) => report,
                None => continue,
            }
        } else {
            sweeper.sweep(region, &sweeper.options())?
        };
        if !json {
            report::print_text(region, &report);
        }
        reports.push((region.clone(), report));
    }

    if json {
        let regions: Vec<RegionReport<'_>> = reports
            .iter()
            .map(|(region, report)| RegionReport { region, report })
            .collect();
        println!("{}", report::render_json(&regions)?);
    }

    // failed deletions are reported, not fatal
    let failed: usize = reports.iter().map(|(_, r)| r.summary.failed).sum();
    if failed > 0 && !json {
        ui::warn(&format!("{} could not be deleted", ui::count(failed, "resource")));
    }
    Ok(())
}

/// Command-line flags win over the config file
fn apply_overrides(config: &mut Config, args: &RunArgs) {
    let options = &mut config.options;
    if !args.regions.is_empty() {
        options.regions = args.regions.clone();
    }
    if let Some(profile) = &args.profile {
        options.profile = Some(profile.clone());
    }
    if let Some(workers) = args.workers {
        options.workers = workers as usize;
    }
    if let Some(shift) = args.time_shift {
        options.time_shift = Some(shift);
    }
    if args.dry_run {
        options.dry_run = true;
    }
}

// ============================================================================
// Per-region runs
// ============================================================================

struct Sweeper<'a> {
    config: &'a Config,
    filters: &'a FilterSet,
    connector: Arc<dyn Connect>,
    quiet: bool,
}

impl<'a> Sweeper<'a> {
    /// Fails on config errors before any region is connected
    fn new(
        config: &'a Config,
        filters: &'a FilterSet,
        connector: Arc<dyn Connect>,
        quiet: bool,
    ) -> Result<Self> {
        validate::check_offline(filters, &config.sweep_options())?;
        Ok(Self {
            config,
            filters,
            connector,
            quiet,
        })
    }

    fn options(&self) -> SweepOptions {
        self.config.sweep_options()
    }

    fn sweep(&self, region: &str, options: &SweepOptions) -> Result<SweepReport> {
        let registry = provider::registry(self.config.session(region), &self.connector)
            .with_context(|| format!("Failed to connect to region {region}"))?;
        let mut progress = TerminalProgress::new(self.quiet, options.dry_run);
        let report = sweepkit::sweep(&registry, self.filters, options, &mut progress)
            .with_context(|| format!("Sweep of region {region} failed"))?;
        Ok(report)
    }

    /// Preview, ask, then re-list and delete. `None` when nothing was deleted.
    fn confirmed(&self, region: &str) -> Result<Option<SweepReport>> {
        let options = self.options();
        let preview_options = SweepOptions {
            dry_run: true,
            ..options.clone()
        };

        let preview = self.sweep(region, &preview_options)?;
        report::print_text(region, &preview);
        if preview.matched.is_empty() {
            return Ok(None);
        }

        let prompt = format!(
            "Delete {} in {region}?",
            ui::count(preview.matched.len(), "resource")
        );
        if !ui::confirm(&prompt)? {
            ui::info(&format!("Skipped {region}"));
            return Ok(None);
        }

        self.sweep(region, &options).map(Some)
    }
}
