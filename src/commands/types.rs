use anyhow::Result;
use colored::Colorize;

use crate::Context;
use crate::commands::validate::offline_registry;
use crate::ui;

/// Print supported resource types in deletion order
pub fn run(ctx: &Context) -> Result<()> {
    let registry = offline_registry()?;

    if !ctx.quiet {
        ui::header("Supported resource types");
    }
    for descriptor in registry.descriptors() {
        let marker = if descriptor.uses_first_seen_marker {
            format!("  {}", "first-seen marker".dimmed())
        } else {
            String::new()
        };
        println!(
            "  {:<24} {:>5}{marker}",
            descriptor.resource_type.as_str(),
            descriptor.priority
        );
    }
    if !ctx.quiet {
        ui::dim("Higher priority types are deleted first");
    }
    Ok(())
}
