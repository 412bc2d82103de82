use anyhow::{Context as AnyhowContext, Result};
use std::path::Path;
use std::sync::Arc;
use sweepkit::{FilterSet, Registry, Session, SweepOptions};

use crate::Context;
use crate::config::{self, Config};
use crate::provider::kinds::AwsKind;
use crate::provider::{self, Connect, ProcessConnector};
use crate::ui;

pub fn run(ctx: &Context, config_arg: Option<&str>) -> Result<()> {
    let path = config::resolve_path(config_arg)?;
    let (config, filters) = check(&path)?;

    if !ctx.quiet {
        ui::success(&format!("{} is valid", path.display()));
        ui::kv("Regions", &config.options.regions.join(", "));
        for resource_type in filters.types() {
            let count = filters.get(resource_type).map_or(0, |f| f.len());
            let detail = if count == 0 {
                "every resource".to_string()
            } else {
                ui::count(count, "filter")
            };
            ui::kv(resource_type.as_str(), &detail);
        }
    }
    Ok(())
}

/// Parse the file, compile every filter and check types and options
/// against the offline registry
fn check(path: &Path) -> Result<(Config, FilterSet)> {
    let config = Config::load(path)?;
    let filters = FilterSet::compile(&config.filters)
        .with_context(|| format!("Invalid filters in {}", path.display()))?;
    check_offline(&filters, &config.sweep_options())?;
    Ok((config, filters))
}

/// Every config-level check that can fail a run, without calling the provider
pub(crate) fn check_offline(filters: &FilterSet, options: &SweepOptions) -> Result<()> {
    if let Some(unknown) = filters
        .types()
        .find(|t| AwsKind::from_type(t.as_str()).is_none())
    {
        return Err(sweepkit::Error::UnsupportedResourceType(unknown.clone()))
            .context("Run `cloudsweep types` to list supported types");
    }
    sweepkit::validate(&offline_registry()?, filters, options)?;
    Ok(())
}

/// Registry bound to a default session; connecting it does not call the provider
pub(crate) fn offline_registry() -> Result<Registry> {
    let connector: Arc<dyn Connect> = Arc::new(ProcessConnector::new());
    Ok(provider::registry(Session::default(), &connector)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_valid_config() {
        let file = write(
            "[options]\nregions = [\"eu-west-1\"]\n\n[[filters.aws_instance]]\nids = [\"^i-\"]\n\n[[filters.aws_s3_bucket]]\n",
        );
        let (_, filters) = check(file.path()).unwrap();
        assert_eq!(filters.len(), 2);
    }

    #[test]
    fn test_unknown_type() {
        let file = write("[options]\nregions = [\"eu-west-1\"]\n\n[[filters.aws_lambda]]\n");
        let err = check(file.path()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("cloudsweep types"));
        assert!(message.contains("unsupported resource type found in config: aws_lambda"));
    }

    #[test]
    fn test_bad_pattern() {
        let file = write("[options]\nregions = [\"eu-west-1\"]\n\n[[filters.aws_vpc]]\nids = [\"(\"]\n");
        let err = check(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("invalid aws_vpc id pattern"));
    }
}
