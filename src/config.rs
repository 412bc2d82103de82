use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use sweepkit::duration;
use sweepkit::{DEFAULT_WORKERS, FilterSpec, ResourceType, Session, SweepOptions};

/// Default retry budget handed to the provider
pub const DEFAULT_MAX_RETRIES: u32 = 25;

/// Get the config directory path (~/.config/cloudsweep)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("cloudsweep"))
}

/// Resolve the config file to use: the argument (tilde-expanded) or the default
pub fn resolve_path(arg: Option<&str>) -> Result<PathBuf> {
    match arg {
        Some(path) => Ok(PathBuf::from(shellexpand::tilde(path).as_ref())),
        None => Ok(config_dir()?.join("config.toml")),
    }
}

// ============================================================================
// Config Schema
// ============================================================================

/// A sweep configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub options: Options,

    /// Filters per resource type; an empty list selects every resource
    #[serde(default)]
    pub filters: BTreeMap<ResourceType, Vec<FilterSpec>>,
}

/// Run options from the `[options]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct Options {
    /// Regions to sweep, one run each
    pub regions: Vec<String>,
    pub dry_run: bool,
    pub max_retries: u32,
    /// Deletions in flight at once
    pub workers: usize,
    pub role_to_assume: Option<String>,
    pub profile: Option<String>,
    /// Write the first-seen tag on kinds without a creation date
    pub mark_first_seen: bool,
    /// Pretend "now" is this far away (e.g. "7d" previews next week's run)
    #[serde(with = "duration::option", skip_serializing_if = "Option::is_none")]
    pub time_shift: Option<TimeDelta>,
    /// Provider settings passed through untouched (e.g. `endpoint_url`)
    pub extra: BTreeMap<String, String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            regions: Vec::new(),
            dry_run: false,
            max_retries: DEFAULT_MAX_RETRIES,
            workers: DEFAULT_WORKERS,
            role_to_assume: None,
            profile: None,
            mark_first_seen: false,
            time_shift: None,
            extra: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let config = Self::read(path)?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Read a config file without validating options, so callers can
    /// apply overrides first
    pub fn read(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Could not read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Invalid TOML in config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Check option values. Filters are checked when compiled.
    pub fn validate(&self) -> Result<()> {
        if self.options.regions.is_empty() {
            anyhow::bail!("At least one region must be configured in [options] regions");
        }
        if let Some(empty) = self.options.regions.iter().find(|r| r.trim().is_empty()) {
            anyhow::bail!("Invalid region name: '{empty}'");
        }
        if self.options.workers == 0 {
            anyhow::bail!("workers must be at least 1");
        }
        Ok(())
    }

    /// Engine options for a run
    pub fn sweep_options(&self) -> SweepOptions {
        SweepOptions {
            dry_run: self.options.dry_run,
            workers: self.options.workers,
            mark_first_seen: self.options.mark_first_seen,
            time_shift: self.options.time_shift.unwrap_or_else(TimeDelta::zero),
        }
    }

    /// Provider session for one region
    pub fn session(&self, region: &str) -> Session {
        Session {
            region: region.to_string(),
            profile: self.options.profile.clone(),
            max_retries: self.options.max_retries,
            role_to_assume: self.options.role_to_assume.clone(),
            extra: self.options.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(content: &str) -> Result<Config> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    const SAMPLE: &str = r#"
[options]
regions = ["eu-west-1", "us-east-1"]
max_retries = 5
workers = 4
role_to_assume = "arn:aws:iam::123456789012:role/cleanup"
time_shift = "7d"

[options.extra]
endpoint_url = "http://localhost:4566"

[filters]
aws_s3_bucket = []

[[filters.aws_instance]]
tags = [{ env = "^test" }]
age = { older_than = "24h" }

[[filters.aws_instance]]
ids = ["^i-0abc"]

[[filters.aws_vpc]]
"#;

    #[test]
    fn test_parse_sample() {
        let config = parse(SAMPLE).unwrap();
        assert_eq!(config.options.regions, vec!["eu-west-1", "us-east-1"]);
        assert_eq!(config.filters[&ResourceType::from("aws_instance")].len(), 2);
        assert!(config.filters[&ResourceType::from("aws_vpc")][0].is_empty());
        assert!(config.filters[&ResourceType::from("aws_s3_bucket")].is_empty());

        let options = config.sweep_options();
        assert_eq!(options.workers, 4);
        assert_eq!(options.time_shift, TimeDelta::days(7));
        assert!(!options.dry_run);

        let session = config.session("us-east-1");
        assert_eq!(session.region, "us-east-1");
        assert_eq!(session.max_retries, 5);
        assert_eq!(session.extra["endpoint_url"], "http://localhost:4566");
    }

    #[test]
    fn test_defaults() {
        let config = parse("[options]\nregions = [\"eu-west-1\"]").unwrap();
        assert_eq!(config.options.workers, DEFAULT_WORKERS);
        assert_eq!(config.options.max_retries, DEFAULT_MAX_RETRIES);
        assert_eq!(config.sweep_options().time_shift, TimeDelta::zero());
        assert!(config.filters.is_empty());
    }

    #[test]
    fn test_requires_region() {
        let err = parse("[options]\ndry_run = true").unwrap_err();
        assert!(err.to_string().contains("At least one region"));
    }

    #[test]
    fn test_rejects_zero_workers() {
        assert!(parse("[options]\nregions = [\"x\"]\nworkers = 0").is_err());
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(parse("[options]\nregions = [\"x\"]\nregion = \"y\"").is_err());
        assert!(parse("[options]\nregions = [\"x\"]\n[[filters.aws_vpc]]\nidz = [\"a\"]").is_err());
        assert!(parse("[options]\nregions = [\"x\"]\n[other]").is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.filters.len(), 3);
    }

    #[test]
    fn test_read_skips_validation() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[[filters.aws_vpc]]\nids = [\"^vpc-\"]\n").unwrap();

        let config = Config::read(file.path()).unwrap();
        assert!(config.options.regions.is_empty());
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Config::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Could not read config file"));
    }

    #[test]
    fn test_resolve_path() {
        let explicit = resolve_path(Some("/tmp/sweep.toml")).unwrap();
        assert_eq!(explicit, PathBuf::from("/tmp/sweep.toml"));

        if let Some(home) = dirs::home_dir() {
            assert_eq!(resolve_path(Some("~/s.toml")).unwrap(), home.join("s.toml"));
            assert_eq!(
                resolve_path(None).unwrap(),
                home.join(".config/cloudsweep/config.toml")
            );
        }
    }
}
