//! AWS provider adapters
//!
//! Every provider call goes through the [`AwsCli`] trait. The production
//! implementation shells out to the `aws` command line tool and parses its
//! JSON output; tests use a scripted fake.

pub mod handler;
pub mod kinds;
pub mod session;

#[cfg(test)]
pub mod fake;

use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::process::Command;
use std::sync::{Arc, Mutex};
use sweepkit::{Registry, Session};

use handler::AwsHandler;
use kinds::AwsKind;
use session::Credentials;

/// A way to run one AWS API operation
pub trait AwsCli: Send + Sync {
    /// Run `aws <service> <operation> <args...>` and return its JSON output.
    ///
    /// Operations that print nothing return `Value::Null`.
    fn call(&self, service: &str, operation: &str, args: &[&str]) -> Result<Value>;
}

/// Builds the client a handler uses for a session
pub trait Connect: Send + Sync {
    fn connect(&self, session: &Session) -> Result<Arc<dyn AwsCli>>;
}

/// Program invoked for provider calls
const AWS_PROGRAM: &str = "aws";

/// `aws` process bound to one region and credential set
pub struct ProcessCli {
    region: String,
    profile: Option<String>,
    max_attempts: u32,
    endpoint_url: Option<String>,
    credentials: Option<Credentials>,
}

impl ProcessCli {
    pub fn new(session: &Session) -> Self {
        Self {
            region: session.region.clone(),
            profile: session.profile.clone(),
            // AWS_MAX_ATTEMPTS counts the first try
            max_attempts: session.max_retries.saturating_add(1),
            endpoint_url: session.extra.get("endpoint_url").cloned(),
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    fn command(&self, service: &str, operation: &str, args: &[&str]) -> Command {
        let mut cmd = Command::new(AWS_PROGRAM);
        cmd.arg(service)
            .arg(operation)
            .args(args)
            .args(["--output", "json", "--region", self.region.as_str()])
            .env("AWS_MAX_ATTEMPTS", self.max_attempts.to_string())
            .env("AWS_PAGER", "");

        if let Some(endpoint) = &self.endpoint_url {
            cmd.args(["--endpoint-url", endpoint.as_str()]);
        }
        match &self.credentials {
            Some(credentials) => {
                cmd.env_remove("AWS_PROFILE");
                for (key, value) in credentials.env() {
                    cmd.env(key, value);
                }
            }
            None => {
                if let Some(profile) = &self.profile {
                    cmd.env("AWS_PROFILE", profile);
                }
            }
        }
        cmd
    }
}

impl AwsCli for ProcessCli {
    fn call(&self, service: &str, operation: &str, args: &[&str]) -> Result<Value> {
        log::trace!("aws {service} {operation} {}", args.join(" "));

        let output = self
            .command(service, operation, args)
            .output()
            .with_context(|| format!("Failed to execute: {AWS_PROGRAM} {service} {operation}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{service} {operation}: {}", stderr.trim());
        }
        parse_output(&String::from_utf8_lossy(&output.stdout))
            .with_context(|| format!("Invalid output from {service} {operation}"))
    }
}

/// Parse stdout of an `aws` call.
///
/// High-level commands (`aws s3 rb`) print plain text; that comes back as
/// a JSON string.
fn parse_output(stdout: &str) -> Result<Value> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Value::Null);
    }
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).context("Malformed JSON");
    }
    Ok(Value::String(trimmed.to_string()))
}

/// Connector that spawns `aws` processes, assuming a role when asked.
///
/// Clients are cached per region so a role is assumed once per region
/// rather than once per resource type.
#[derive(Default)]
pub struct ProcessConnector {
    clients: Mutex<BTreeMap<String, Arc<dyn AwsCli>>>,
}

impl ProcessConnector {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Connect for ProcessConnector {
    fn connect(&self, session: &Session) -> Result<Arc<dyn AwsCli>> {
        let mut clients = match self.clients.lock() {
            Ok(clients) => clients,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(client) = clients.get(&session.region) {
            return Ok(Arc::clone(client));
        }

        let mut cli = ProcessCli::new(session);
        if let Some(role) = &session.role_to_assume {
            let credentials = session::assume_role(&cli, role)
                .with_context(|| format!("Failed to assume role {role}"))?;
            cli = cli.with_credentials(credentials);
        }

        let client: Arc<dyn AwsCli> = Arc::new(cli);
        clients.insert(session.region.clone(), Arc::clone(&client));
        Ok(client)
    }
}

/// Registry with a handler for every supported resource kind
pub fn registry(session: Session, connector: &Arc<dyn Connect>) -> sweepkit::Result<Registry> {
    let mut registry = Registry::new(session);
    for kind in AwsKind::ALL {
        registry.register(Box::new(AwsHandler::new(kind, Arc::clone(connector))))?;
    }
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fake::{FakeCli, FakeConnector};
    use serde_json::json;

    #[test]
    fn test_parse_output() {
        assert_eq!(parse_output("").unwrap(), Value::Null);
        assert_eq!(parse_output("  \n").unwrap(), Value::Null);
        assert_eq!(parse_output(r#"{"a": 1}"#).unwrap(), json!({"a": 1}));
        assert_eq!(
            parse_output("remove_bucket: ci-artifacts\n").unwrap(),
            json!("remove_bucket: ci-artifacts")
        );
        assert!(parse_output("{not json").is_err());
    }

    #[test]
    fn test_process_cli_command_line() {
        let mut session = Session {
            region: "eu-west-1".into(),
            max_retries: 4,
            profile: Some("sandbox".into()),
            ..Default::default()
        };
        session
            .extra
            .insert("endpoint_url".into(), "http://localhost:4566".into());

        let cmd = ProcessCli::new(&session).command("ec2", "describe-vpcs", &[]);
        let args: Vec<String> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "ec2",
                "describe-vpcs",
                "--output",
                "json",
                "--region",
                "eu-west-1",
                "--endpoint-url",
                "http://localhost:4566"
            ]
        );

        let envs: BTreeMap<String, Option<String>> = cmd
            .get_envs()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.map(|v| v.to_string_lossy().into_owned()),
                )
            })
            .collect();
        assert_eq!(envs["AWS_MAX_ATTEMPTS"].as_deref(), Some("5"));
        assert_eq!(envs["AWS_PROFILE"].as_deref(), Some("sandbox"));
    }

    #[test]
    fn test_registry_registers_every_kind() {
        let cli = Arc::new(FakeCli::new());
        let connector: Arc<dyn Connect> = Arc::new(FakeConnector::new(cli));
        let registry = registry(Session::default(), &connector).unwrap();

        assert_eq!(registry.len(), AwsKind::ALL.len());
        let order: Vec<String> = registry
            .descriptors()
            .into_iter()
            .map(|d| d.resource_type.to_string())
            .collect();
        assert_eq!(order.first().map(String::as_str), Some("aws_instance"));
        let subnet = order.iter().position(|t| t == "aws_subnet").unwrap();
        let vpc = order.iter().position(|t| t == "aws_vpc").unwrap();
        assert!(subnet < vpc);
    }

    #[test]
    fn test_connect_failure_is_initialize_error() {
        struct Refuse;
        impl Connect for Refuse {
            fn connect(&self, _session: &Session) -> Result<Arc<dyn AwsCli>> {
                anyhow::bail!("ExpiredToken")
            }
        }

        let connector: Arc<dyn Connect> = Arc::new(Refuse);
        let err = registry(Session::default(), &connector).err().unwrap();
        assert!(matches!(err, sweepkit::Error::Initialize { .. }));
        assert!(err.to_string().contains("ExpiredToken"));
    }

    #[test]
    fn test_assume_role_credentials_are_used() {
        let cli = FakeCli::new().respond(
            "sts",
            "assume-role",
            json!({
                "Credentials": {
                    "AccessKeyId": "AKIA",
                    "SecretAccessKey": "secret",
                    "SessionToken": "token",
                    "Expiration": "2024-01-01T00:00:00Z"
                }
            }),
        );
        let credentials = session::assume_role(&cli, "arn:aws:iam::1:role/x").unwrap();

        let session = Session {
            region: "us-east-1".into(),
            profile: Some("ignored".into()),
            ..Default::default()
        };
        let cmd = ProcessCli::new(&session)
            .with_credentials(credentials)
            .command("sts", "get-caller-identity", &[]);
        let envs: BTreeMap<String, Option<String>> = cmd
            .get_envs()
            .map(|(k, v)| {
                (
                    k.to_string_lossy().into_owned(),
                    v.map(|v| v.to_string_lossy().into_owned()),
                )
            })
            .collect();
        assert_eq!(envs["AWS_ACCESS_KEY_ID"].as_deref(), Some("AKIA"));
        assert_eq!(envs["AWS_SESSION_TOKEN"].as_deref(), Some("token"));
        // env_remove shows up as an unset entry
        assert_eq!(envs["AWS_PROFILE"], None);
    }
}
