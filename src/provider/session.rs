//! Temporary credentials for role assumption

use super::AwsCli;
use anyhow::{Context, Result};
use serde::Deserialize;

/// Session name recorded in CloudTrail for assumed-role calls
const SESSION_NAME: &str = "cloudsweep";

/// Credentials returned by `sts assume-role`
#[derive(Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    access_key_id: String,
    secret_access_key: String,
    session_token: String,
}

impl Credentials {
    /// Environment variables the `aws` tool reads credentials from
    pub fn env(&self) -> [(&'static str, &str); 3] {
        [
            ("AWS_ACCESS_KEY_ID", self.access_key_id.as_str()),
            ("AWS_SECRET_ACCESS_KEY", self.secret_access_key.as_str()),
            ("AWS_SESSION_TOKEN", self.session_token.as_str()),
        ]
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .finish_non_exhaustive()
    }
}

/// Assume `role_arn` using whatever credentials `cli` already has
pub fn assume_role(cli: &dyn AwsCli, role_arn: &str) -> Result<Credentials> {
    log::info!("Assuming role {role_arn}");
    let output = cli.call(
        "sts",
        "assume-role",
        &["--role-arn", role_arn, "--role-session-name", SESSION_NAME],
    )?;
    let credentials = output
        .get("Credentials")
        .cloned()
        .context("assume-role returned no credentials")?;
    serde_json::from_value(credentials).context("Malformed assume-role credentials")
}
