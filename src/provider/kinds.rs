//! Supported resource kinds
//!
//! Each kind knows its type tag, its dependency priority and how to turn
//! `aws` JSON output into canonical resources. The set is closed: adding a
//! kind means adding a variant here, not registering one at runtime.

use super::AwsCli;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde_json::Value;
use sweepkit::marker::{FIRST_SEEN_TAG, marker_value};
use sweepkit::{Attributes, Resource, Tags};

/// A resource as listed, plus the ARN when later calls need it
#[derive(Debug, Clone)]
pub struct Listed {
    pub resource: Resource,
    pub arn: Option<String>,
}

impl Listed {
    fn new(resource: Resource) -> Self {
        Self {
            resource,
            arn: None,
        }
    }

    fn with_arn(mut self, arn: Option<&str>) -> Self {
        self.arn = arn.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AwsKind {
    Instance,
    Subnet,
    SecurityGroup,
    Vpc,
    S3Bucket,
    EbsVolume,
    DynamoDbTable,
    KinesisStream,
    MediaLiveInput,
}

impl AwsKind {
    pub const ALL: [Self; 9] = [
        Self::Instance,
        Self::Subnet,
        Self::SecurityGroup,
        Self::Vpc,
        Self::S3Bucket,
        Self::EbsVolume,
        Self::DynamoDbTable,
        Self::KinesisStream,
        Self::MediaLiveInput,
    ];

    pub fn resource_type(self) -> &'static str {
        match self {
            Self::Instance => "aws_instance",
            Self::Subnet => "aws_subnet",
            Self::SecurityGroup => "aws_security_group",
            Self::Vpc => "aws_vpc",
            Self::S3Bucket => "aws_s3_bucket",
            Self::EbsVolume => "aws_ebs_volume",
            Self::DynamoDbTable => "aws_dynamodb_table",
            Self::KinesisStream => "aws_kinesis_stream",
            Self::MediaLiveInput => "aws_medialive_input",
        }
    }

    /// Deletion priority; dependents sit above what they depend on
    pub fn priority(self) -> i64 {
        match self {
            Self::Instance => 9980,
            Self::Subnet => 9870,
            Self::SecurityGroup => 9850,
            Self::Vpc => 9830,
            Self::S3Bucket => 9750,
            Self::EbsVolume => 9730,
            Self::DynamoDbTable => 9710,
            Self::KinesisStream => 9700,
            Self::MediaLiveInput => 9650,
        }
    }

    pub fn from_type(resource_type: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|k| k.resource_type() == resource_type)
    }

    /// MediaLive inputs carry no creation date
    pub fn uses_first_seen_marker(self) -> bool {
        matches!(self, Self::MediaLiveInput)
    }

    pub fn list(self, cli: &dyn AwsCli) -> Result<Vec<Listed>> {
        match self {
            Self::Instance => list_instances(cli),
            Self::Subnet => list_ec2(cli, self, "describe-subnets", "Subnets", "SubnetId", None),
            Self::SecurityGroup => list_security_groups(cli),
            Self::Vpc => list_ec2(cli, self, "describe-vpcs", "Vpcs", "VpcId", None),
            Self::EbsVolume => list_ec2(
                cli,
                self,
                "describe-volumes",
                "Volumes",
                "VolumeId",
                Some("CreateTime"),
            ),
            Self::S3Bucket => list_buckets(cli),
            Self::DynamoDbTable => list_names(cli, self, "dynamodb", "list-tables", "TableNames"),
            Self::KinesisStream => {
                list_names(cli, self, "kinesis", "list-streams", "StreamNames")
            }
            Self::MediaLiveInput => list_medialive_inputs(cli),
        }
    }

    /// Fetch tags and creation date for kinds whose listing lacks them
    pub fn load(self, cli: &dyn AwsCli, resource: &Resource) -> Result<Attributes> {
        match self {
            Self::S3Bucket => load_bucket(cli, &resource.id),
            Self::DynamoDbTable => load_table(cli, &resource.id),
            Self::KinesisStream => load_stream(cli, &resource.id),
            _ => Ok(Attributes::default()),
        }
    }

    pub fn delete(self, cli: &dyn AwsCli, resource: &Resource) -> Result<()> {
        let id = resource.id.as_str();
        let output = match self {
            Self::Instance => cli.call("ec2", "terminate-instances", &["--instance-ids", id]),
            Self::Subnet => cli.call("ec2", "delete-subnet", &["--subnet-id", id]),
            Self::SecurityGroup => cli.call("ec2", "delete-security-group", &["--group-id", id]),
            Self::Vpc => cli.call("ec2", "delete-vpc", &["--vpc-id", id]),
            Self::EbsVolume => cli.call("ec2", "delete-volume", &["--volume-id", id]),
            Self::S3Bucket => {
                let uri = format!("s3://{id}");
                cli.call("s3", "rb", &[uri.as_str(), "--force"])
            }
            Self::DynamoDbTable => cli.call("dynamodb", "delete-table", &["--table-name", id]),
            Self::KinesisStream => cli.call(
                "kinesis",
                "delete-stream",
                &["--stream-name", id, "--enforce-consumer-deletion"],
            ),
            Self::MediaLiveInput => cli.call("medialive", "delete-input", &["--input-id", id]),
        };
        output.map(drop)
    }

    /// Tag a resource with the time it was first seen
    pub fn mark_first_seen(self, cli: &dyn AwsCli, arn: &str, now: DateTime<Utc>) -> Result<()> {
        if !self.uses_first_seen_marker() {
            anyhow::bail!("{} does not use the first-seen marker", self.resource_type());
        }
        let tags = serde_json::json!({ FIRST_SEEN_TAG: marker_value(now) }).to_string();
        cli.call(
            "medialive",
            "create-tags",
            &["--resource-arn", arn, "--tags", tags.as_str()],
        )
        .map(drop)
    }
}

// ============================================================================
// Listing
// ============================================================================

fn list_instances(cli: &dyn AwsCli) -> Result<Vec<Listed>> {
    let output = cli.call("ec2", "describe-instances", &[])?;
    let mut listed = Vec::new();
    for reservation in items(&output, "Reservations") {
        for instance in items(reservation, "Instances") {
            let state = instance.pointer("/State/Name").and_then(Value::as_str);
            if state == Some("terminated") {
                continue;
            }
            let resource = ec2_resource(
                AwsKind::Instance,
                instance,
                "InstanceId",
                Some("LaunchTime"),
            );
            listed.push(Listed::new(resource));
        }
    }
    Ok(listed)
}

fn list_security_groups(cli: &dyn AwsCli) -> Result<Vec<Listed>> {
    let output = cli.call("ec2", "describe-security-groups", &[])?;
    Ok(items(&output, "SecurityGroups")
        // the default group of a VPC cannot be deleted
        .filter(|group| str_field(group, "GroupName") != Some("default"))
        .map(|group| {
            let mut resource = ec2_resource(AwsKind::SecurityGroup, group, "GroupId", None);
            if resource.name.is_none() {
                resource.name = str_field(group, "GroupName").map(str::to_string);
            }
            Listed::new(resource)
        })
        .collect())
}

fn list_ec2(
    cli: &dyn AwsCli,
    kind: AwsKind,
    operation: &str,
    collection: &str,
    id_key: &str,
    created_key: Option<&str>,
) -> Result<Vec<Listed>> {
    let output = cli.call("ec2", operation, &[])?;
    Ok(items(&output, collection)
        .map(|item| Listed::new(ec2_resource(kind, item, id_key, created_key)))
        .collect())
}

/// EC2 describe calls return tags and timestamps inline
fn ec2_resource(kind: AwsKind, item: &Value, id_key: &str, created_key: Option<&str>) -> Resource {
    let tags = tag_list(item.get("Tags"));
    let mut resource =
        Resource::new(kind.resource_type(), str_field(item, id_key).unwrap_or_default());
    if let Some(name) = tags.get("Name") {
        resource = resource.with_name(name.clone());
    }
    if let Some(created) = created_key.and_then(|key| timestamp(item.get(key))) {
        resource = resource.with_created(created);
    }
    resource.with_tags(tags).loaded()
}

fn list_buckets(cli: &dyn AwsCli) -> Result<Vec<Listed>> {
    let output = cli.call("s3api", "list-buckets", &[])?;
    Ok(items(&output, "Buckets")
        .map(|bucket| {
            let mut resource = Resource::new(
                AwsKind::S3Bucket.resource_type(),
                str_field(bucket, "Name").unwrap_or_default(),
            );
            if let Some(created) = timestamp(bucket.get("CreationDate")) {
                resource = resource.with_created(created);
            }
            // tags need one call per bucket
            Listed::new(resource)
        })
        .collect())
}

/// Services whose listing returns bare names; everything else is lazy
fn list_names(
    cli: &dyn AwsCli,
    kind: AwsKind,
    service: &str,
    operation: &str,
    collection: &str,
) -> Result<Vec<Listed>> {
    let output = cli.call(service, operation, &[])?;
    Ok(items(&output, collection)
        .filter_map(Value::as_str)
        .map(|name| Listed::new(Resource::new(kind.resource_type(), name)))
        .collect())
}

fn list_medialive_inputs(cli: &dyn AwsCli) -> Result<Vec<Listed>> {
    let output = cli.call("medialive", "list-inputs", &[])?;
    Ok(items(&output, "Inputs")
        .map(|input| {
            let mut resource = Resource::new(
                AwsKind::MediaLiveInput.resource_type(),
                str_field(input, "Id").unwrap_or_default(),
            )
            .with_tags(tag_map(input.get("Tags")));
            if let Some(name) = str_field(input, "Name") {
                resource = resource.with_name(name);
            }
            Listed::new(resource.loaded()).with_arn(str_field(input, "Arn"))
        })
        .collect())
}

// ============================================================================
// Lazy loading
// ============================================================================

fn load_bucket(cli: &dyn AwsCli, bucket: &str) -> Result<Attributes> {
    let tags = match cli.call("s3api", "get-bucket-tagging", &["--bucket", bucket]) {
        Ok(output) => tag_list(output.get("TagSet")),
        // untagged buckets answer with an error
        Err(e) if format!("{e:#}").contains("NoSuchTagSet") => Tags::new(),
        Err(e) => return Err(e),
    };
    Ok(Attributes {
        tags,
        created: None,
    })
}

fn load_table(cli: &dyn AwsCli, table: &str) -> Result<Attributes> {
    let output = cli.call("dynamodb", "describe-table", &["--table-name", table])?;
    let description = output
        .get("Table")
        .with_context(|| format!("describe-table returned no table for {table}"))?;

    let created = timestamp(description.get("CreationDateTime"));
    let tags = match str_field(description, "TableArn") {
        Some(arn) => {
            let output = cli.call("dynamodb", "list-tags-of-resource", &["--resource-arn", arn])?;
            tag_list(output.get("Tags"))
        }
        None => Tags::new(),
    };
    Ok(Attributes { tags, created })
}

fn load_stream(cli: &dyn AwsCli, stream: &str) -> Result<Attributes> {
    let summary = cli.call(
        "kinesis",
        "describe-stream-summary",
        &["--stream-name", stream],
    )?;
    let created = timestamp(summary.pointer("/StreamDescriptionSummary/StreamCreationTimestamp"));

    let output = cli.call("kinesis", "list-tags-for-stream", &["--stream-name", stream])?;
    Ok(Attributes {
        tags: tag_list(output.get("Tags")),
        created,
    })
}

// ============================================================================
// JSON helpers
// ============================================================================

fn items<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value
        .get(key)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// `[{"Key": k, "Value": v}]` as used by most services
fn tag_list(value: Option<&Value>) -> Tags {
    value
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|tag| {
            let key = str_field(tag, "Key")?;
            let value = str_field(tag, "Value").unwrap_or_default();
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

/// `{k: v}` as used by MediaLive
fn tag_map(value: Option<&Value>) -> Tags {
    value
        .and_then(Value::as_object)
        .into_iter()
        .flatten()
        .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
        .collect()
}

/// RFC 3339 string, or epoch seconds when `cli_timestamp_format` is `none`
fn timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|ts| ts.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => {
            let secs = n.as_f64()?;
            DateTime::from_timestamp_millis((secs * 1000.0) as i64)
        }
        _ => None,
    }
}
