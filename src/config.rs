use crate::probe::{ObjectUri, ObjectUriError};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Project {
    Anvil,
    Bdc,
    Crdc,
    Kf,
}

impl Project {
    pub const ALL: [Project; 4] = [Project::Anvil, Project::Bdc, Project::Crdc, Project::Kf];

    pub fn label(self) -> &'static str {
        match self {
            Project::Anvil => "ANVIL",
            Project::Bdc => "BDC",
            Project::Crdc => "CRDC",
            Project::Kf => "KF",
        }
    }
}

impl fmt::Display for Project {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Project {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_uppercase();
        Project::ALL
            .into_iter()
            .find(|project| project.label() == wanted)
            .ok_or_else(|| ConfigError::InvalidConfigurationName {
                kind: NameKind::Project,
                value: value.to_string(),
            })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DeploymentTier {
    Dev,
    Alpha,
    Perf,
    Staging,
    Prod,
}

impl DeploymentTier {
    pub const ALL: [DeploymentTier; 5] = [
        DeploymentTier::Dev,
        DeploymentTier::Alpha,
        DeploymentTier::Perf,
        DeploymentTier::Staging,
        DeploymentTier::Prod,
    ];

    pub fn label(self) -> &'static str {
        match self {
            DeploymentTier::Dev => "DEV",
            DeploymentTier::Alpha => "ALPHA",
            DeploymentTier::Perf => "PERF",
            DeploymentTier::Staging => "STAGING",
            DeploymentTier::Prod => "PROD",
        }
    }
}

impl fmt::Display for DeploymentTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DeploymentTier {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim().to_ascii_uppercase();
        DeploymentTier::ALL
            .into_iter()
            .find(|tier| tier.label() == wanted)
            .ok_or_else(|| ConfigError::InvalidConfigurationName {
                kind: NameKind::Tier,
                value: value.to_string(),
            })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NameKind {
    Project,
    Tier,
}

impl fmt::Display for NameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NameKind::Project => f.write_str("project"),
            NameKind::Tier => f.write_str("deployment tier"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {kind} name: '{value}'")]
    InvalidConfigurationName { kind: NameKind, value: String },
    #[error(
        "response time monitoring for project '{project}' on deployment tier '{tier}' is currently unsupported"
    )]
    UnsupportedConfiguration {
        project: Project,
        tier: DeploymentTier,
    },
    #[error("invalid object URI: {0}")]
    InvalidObjectUri(#[from] ObjectUriError),
}

/// Transport scheme used to build probe URLs. Every deployment is served
/// over HTTPS; plain HTTP only exists for local stand-in servers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UrlScheme {
    Https,
    Http,
}

impl UrlScheme {
    pub fn label(self) -> &'static str {
        match self {
            UrlScheme::Https => "https",
            UrlScheme::Http => "http",
        }
    }
}

/// Hostnames and identifiers for one `(project, tier)` pair.
#[derive(Clone, Debug)]
pub struct ConfigSnapshot {
    pub project: Project,
    pub tier: DeploymentTier,
    pub identity_broker_host: String,
    pub identity_provider_key: String,
    pub resolver_host: String,
    pub object_service_host: String,
    pub default_object_uri: ObjectUri,
    pub default_cloud_scheme: String,
    pub url_scheme: UrlScheme,
}

impl ConfigSnapshot {
    pub fn with_object_uri(&self, uri: &str) -> Result<Self, ConfigError> {
        let mut snapshot = self.clone();
        snapshot.default_object_uri = ObjectUri::parse(uri)?;
        Ok(snapshot)
    }

    pub fn base_url(&self, host: &str) -> String {
        format!("{}://{host}", self.url_scheme.label())
    }
}

struct BrokerEntry {
    broker_host: &'static str,
    provider_key: &'static str,
    resolver_host: &'static str,
}

struct ObjectServiceEntry {
    host: &'static str,
    object_uri: &'static str,
}

const DEFAULT_CLOUD_SCHEME: &str = "gs";

fn broker_entry(project: Project, tier: DeploymentTier) -> Option<BrokerEntry> {
    let provider_key = match project {
        Project::Bdc => "fence",
        Project::Crdc => "dcf-fence",
        Project::Anvil | Project::Kf => return None,
    };
    let (broker_host, resolver_host) = match tier {
        DeploymentTier::Dev => (
            "broad-bond-dev.appspot.com",
            "us-central1-broad-dsde-dev.cloudfunctions.net",
        ),
        DeploymentTier::Alpha => (
            "broad-bond-alpha.appspot.com",
            "us-central1-broad-dsde-alpha.cloudfunctions.net",
        ),
        DeploymentTier::Prod => (
            "broad-bond-prod.appspot.com",
            "us-central1-broad-dsde-prod.cloudfunctions.net",
        ),
        DeploymentTier::Perf | DeploymentTier::Staging => return None,
    };
    Some(BrokerEntry {
        broker_host,
        provider_key,
        resolver_host,
    })
}

fn object_service_entry(project: Project, tier: DeploymentTier) -> Option<ObjectServiceEntry> {
    let prod = tier == DeploymentTier::Prod;
    let entry = match (project, prod) {
        (Project::Bdc, true) => ObjectServiceEntry {
            host: "gen3.biodatacatalyst.nhlbi.nih.gov",
            object_uri: "drs://dg.4503:dg.4503/15fdd543-9875-4edf-8bc2-22985473dab6",
        },
        (Project::Bdc, false) => ObjectServiceEntry {
            host: "staging.gen3.biodatacatalyst.nhlbi.nih.gov",
            object_uri: "drs://dg.712C:dg.712C/fa640b0e-9779-452f-99a6-16d833d15bd0",
        },
        (Project::Crdc, true) => ObjectServiceEntry {
            host: "nci-crdc.datacommons.io",
            object_uri: "drs://dg.4DFC:011a6a54-1bfe-4df9-ae24-990b12a812d3",
        },
        (Project::Crdc, false) => ObjectServiceEntry {
            host: "nci-crdc-staging.datacommons.io",
            object_uri: "drs://dg.4DFC:ddacaa74-97a9-4a0e-aa36-3e65fc8382d5",
        },
        (Project::Anvil | Project::Kf, _) => return None,
    };
    Some(entry)
}

/// Resolves the snapshot for a `(project, tier)` pair.
pub fn resolve(project: Project, tier: DeploymentTier) -> Result<ConfigSnapshot, ConfigError> {
    let unsupported = || ConfigError::UnsupportedConfiguration { project, tier };
    let broker = broker_entry(project, tier).ok_or_else(unsupported)?;
    let objects = object_service_entry(project, tier).ok_or_else(unsupported)?;

    Ok(ConfigSnapshot {
        project,
        tier,
        identity_broker_host: broker.broker_host.to_string(),
        identity_provider_key: broker.provider_key.to_string(),
        resolver_host: broker.resolver_host.to_string(),
        object_service_host: objects.host.to_string(),
        default_object_uri: ObjectUri::parse(objects.object_uri)?,
        default_cloud_scheme: DEFAULT_CLOUD_SCHEME.to_string(),
        url_scheme: UrlScheme::Https,
    })
}

/// Parses both names, then resolves. Name errors win over combination errors.
pub fn resolve_names(project: &str, tier: &str) -> Result<ConfigSnapshot, ConfigError> {
    let project = project.parse::<Project>()?;
    let tier = tier.parse::<DeploymentTier>()?;
    resolve(project, tier)
}

#[derive(Clone, Eq, PartialEq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl fmt::Display for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecretString {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SecretString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
