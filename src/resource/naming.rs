//! Resource naming contract
//!
//! Every resource of a stack is named from a [`ResourceKey`]. The version token is
//! embedded verbatim in the name, and [`NameDecoder`] recovers it when the inventory
//! is rebuilt from the provider. Plan and inventory both go through this module, so
//! `decode(encode(key)) == key` holds for every kind.
//!
//! Name shapes:
//!
//! | kind                                   | name                                  |
//! |----------------------------------------|---------------------------------------|
//! | images                                 | `{service}-{version}-{boot,data}-img` |
//! | backend services, rules, addresses     | `{service}-{instance}-{version}`      |
//! | templates, groups, autoscalers         | `{service}-{version}`                 |

use super::kind::ResourceKind;
use std::fmt;

/// Fold a release version into a name-safe token: `1.2.0.RC` -> `1-2-0-rc`
pub fn normalize_version(version: &str) -> String {
    version.trim().replace('.', "-").to_lowercase()
}

/// Which disk an image was cut from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskRole {
    Boot,
    Data,
}

impl DiskRole {
    pub fn as_str(self) -> &'static str {
        match self {
            DiskRole::Boot => "boot",
            DiskRole::Data => "data",
        }
    }
}

/// Structured identity of one stack resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceKey {
    pub kind: ResourceKind,
    pub service: String,
    pub version: String,
    pub instance: Option<String>,
    pub disk: Option<DiskRole>,
}

impl ResourceKey {
    /// Template, group or autoscaler key
    pub fn stack(kind: ResourceKind, service: &str, version: &str) -> Self {
        Self {
            kind,
            service: service.to_string(),
            version: version.to_string(),
            instance: None,
            disk: None,
        }
    }

    pub fn image(service: &str, version: &str, disk: DiskRole) -> Self {
        Self {
            kind: ResourceKind::Image,
            service: service.to_string(),
            version: version.to_string(),
            instance: None,
            disk: Some(disk),
        }
    }

    /// Backend service, forwarding rule or address key
    pub fn per_instance(kind: ResourceKind, service: &str, instance: &str, version: &str) -> Self {
        Self {
            kind,
            service: service.to_string(),
            version: version.to_string(),
            instance: Some(instance.to_string()),
            disk: None,
        }
    }

    /// Provider resource name for this key
    pub fn encode(&self) -> String {
        match (self.kind, &self.instance, self.disk) {
            (ResourceKind::Image, _, disk) => format!(
                "{}-{}-{}-img",
                self.service,
                self.version,
                disk.unwrap_or(DiskRole::Boot).as_str()
            ),
            (_, Some(instance), _) => format!("{}-{}-{}", self.service, instance, self.version),
            _ => format!("{}-{}", self.service, self.version),
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

/// A name that contains the service but does not follow the contract
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeError {
    pub kind: ResourceKind,
    pub name: String,
    pub reason: &'static str,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.kind, self.name, self.reason)
    }
}

impl std::error::Error for DecodeError {}

/// Decodes resource names of one service back into keys
#[derive(Debug, Clone)]
pub struct NameDecoder {
    service: String,
    /// Declared instance names, longest first so that `srv1-a` wins over `srv1`
    instances: Vec<String>,
}

impl NameDecoder {
    pub fn new<I, S>(service: &str, instances: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut instances: Vec<String> = instances.into_iter().map(Into::into).collect();
        instances.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));

        Self {
            service: service.to_string(),
            instances,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn decode(&self, kind: ResourceKind, name: &str) -> Result<ResourceKey, DecodeError> {
        let fail = |reason| DecodeError {
            kind,
            name: name.to_string(),
            reason,
        };

        match kind {
            ResourceKind::Image => {
                let rest = self
                    .strip_service(name)
                    .ok_or_else(|| fail("expected {service}-{version}-{boot|data}-img"))?;
                [DiskRole::Boot, DiskRole::Data]
                    .into_iter()
                    .find_map(|disk| {
                        rest.strip_suffix("-img")?
                            .strip_suffix(disk.as_str())?
                            .strip_suffix('-')
                            .filter(|v| is_version_token(v))
                            .map(|version| ResourceKey::image(&self.service, version, disk))
                    })
                    .ok_or_else(|| fail("expected {service}-{version}-{boot|data}-img"))
            }
            k if k.is_per_instance() => {
                let rest = self.strip_service(name).ok_or_else(|| fail("missing service prefix"))?;
                for instance in &self.instances {
                    if let Some(version) = rest
                        .strip_prefix(instance.as_str())
                        .and_then(|r| r.strip_prefix('-'))
                        .filter(|v| is_version_token(v))
                    {
                        return Ok(ResourceKey::per_instance(k, &self.service, instance, version));
                    }
                }
                let (instance, version) = split_instance_token(rest)
                    .ok_or_else(|| fail("expected {service}-{instance}-{version}"))?;
                Ok(ResourceKey::per_instance(k, &self.service, instance, version))
            }
            k => {
                let version = self
                    .strip_service(name)
                    .filter(|v| is_version_token(v))
                    .ok_or_else(|| fail("expected {service}-{version}"))?;
                Ok(ResourceKey::stack(k, &self.service, version))
            }
        }
    }

    fn strip_service<'a>(&self, name: &'a str) -> Option<&'a str> {
        name.strip_prefix(self.service.as_str())?.strip_prefix('-')
    }
}

/// Split `{instance}-{version}` for an instance that is not declared in the
/// metadata. The instance token is word characters ending in a digit (`srv07`).
fn split_instance_token(rest: &str) -> Option<(&str, &str)> {
    let (instance, version) = rest.split_once('-')?;
    let well_formed = instance
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
        && instance.ends_with(|c: char| c.is_ascii_digit());
    (well_formed && is_version_token(version)).then_some((instance, version))
}

/// A normalized release version always starts with a digit. Anything else after
/// the service prefix belongs to another service sharing the prefix (`api-gw-1-0-0`).
fn is_version_token(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
}
