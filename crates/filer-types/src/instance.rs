use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::digest::ContentDigest;
use crate::error::TypeError;

/// Identifier of a single upload event.
///
/// Generated fresh (UUID v4) for every upload call and never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceId(uuid::Uuid);

impl InstanceId {
    /// Generate a new random instance ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: uuid::Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }

    /// Short representation (first 8 characters of the UUID).
    pub fn short_id(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for InstanceId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceId({})", self.short_id())
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidInstanceId(e.to_string()))
    }
}

/// Presentation metadata recorded for one instance.
///
/// Created once at registration and never mutated.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceMetadata {
    /// Filename as supplied by the uploader.
    pub name: String,
    /// Content type declared by the uploader.
    pub content_type: String,
}

impl InstanceMetadata {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
        }
    }
}

/// Composite handle for one stored instance: `(digest, instance)`.
///
/// The canonical string form is `<hex digest>/<uuid>`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceRef {
    pub digest: ContentDigest,
    pub instance: InstanceId,
}

impl InstanceRef {
    pub fn new(digest: ContentDigest, instance: InstanceId) -> Self {
        Self { digest, instance }
    }

    /// Build from the two path segments used by the HTTP surface.
    pub fn from_parts(digest_hex: &str, instance: &str) -> Result<Self, TypeError> {
        Ok(Self {
            digest: ContentDigest::from_hex(digest_hex)?,
            instance: instance.parse()?,
        })
    }
}

impl fmt::Debug for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InstanceRef({}/{})", self.digest.short_hex(), self.instance.short_id())
    }
}

impl fmt::Display for InstanceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.digest, self.instance)
    }
}

impl FromStr for InstanceRef {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (digest, instance) = s
            .split_once('/')
            .ok_or_else(|| TypeError::MalformedRef(s.to_string()))?;
        Self::from_parts(digest, instance)
    }
}
