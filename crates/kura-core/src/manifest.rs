//! Extension manifest and source descriptors.
//!
//! The [`Manifest`] is produced by the external build pipeline next to the
//! compiled module. [`SourceInfo`] values are reported by the module itself
//! through its `getManifest` export once it has been loaded.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::EnvelopeResult;

/// Static metadata for a built extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Display name of the extension.
    pub name: String,
    /// Package identifier, unique per extension.
    pub pkg: String,
    /// Extension version string.
    pub version: String,
    /// Whether the extension serves adult content.
    #[serde(default)]
    pub nsfw: bool,
    /// Contributors, when the build pipeline recorded them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<Author>>,
}

impl Manifest {
    /// Parse a manifest from its JSON representation.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is invalid or required fields are missing.
    pub fn from_json(text: &str) -> EnvelopeResult<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// A contributor listed in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    /// Contributor name.
    #[serde(default)]
    pub name: Option<String>,
    /// GitHub handle.
    #[serde(default)]
    pub github: Option<String>,
    /// Number of commits attributed to this author.
    #[serde(default)]
    pub commits: u32,
    /// Hash or date of the author's first commit.
    #[serde(default)]
    pub first_commit: String,
}

/// Identifier of a content source.
///
/// Sources commonly use 64-bit numeric ids, which do not survive a round trip
/// through a JavaScript number. Ids are therefore carried as strings, and
/// numeric JSON ids are accepted and stringified on input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SourceId(String);

impl SourceId {
    /// Create a source id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for SourceId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => Self(s),
            RawId::Signed(n) => Self(n.to_string()),
            RawId::Unsigned(n) => Self(n.to_string()),
        })
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One logical content source inside an extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    /// Source identifier.
    pub id: SourceId,
    /// Display name.
    pub name: String,
    /// Language tag (e.g. `en`, `ja`, `all`).
    pub lang: String,
    /// Base URL of the site behind the source.
    #[serde(default)]
    pub base_url: String,
    /// Whether the source exposes a "latest updates" listing.
    #[serde(default)]
    pub supports_latest: bool,
}
