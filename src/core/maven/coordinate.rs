use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{ResolverError, ResolverResult};

/// A package identity inside a Maven repository: `groupId:artifactId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub group_id: String,
    pub artifact_id: String,
}

impl Coordinate {
    pub fn new(group_id: impl Into<String>, artifact_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            artifact_id: artifact_id.into(),
        }
    }

    /// Parse a `groupId:artifactId` package name. Both parts must be non-blank.
    pub fn parse(name: &str) -> ResolverResult<Self> {
        match name.split_once(':') {
            Some((group, artifact))
                if !group.trim().is_empty() && !artifact.trim().is_empty() =>
            {
                Ok(Self::new(group.trim(), artifact.trim()))
            }
            _ => Err(ResolverError::InvalidCoordinate(name.to_string())),
        }
    }

    /// Construct the group path portion (`dev/zio`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// `<repo>/<group_path>/<artifact_id>`
    pub fn base_url(&self, repo_base: &str) -> String {
        format!(
            "{}/{}/{}",
            repo_base.trim_end_matches('/'),
            self.group_path(),
            self.artifact_id
        )
    }

    /// Version index document.
    pub fn metadata_url(&self, repo_base: &str) -> String {
        format!("{}/maven-metadata.xml", self.base_url(repo_base))
    }

    /// Directory listing page, used when the index is missing.
    pub fn listing_url(&self, repo_base: &str) -> String {
        format!("{}/", self.base_url(repo_base))
    }

    /// `<repo>/<group_path>/<artifact_id>/<version>/<artifact_id>-<version>.pom`
    pub fn pom_url(&self, repo_base: &str, version: &str) -> String {
        format!(
            "{}/{}/{}-{}.pom",
            self.base_url(repo_base),
            version,
            self.artifact_id,
            version
        )
    }


    pub fn at(&self, version: impl Into<String>) -> Gav {
        Gav {
            coordinate: self.clone(),
            version: version.into(),
        }
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// A coordinate pinned to one version. Used as the descriptor cache key and
/// as the relocation visited-set entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Gav {
    pub coordinate: Coordinate,
    pub version: String,
}

impl Gav {
    pub fn new(
        group_id: impl Into<String>,
        artifact_id: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Coordinate::new(group_id, artifact_id).at(version)
    }

    pub fn pom_url(&self, repo_base: &str) -> String {
        self.coordinate.pom_url(repo_base, &self.version)
    }
}

impl fmt::Display for Gav {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.coordinate, self.version)
    }
}
