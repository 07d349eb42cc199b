// ─── Resolved Metadata ───
// Output records: merged parent-chain projection, package and version views.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::pom::PomDocument;

/// Fields merged across the parent chain. The nearest level with a non-blank
/// value wins; properties are overlaid parent-first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub repository_url: String,
    pub licenses: String,
    pub properties: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub repositories: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub distribution_repositories: Vec<String>,
}

impl ResolvedMetadata {
    /// `self` is the child level; anything blank falls through to `parent`.
    pub fn over(self, parent: ResolvedMetadata) -> ResolvedMetadata {
        ResolvedMetadata {
            description: self.description.or(parent.description),
            homepage: self.homepage.or(parent.homepage),
            repository_url: or_blank(self.repository_url, parent.repository_url),
            licenses: or_blank(self.licenses, parent.licenses),
            properties: self.properties,
            repositories: or_empty(self.repositories, parent.repositories),
            distribution_repositories: or_empty(
                self.distribution_repositories,
                parent.distribution_repositories,
            ),
        }
    }
}

fn or_blank(child: String, parent: String) -> String {
    if child.trim().is_empty() {
        parent
    } else {
        child
    }
}

fn or_empty(child: Vec<String>, parent: Vec<String>) -> Vec<String> {
    if child.is_empty() {
        parent
    } else {
        child
    }
}

/// Package-level view: resolved fields of the newest available POM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageMetadata {
    pub name: String,
    pub namespace: String,
    pub versions: Vec<String>,
    #[serde(flatten)]
    pub resolved: ResolvedMetadata,
}

/// Per-version record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionMetadata {
    pub number: String,
    pub published_at: Option<DateTime<Utc>>,
    pub licenses: String,
    pub metadata: VersionDetails,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct VersionDetails {
    pub properties: BTreeMap<String, String>,
    pub java_version: Option<String>,
    pub maven_compiler_source: Option<String>,
    pub maven_compiler_target: Option<String>,
    pub maven_compiler_release: Option<String>,
    pub repositories: Vec<String>,
    pub distribution_repositories: Vec<String>,
}

impl VersionDetails {
    pub fn from_pom(pom: &PomDocument) -> Self {
        let properties = pom.properties.clone();
        let get = |key: &str| properties.get(key).cloned();
        Self {
            java_version: java_version(&properties),
            maven_compiler_source: get("maven.compiler.source"),
            maven_compiler_target: get("maven.compiler.target"),
            maven_compiler_release: get("maven.compiler.release"),
            repositories: pom.repository_urls(),
            distribution_repositories: pom.distribution_repository_urls(),
            properties,
        }
    }
}

/// `Last-Modified` is an RFC 2822 date (`Tue, 12 Jul 2022 12:10:25 GMT`).
pub fn parse_published_at(value: Option<&str>) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value?.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Target Java release declared by a POM's own properties.
pub fn java_version(properties: &BTreeMap<String, String>) -> Option<String> {
    let present = |key: &str| {
        properties
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = present("java.version").or_else(|| present("javaVersion")) {
        return Some(v.to_string());
    }

    if let Some(release) = present("maven.compiler.release") {
        if release == "${java.version}" {
            return present("java.version").map(str::to_string);
        }
        return Some(release.to_string());
    }

    present("maven.compiler.target").map(str::to_string)
}
