use std::collections::BTreeMap;

use quick_xml::de::from_str;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::Deserialize;

use super::coordinate::Gav;
use crate::core::error::{ResolverError, ResolverResult};

/// POM model with the fields the resolution engine reads.
///
/// Structured sections come from quick-xml's serde deserializer. Comments and
/// `<properties>` have no fixed shape, so they are collected by a second
/// event pass over the same text.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PomDocument {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub packaging: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub scm: Option<PomScm>,
    #[serde(default)]
    pub licenses: Option<PomLicenses>,
    #[serde(default)]
    pub parent: Option<PomParent>,
    #[serde(default)]
    pub dependencies: Option<PomDependencies>,
    #[serde(default)]
    pub dependency_management: Option<PomDependencyManagement>,
    #[serde(default)]
    pub repositories: Option<PomRepositories>,
    #[serde(default)]
    pub distribution_management: Option<PomDistributionManagement>,

    /// `<project><properties>`, keyed by element name.
    #[serde(skip)]
    pub properties: BTreeMap<String, String>,
    /// Text of every XML comment in the document.
    #[serde(skip)]
    pub comments: Vec<String>,
    /// Transport `Last-Modified` header; not part of the document.
    #[serde(skip)]
    pub published_at: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PomScm {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PomLicenses {
    #[serde(default, rename = "license")]
    pub items: Vec<PomLicense>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PomLicense {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PomParent {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PomDependencies {
    #[serde(default, rename = "dependency")]
    pub items: Vec<PomDependency>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PomDependencyManagement {
    #[serde(default)]
    pub dependencies: Option<PomDependencies>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PomDependency {
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub artifact_id: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default)]
    pub optional: Option<String>,
    #[serde(rename = "type", default)]
    pub dep_type: Option<String>,
    #[serde(default)]
    pub classifier: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PomRepositories {
    #[serde(default, rename = "repository")]
    pub items: Vec<PomRepository>,
}

#[derive(Debug, Deserialize, Default, Clone)]
pub struct PomRepository {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PomDistributionManagement {
    #[serde(default)]
    pub repository: Option<PomRepository>,
    #[serde(default)]
    pub snapshot_repository: Option<PomRepository>,
    #[serde(default)]
    pub relocation: Option<PomRelocation>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PomRelocation {
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(default)]
    pub artifact_id: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

impl PomDocument {
    /// Parse a POM XML string into a `PomDocument`.
    ///
    /// Anything whose root element is not `<project>` is rejected, which keeps
    /// HTML error pages served with a 200 status from passing as a POM.
    pub fn parse(xml: &str) -> ResolverResult<Self> {
        let mut doc: PomDocument =
            from_str(xml).map_err(|e| ResolverError::PomParse(e.to_string()))?;
        let scan = scan_untyped(xml)?;
        doc.properties = scan.properties;
        doc.comments = scan.comments;
        Ok(doc)
    }

    /// Parent coordinate, only when group, artifact and version are all set.
    pub fn parent_gav(&self) -> Option<Gav> {
        let parent = self.parent.as_ref()?;
        let group = non_blank(parent.group_id.as_deref())?;
        let artifact = non_blank(parent.artifact_id.as_deref())?;
        let version = non_blank(parent.version.as_deref())?;
        Some(Gav::new(group, artifact, version))
    }

    /// Where this POM says it has moved to. Missing parts default to `current`.
    pub fn relocation_target(&self, current: &Gav) -> Gav {
        let Some(relocation) = self
            .distribution_management
            .as_ref()
            .and_then(|d| d.relocation.as_ref())
        else {
            return current.clone();
        };

        Gav::new(
            non_blank(relocation.group_id.as_deref())
                .unwrap_or(current.coordinate.group_id.as_str()),
            non_blank(relocation.artifact_id.as_deref())
                .unwrap_or(current.coordinate.artifact_id.as_str()),
            non_blank(relocation.version.as_deref()).unwrap_or(current.version.as_str()),
        )
    }

    pub fn scm_url(&self) -> Option<&str> {
        self.scm.as_ref().and_then(|s| s.url.as_deref())
    }

    pub fn license_names(&self) -> Vec<&str> {
        self.license_items()
            .filter_map(|l| non_blank(l.name.as_deref()))
            .collect()
    }

    pub fn license_urls(&self) -> Vec<&str> {
        self.license_items()
            .filter_map(|l| non_blank(l.url.as_deref()))
            .collect()
    }

    fn license_items(&self) -> impl Iterator<Item = &PomLicense> {
        self.licenses.iter().flat_map(|l| l.items.iter())
    }

    /// `<repositories><repository><url>` entries that look like HTTP URLs.
    pub fn repository_urls(&self) -> Vec<String> {
        http_urls(
            self.repositories
                .iter()
                .flat_map(|r| r.items.iter())
                .filter_map(|r| r.url.as_deref()),
        )
    }

    /// Release and snapshot deployment targets from `<distributionManagement>`.
    pub fn distribution_repository_urls(&self) -> Vec<String> {
        let Some(dm) = &self.distribution_management else {
            return vec![];
        };
        http_urls(
            [dm.repository.as_ref(), dm.snapshot_repository.as_ref()]
                .into_iter()
                .flatten()
                .filter_map(|r| r.url.as_deref()),
        )
    }

    pub fn declared_dependencies(&self) -> &[PomDependency] {
        self.dependencies
            .as_ref()
            .map(|d| d.items.as_slice())
            .unwrap_or_default()
    }

    /// Resolve a dependency version using `dependencyManagement` if explicit version is absent.
    pub fn resolve_version(&self, dep: &PomDependency) -> Option<String> {
        if let Some(version) = non_blank(dep.version.as_deref()) {
            return Some(version.to_string());
        }

        // Search dependencyManagement
        let managed = self
            .dependency_management
            .as_ref()
            .and_then(|dm| dm.dependencies.as_ref())?;
        managed
            .items
            .iter()
            .find(|m| m.group_id == dep.group_id && m.artifact_id == dep.artifact_id)
            .and_then(|m| non_blank(m.version.as_deref()).map(str::to_string))
    }

    /// Effective group id: own, else inherited from the parent declaration.
    pub fn effective_group_id(&self) -> Option<&str> {
        non_blank(self.group_id.as_deref()).or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| non_blank(p.group_id.as_deref()))
        })
    }

    /// Effective version: own, else inherited from the parent declaration.
    pub fn effective_version(&self) -> Option<&str> {
        non_blank(self.version.as_deref()).or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| non_blank(p.version.as_deref()))
        })
    }
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn http_urls<'a>(urls: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for url in urls.map(str::trim) {
        if url.starts_with("http") && !out.iter().any(|u| u == url) {
            out.push(url.to_string());
        }
    }
    out
}

#[derive(Default)]
struct UntypedScan {
    properties: BTreeMap<String, String>,
    comments: Vec<String>,
}

/// Walk the raw events once for the parts serde can't model.
fn scan_untyped(xml: &str) -> ResolverResult<UntypedScan> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut scan = UntypedScan::default();
    let mut path: Vec<String> = Vec::new();
    let mut saw_root = false;

    loop {
        let event = reader
            .read_event()
            .map_err(|e| ResolverError::PomParse(e.to_string()))?;
        match event {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                }
                path.push(name);
                if in_properties(&path) {
                    scan.properties.entry(path[2].clone()).or_default();
                }
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                }
                if path.len() == 2 && path[0] == "project" && path[1] == "properties" {
                    scan.properties.entry(name).or_default();
                }
            }
            Event::End(_) => {
                path.pop();
            }
            Event::Text(t) => {
                if in_properties(&path) {
                    let text = t
                        .unescape()
                        .map_err(|e| ResolverError::PomParse(e.to_string()))?;
                    push_property_text(&mut scan, &path, &text);
                }
            }
            Event::CData(c) => {
                if in_properties(&path) {
                    let text = String::from_utf8_lossy(&c).into_owned();
                    push_property_text(&mut scan, &path, &text);
                }
            }
            Event::Comment(c) => {
                scan.comments.push(String::from_utf8_lossy(&c).trim().to_string());
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_root {
        return Err(ResolverError::PomParse("document has no root element".into()));
    }
    Ok(scan)
}

fn check_root(name: &str) -> ResolverResult<()> {
    if name == "project" {
        Ok(())
    } else {
        Err(ResolverError::PomParse(format!(
            "expected <project> root, found <{name}>"
        )))
    }
}

fn in_properties(path: &[String]) -> bool {
    path.len() == 3 && path[0] == "project" && path[1] == "properties"
}

fn push_property_text(scan: &mut UntypedScan, path: &[String], text: &str) {
    scan.properties
        .entry(path[2].clone())
        .or_default()
        .push_str(text);
}
