// ─── Version Discovery ───
// maven-metadata.xml first, directory listing as fallback.

use std::cmp::Ordering;
use std::sync::OnceLock;

use quick_xml::de::from_str;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};

use super::coordinate::Coordinate;
use super::interpolate::has_unresolved;
use crate::core::error::{ResolverError, ResolverResult};
use crate::core::http::Transport;

/// Literals that mean "whatever is newest", not a real version.
const LATEST_SENTINELS: [&str; 2] = ["LATEST", "RELEASE"];
const SNAPSHOT_SUFFIX: &str = "-SNAPSHOT";

#[derive(Debug, Deserialize, Default)]
struct MavenMetadata {
    #[serde(default)]
    versioning: Option<Versioning>,
}

#[derive(Debug, Deserialize, Default)]
struct Versioning {
    #[serde(default)]
    versions: Option<VersionList>,
}

#[derive(Debug, Deserialize, Default)]
struct VersionList {
    #[serde(default, rename = "version")]
    items: Vec<String>,
}

/// Snapshot repositories keep `-SNAPSHOT` versions.
pub fn is_snapshot_repository(registry_url: &str) -> bool {
    registry_url.contains("/snapshots") || registry_url.contains("-snapshot")
}

pub fn valid_version(version: &str) -> bool {
    let version = version.trim();
    !version.is_empty() && !has_unresolved(version) && !LATEST_SENTINELS.contains(&version)
}

/// Apply the validity filter, plus the snapshot rule for release repositories.
pub fn filter_versions<I>(raw: I, include_snapshots: bool) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    raw.into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| valid_version(v))
        .filter(|v| include_snapshots || !v.ends_with(SNAPSHOT_SUFFIX))
        .collect()
}

/// `versioning/versions/version` of a maven-metadata.xml document.
pub fn parse_index(xml: &str) -> ResolverResult<Vec<String>> {
    let metadata: MavenMetadata = from_str(xml)?;
    Ok(metadata
        .versioning
        .and_then(|v| v.versions)
        .map(|v| v.items)
        .unwrap_or_default())
}

fn anchor_regex() -> &'static Regex {
    static ANCHOR: OnceLock<Regex> = OnceLock::new();
    ANCHOR.get_or_init(|| {
        Regex::new(r#"(?is)<a\s[^>]*>(.*?)</a>"#).expect("anchor pattern is valid")
    })
}

/// Link texts ending in `/` from an HTML directory listing, minus `../`.
pub fn parse_listing(html: &str) -> Vec<String> {
    anchor_regex()
        .captures_iter(html)
        .filter_map(|cap| cap.get(1))
        .map(|m| m.as_str().trim())
        .filter(|text| text.ends_with('/') && *text != "../")
        .map(|text| text.trim_end_matches('/').to_string())
        .filter(|text| !text.is_empty() && !text.contains('/'))
        .collect()
}

/// Ordered, filtered version list for `coordinate`. Never fails: an empty
/// list means "not found".
pub async fn discover_versions(
    transport: &dyn Transport,
    registry_url: &str,
    coordinate: &Coordinate,
) -> Vec<String> {
    let include_snapshots = is_snapshot_repository(registry_url);

    match fetch_index(transport, registry_url, coordinate).await {
        Ok(raw) => {
            let versions = filter_versions(raw, include_snapshots);
            if !versions.is_empty() {
                return versions;
            }
            debug!("{} index lists no usable versions", coordinate);
        }
        Err(e) => debug!("{} index unavailable: {}", coordinate, e),
    }

    match fetch_listing(transport, registry_url, coordinate).await {
        Ok(raw) => filter_versions(raw, include_snapshots),
        Err(e) => {
            warn!("{} directory listing unavailable: {}", coordinate, e);
            vec![]
        }
    }
}

async fn fetch_index(
    transport: &dyn Transport,
    registry_url: &str,
    coordinate: &Coordinate,
) -> ResolverResult<Vec<String>> {
    let url = coordinate.metadata_url(registry_url);
    let response = transport.get(&url).await?;
    if !response.is_success() {
        return Err(ResolverError::UnexpectedStatus {
            url,
            status: response.status,
        });
    }
    parse_index(&response.text())
}

async fn fetch_listing(
    transport: &dyn Transport,
    registry_url: &str,
    coordinate: &Coordinate,
) -> ResolverResult<Vec<String>> {
    let url = coordinate.listing_url(registry_url);
    let response = transport.get(&url).await?;
    if !response.is_success() {
        return Err(ResolverError::UnexpectedStatus {
            url,
            status: response.status,
        });
    }
    Ok(parse_listing(&response.text()))
}

#[derive(Debug, PartialEq, Eq)]
enum Segment<'a> {
    Number(u64),
    Text(&'a str),
}

fn segments(version: &str) -> Vec<Segment<'_>> {
    let mut out = Vec::new();
    for part in version.split(['.', '-', '_']).filter(|p| !p.is_empty()) {
        let mut start = 0;
        let bytes = part.as_bytes();
        for i in 1..=bytes.len() {
            let boundary = i == bytes.len()
                || bytes[i].is_ascii_digit() != bytes[i - 1].is_ascii_digit();
            if boundary {
                let piece = &part[start..i];
                out.push(match piece.parse::<u64>() {
                    Ok(n) => Segment::Number(n),
                    Err(_) => Segment::Text(piece),
                });
                start = i;
            }
        }
    }
    out
}

/// Numeric-aware version ordering: `2.10.0 > 2.9.9`, `1.0 > 1.0-RC1`,
/// `1.0.1 > 1.0`.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let left = segments(a);
    let right = segments(b);

    for i in 0..left.len().max(right.len()) {
        let ordering = match (left.get(i), right.get(i)) {
            (Some(Segment::Number(x)), Some(Segment::Number(y))) => x.cmp(y),
            (Some(Segment::Text(x)), Some(Segment::Text(y))) => {
                x.to_ascii_lowercase().cmp(&y.to_ascii_lowercase())
            }
            (Some(Segment::Number(_)), Some(Segment::Text(_))) => Ordering::Greater,
            (Some(Segment::Text(_)), Some(Segment::Number(_))) => Ordering::Less,
            // A trailing qualifier makes a version older, a trailing number newer.
            (Some(Segment::Number(_)), None) => Ordering::Greater,
            (Some(Segment::Text(_)), None) => Ordering::Less,
            (None, Some(Segment::Number(_))) => Ordering::Less,
            (None, Some(Segment::Text(_))) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
