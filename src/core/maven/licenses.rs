// ─── License Extraction ───
// Three tiers, first non-empty wins: declared names, comment phrases, declared URLs.

use super::pom::PomDocument;

/// Phrases/URLs found in POM comments, in match order.
const COMMENT_LICENSES: &[(&str, &str)] = &[
    ("http://www.apache.org/licenses/LICENSE-2.0", "Apache-2.0"),
    (
        "http://www.eclipse.org/legal/epl-v10",
        "Eclipse Public License (EPL), Version 1.0",
    ),
    (
        "http://www.eclipse.org/legal/epl-2.0",
        "Eclipse Public License (EPL), Version 2.0",
    ),
    (
        "http://www.eclipse.org/org/documents/edl-v10",
        "Eclipse Distribution License (EDL), Version 1.0",
    ),
    ("Apache License", "Apache-2.0"),
    ("MIT License", "MIT"),
    ("GPL", "GPL"),
    ("BSD", "BSD"),
];

/// Exact `<license><url>` values.
const URL_LICENSES: &[(&str, &str)] = &[
    ("http://www.apache.org/licenses/LICENSE-2.0", "Apache-2.0"),
    ("https://www.apache.org/licenses/LICENSE-2.0", "Apache-2.0"),
    ("http://opensource.org/licenses/MIT", "MIT"),
    ("https://opensource.org/licenses/MIT", "MIT"),
    (
        "http://www.eclipse.org/legal/epl-v10.html",
        "Eclipse Public License (EPL), Version 1.0",
    ),
    (
        "http://www.eclipse.org/legal/epl-v20.html",
        "Eclipse Public License (EPL), Version 2.0",
    ),
];

/// Licenses of one POM level, deduplicated, from the first tier that has any.
pub fn licenses(pom: &PomDocument) -> Vec<String> {
    let declared = dedup(pom.license_names().into_iter().map(str::to_string));
    if !declared.is_empty() {
        return declared;
    }

    let from_comments = licenses_from_comments(pom);
    if !from_comments.is_empty() {
        return from_comments;
    }

    licenses_from_urls(pom)
}

/// Comma-joined form stored on package and version records.
pub fn license_string(pom: &PomDocument) -> String {
    licenses(pom).join(",")
}

fn licenses_from_comments(pom: &PomDocument) -> Vec<String> {
    dedup(
        COMMENT_LICENSES
            .iter()
            .filter(|(needle, _)| pom.comments.iter().any(|c| c.contains(needle)))
            .map(|(_, id)| id.to_string()),
    )
}

fn licenses_from_urls(pom: &PomDocument) -> Vec<String> {
    dedup(pom.license_urls().into_iter().filter_map(|url| {
        URL_LICENSES
            .iter()
            .find(|(known, _)| *known == url)
            .map(|(_, id)| id.to_string())
    }))
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
