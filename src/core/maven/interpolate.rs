// ─── Property Interpolation ───
// `${name}` substitution against inherited + own POM properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::pom::{non_blank, PomDocument};

/// Nested references (`a=${b}`, `b=${c}`) are expanded at most this many times.
const MAX_PASSES: usize = 8;

/// What to do with a value that still holds `${...}` after substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum InterpolationPolicy {
    /// Unresolved reference invalidates the value.
    Strict,
    /// Unresolved reference is kept verbatim.
    #[default]
    BestEffort,
}

pub fn has_unresolved(value: &str) -> bool {
    value.contains("${")
}

/// Parent map as the base, `own` overriding on key collision.
pub fn merge_properties(
    inherited: &BTreeMap<String, String>,
    own: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = inherited.clone();
    merged.extend(own.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Resolves references for one POM level.
pub struct Interpolator<'a> {
    properties: &'a BTreeMap<String, String>,
    project: BTreeMap<&'static str, String>,
}

impl<'a> Interpolator<'a> {
    pub fn new(properties: &'a BTreeMap<String, String>) -> Self {
        Self {
            properties,
            project: BTreeMap::new(),
        }
    }

    /// Also answer `project.*` / `pom.*` built-ins from `pom`.
    pub fn for_pom(properties: &'a BTreeMap<String, String>, pom: &PomDocument) -> Self {
        let mut interpolator = Self::new(properties);
        if let Some(group) = pom.effective_group_id() {
            interpolator.set_builtin(&["project.groupId", "pom.groupId", "groupId"], group);
        }
        if let Some(artifact) = non_blank(pom.artifact_id.as_deref()) {
            interpolator.set_builtin(
                &["project.artifactId", "pom.artifactId", "artifactId"],
                artifact,
            );
        }
        if let Some(version) = pom.effective_version() {
            interpolator.set_builtin(&["project.version", "pom.version", "version"], version);
        }
        if let Some(parent) = pom.parent_gav() {
            interpolator.set_builtin(&["project.parent.version"], &parent.version);
            interpolator.set_builtin(&["project.parent.groupId"], &parent.coordinate.group_id);
        }
        interpolator
    }

    fn set_builtin(&mut self, names: &[&'static str], value: &str) {
        for name in names {
            self.project.insert(name, value.to_string());
        }
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.project
            .get(name)
            .or_else(|| self.properties.get(name))
            .map(String::as_str)
    }

    /// Substitute every known reference. `None` only under
    /// [`InterpolationPolicy::Strict`] when something stays unresolved.
    pub fn interpolate(&self, value: &str, policy: InterpolationPolicy) -> Option<String> {
        let mut current = value.to_string();
        for _ in 0..MAX_PASSES {
            let next = self.substitute_once(&current);
            if next == current {
                break;
            }
            current = next;
        }

        if policy == InterpolationPolicy::Strict && has_unresolved(&current) {
            return None;
        }
        Some(current)
    }

    /// Optional-field convenience: blank in, `None` out.
    pub fn field(&self, value: Option<&str>, policy: InterpolationPolicy) -> Option<String> {
        let value = non_blank(value)?;
        self.interpolate(value, policy)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn substitute_once(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len());
        let mut rest = value;

        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];
            let Some(end) = after.find('}') else {
                out.push_str(&rest[start..]);
                return out;
            };
            let name = &after[..end];
            match self.lookup(name.trim()) {
                Some(replacement) => out.push_str(replacement),
                None => {
                    out.push_str("${");
                    out.push_str(name);
                    out.push('}');
                }
            }
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        out
    }
}
