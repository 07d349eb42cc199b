use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::interpolate::{merge_properties, InterpolationPolicy, Interpolator};
use super::pom::{non_blank, PomDocument};

/// Requirement recorded when neither the dependency nor dependencyManagement pins one.
pub const ANY_VERSION: &str = "*";

/// One declared dependency: `group:artifact`, its version requirement and scope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub requirement: String,
    pub scope: Option<String>,
}

/// Dependencies declared in `pom`, with versions interpolated against
/// `inherited` properties overlaid by the POM's own.
///
/// Unresolvable references stay in the requirement so callers can still see
/// what was declared.
pub fn extract_dependencies(
    pom: &PomDocument,
    inherited: &BTreeMap<String, String>,
) -> Vec<Dependency> {
    let properties = merge_properties(inherited, &pom.properties);
    let interpolator = Interpolator::for_pom(&properties, pom);

    pom.declared_dependencies()
        .iter()
        .filter_map(|dep| {
            let text =
                |value: &str| interpolator.field(Some(value), InterpolationPolicy::BestEffort);
            let group = text(&dep.group_id)?;
            let artifact = text(&dep.artifact_id)?;
            let requirement = pom
                .resolve_version(dep)
                .and_then(|v| text(&v))
                .unwrap_or_else(|| ANY_VERSION.to_string());

            Some(Dependency {
                name: format!("{group}:{artifact}"),
                requirement,
                scope: non_blank(dep.scope.as_deref()).map(str::to_string),
            })
        })
        .collect()
}
