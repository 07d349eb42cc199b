mod coordinate;
mod dependencies;
mod interpolate;
mod licenses;
mod metadata;
mod pom;
mod resolver;
mod versions;

pub use coordinate::{Coordinate, Gav};
pub use dependencies::{extract_dependencies, Dependency, ANY_VERSION};
pub use interpolate::{merge_properties, InterpolationPolicy, Interpolator};
pub use licenses::{license_string, licenses};
pub use metadata::{
    java_version, PackageMetadata, ResolvedMetadata, VersionDetails, VersionMetadata,
};
pub use pom::{PomDependency, PomDocument};
pub use resolver::{MavenResolver, ResolveContext, MAX_PARENT_DEPTH, VERSIONS_METADATA_LIMIT};
pub use versions::{compare_versions, discover_versions, filter_versions, is_snapshot_repository};

/// Default registry.
pub const MAVEN_CENTRAL: &str = "https://repo1.maven.org/maven2";
