use std::collections::{BTreeMap, HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::coordinate::{Coordinate, Gav};
use super::dependencies::{extract_dependencies, Dependency};
use super::interpolate::{merge_properties, InterpolationPolicy, Interpolator};
use super::licenses::license_string;
use super::metadata::{
    parse_published_at, PackageMetadata, ResolvedMetadata, VersionDetails, VersionMetadata,
};
use super::pom::PomDocument;
use super::versions::{compare_versions, discover_versions};
use crate::core::config::ResolverConfig;
use crate::core::effective::{
    CapacityStore, EffectivePomGate, MavenEffectivePom, MemoryCapacityStore, RedisCapacityStore,
};
use crate::core::error::{ResolverError, ResolverResult};
use crate::core::http::{build_http_client, HttpTransport, Transport};

/// Ancestors followed above the requested POM.
pub const MAX_PARENT_DEPTH: usize = 5;

/// Versions described per `versions_metadata` call.
pub const VERSIONS_METADATA_LIMIT: usize = 50;

type MappingFuture<'a> =
    Pin<Box<dyn Future<Output = ResolverResult<ResolvedMetadata>> + Send + 'a>>;

/// Descriptors fetched during one top-level call. Never shared between calls.
#[derive(Debug, Default)]
pub struct ResolveContext {
    cache: HashMap<Gav, Arc<PomDocument>>,
}

impl ResolveContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}

/// Resolves coordinates against one Maven repository.
pub struct MavenResolver {
    registry_url: String,
    transport: Arc<dyn Transport>,
    gate: Option<Arc<EffectivePomGate>>,
    /// Policy for free-text fields. Versions are always strict.
    text_policy: InterpolationPolicy,
}

impl MavenResolver {
    pub fn new(registry_url: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            registry_url: registry_url.into().trim_end_matches('/').to_string(),
            transport,
            gate: None,
            text_policy: InterpolationPolicy::default(),
        }
    }

    pub fn with_gate(mut self, gate: Arc<EffectivePomGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn with_text_policy(mut self, policy: InterpolationPolicy) -> Self {
        self.text_policy = policy;
        self
    }

    /// Wire up HTTP transport, capacity store and tool from configuration.
    pub async fn from_config(config: &ResolverConfig) -> ResolverResult<Self> {
        let client = build_http_client(&config.user_agent, config.http_timeout())?;
        let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(client));
        let mut resolver = Self::new(config.registry_url.clone(), transport)
            .with_text_policy(config.interpolation);

        if config.effective_pom.enabled {
            let store: Arc<dyn CapacityStore> = match config.redis_url() {
                Some(url) => Arc::new(RedisCapacityStore::connect(&url).await?),
                None => {
                    warn!("No Redis URL configured, effective POM capacity is per-process");
                    Arc::new(MemoryCapacityStore::new())
                }
            };
            let tool = Arc::new(MavenEffectivePom::new(
                config.effective_pom.tool_program.clone(),
                config.tool_limits(),
            ));
            resolver = resolver.with_gate(Arc::new(EffectivePomGate::new(
                store,
                tool,
                config.gate_settings(),
            )));
        }

        Ok(resolver)
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    /// Published versions of `coordinate`, in repository order.
    pub async fn versions(&self, coordinate: &Coordinate) -> Vec<String> {
        discover_versions(self.transport.as_ref(), &self.registry_url, coordinate).await
    }

    // ── Descriptor fetch ────────────────────────────────

    /// One POM, through the effective-POM gate when configured.
    ///
    /// `Ok(None)` for a 404 or a document that is not a POM. Any other
    /// non-success status and network failures are errors.
    pub async fn fetch_pom(
        &self,
        ctx: &mut ResolveContext,
        gav: &Gav,
    ) -> ResolverResult<Option<Arc<PomDocument>>> {
        if let Some(cached) = ctx.cache.get(gav) {
            debug!("POM cache hit: {}", gav);
            return Ok(Some(Arc::clone(cached)));
        }

        let url = gav.pom_url(&self.registry_url);
        let response = self.transport.get(&url).await?;
        if response.is_not_found() {
            debug!("POM not found: {}", url);
            return Ok(None);
        }
        if !response.is_success() {
            return Err(ResolverError::UnexpectedStatus {
                url,
                status: response.status,
            });
        }

        let parsed = match &self.gate {
            Some(gate) if gate.is_enabled() => {
                let flattened = gate.effective(gav, &response.body).await?;
                parse_pom(&flattened).or_else(|e| {
                    debug!("Effective POM for {} unreadable ({}), using raw POM", gav, e);
                    parse_pom(&response.body)
                })
            }
            _ => parse_pom(&response.body),
        };

        let mut pom = match parsed {
            Ok(pom) => pom,
            Err(e) => {
                warn!("Malformed POM at {}: {}", url, e);
                return Ok(None);
            }
        };
        pom.published_at = response.last_modified;

        let pom = Arc::new(pom);
        ctx.cache.insert(gav.clone(), Arc::clone(&pom));
        Ok(Some(pom))
    }

    /// Fetch `gav` and follow relocations until one repeats or fails.
    ///
    /// Errors fetching `gav` itself propagate; once a descriptor is in hand,
    /// only capacity exhaustion does.
    pub async fn get_pom(
        &self,
        ctx: &mut ResolveContext,
        gav: &Gav,
    ) -> ResolverResult<Option<Arc<PomDocument>>> {
        let Some(mut pom) = self.fetch_pom(ctx, gav).await? else {
            return Ok(None);
        };

        let mut current = gav.clone();
        let mut visited = HashSet::from([current.clone()]);
        loop {
            let target = pom.relocation_target(&current);
            if !visited.insert(target.clone()) {
                break;
            }

            match self.fetch_pom(ctx, &target).await {
                Ok(Some(next)) => {
                    info!("{} relocated to {}", current, target);
                    pom = next;
                    current = target;
                }
                Ok(None) => {
                    warn!("Relocation target {} of {} unavailable", target, current);
                    break;
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Relocation target {} of {} failed: {}", target, current, e);
                    break;
                }
            }
        }

        Ok(Some(pom))
    }

    // ── Parent chain ────────────────────────────────────

    /// Project `pom` and its ancestors into one record, nearest level winning.
    pub fn mapping<'a>(
        &'a self,
        ctx: &'a mut ResolveContext,
        pom: Arc<PomDocument>,
        depth: usize,
    ) -> MappingFuture<'a> {
        Box::pin(async move {
            let parent = match self.parent_of(&pom, depth) {
                Some(parent_gav) => match self.get_pom(ctx, &parent_gav).await {
                    Ok(Some(parent_pom)) => Some(self.mapping(ctx, parent_pom, depth + 1).await?),
                    Ok(None) => {
                        debug!("Parent {} not found, treating as root", parent_gav);
                        None
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        warn!("Parent {} failed, treating as root: {}", parent_gav, e);
                        None
                    }
                },
                None => None,
            };

            let inherited = parent
                .as_ref()
                .map(|p| p.properties.clone())
                .unwrap_or_default();
            let own = self.project_level(&pom, merge_properties(&inherited, &pom.properties));

            Ok(match parent {
                Some(parent) => own.over(parent),
                None => own,
            })
        })
    }

    /// Declared parent, when it is allowed and fully resolvable.
    fn parent_of(&self, pom: &PomDocument, depth: usize) -> Option<Gav> {
        let declared = pom.parent_gav()?;
        if depth >= MAX_PARENT_DEPTH {
            debug!("Parent depth limit reached at {}", declared);
            return None;
        }

        let interpolator = Interpolator::for_pom(&pom.properties, pom);
        let strict = |value: &str| interpolator.field(Some(value), InterpolationPolicy::Strict);
        match (
            strict(&declared.coordinate.group_id),
            strict(&declared.coordinate.artifact_id),
            strict(&declared.version),
        ) {
            (Some(group), Some(artifact), Some(version)) => {
                Some(Gav::new(group, artifact, version))
            }
            _ => {
                debug!("Parent {} has unresolved references, skipping", declared);
                None
            }
        }
    }

    fn project_level(
        &self,
        pom: &PomDocument,
        properties: BTreeMap<String, String>,
    ) -> ResolvedMetadata {
        let interpolator = Interpolator::for_pom(&properties, pom);
        let text = |value: Option<&str>| interpolator.field(value, self.text_policy);

        let homepage = text(pom.url.as_deref());
        let repository_url = text(pom.scm_url())
            .or_else(|| homepage.clone())
            .unwrap_or_default();

        ResolvedMetadata {
            description: text(pom.description.as_deref()),
            homepage,
            repository_url,
            licenses: license_string(pom),
            repositories: pom.repository_urls(),
            distribution_repositories: pom.distribution_repository_urls(),
            properties,
        }
    }

    /// Resolve one version with its parent chain.
    pub async fn resolve(&self, gav: &Gav) -> ResolverResult<Option<ResolvedMetadata>> {
        self.resolve_in(&mut ResolveContext::new(), gav).await
    }

    /// [`Self::resolve`] sharing `ctx` with later steps of the same call.
    pub async fn resolve_in(
        &self,
        ctx: &mut ResolveContext,
        gav: &Gav,
    ) -> ResolverResult<Option<ResolvedMetadata>> {
        let Some(pom) = self.get_pom(ctx, gav).await? else {
            return Ok(None);
        };
        self.mapping(ctx, pom, 0).await.map(Some)
    }

    // ── Package views ───────────────────────────────────

    /// Package record built from the newest version that has a POM.
    pub async fn package_metadata(&self, name: &str) -> ResolverResult<Option<PackageMetadata>> {
        let coordinate = Coordinate::parse(name)?;
        let versions = self.versions(&coordinate).await;
        if versions.is_empty() {
            info!("No versions found for {}", coordinate);
            return Ok(None);
        }

        let mut ctx = ResolveContext::new();
        let Some(latest) = self
            .fetch_latest_available_pom(&mut ctx, &coordinate, &versions)
            .await?
        else {
            warn!("None of the {} versions of {} has a POM", versions.len(), coordinate);
            return Ok(None);
        };

        let resolved = self.mapping(&mut ctx, latest, 0).await?;
        Ok(Some(PackageMetadata {
            name: coordinate.to_string(),
            namespace: coordinate.group_id.clone(),
            versions,
            resolved,
        }))
    }

    /// Walk `versions` from the end until one yields a POM.
    pub async fn fetch_latest_available_pom(
        &self,
        ctx: &mut ResolveContext,
        coordinate: &Coordinate,
        versions: &[String],
    ) -> ResolverResult<Option<Arc<PomDocument>>> {
        for version in versions.iter().rev() {
            if let Some(pom) = self.get_pom(ctx, &coordinate.at(version.as_str())).await? {
                return Ok(Some(pom));
            }
            debug!("{}:{} has no POM, trying an older version", coordinate, version);
        }
        Ok(None)
    }

    /// Per-version records for versions of `package` not in `existing`,
    /// newest first, at most [`VERSIONS_METADATA_LIMIT`].
    pub async fn versions_metadata(
        &self,
        package: &PackageMetadata,
        existing: &[String],
    ) -> ResolverResult<Vec<VersionMetadata>> {
        let coordinate = Coordinate::parse(&package.name)?;

        let mut pending: Vec<&String> = package
            .versions
            .iter()
            .filter(|v| !existing.contains(v))
            .collect();
        pending.sort_by(|a, b| compare_versions(b, a));
        pending.truncate(VERSIONS_METADATA_LIMIT);

        let mut ctx = ResolveContext::new();
        let mut records = Vec::with_capacity(pending.len());
        for version in pending {
            let gav = coordinate.at(version.as_str());
            let pom = match self.get_pom(&mut ctx, &gav).await {
                Ok(Some(pom)) => pom,
                Ok(None) => continue,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("Skipping {}: {}", gav, e);
                    continue;
                }
            };

            records.push(VersionMetadata {
                number: version.clone(),
                published_at: parse_published_at(pom.published_at.as_deref()),
                licenses: license_string(&pom),
                metadata: VersionDetails::from_pom(&pom),
            });
        }
        Ok(records)
    }

    /// Dependencies declared by one version, interpolated against the
    /// package's resolved `properties`. Empty when the POM is unavailable.
    pub async fn dependencies(
        &self,
        gav: &Gav,
        properties: &BTreeMap<String, String>,
    ) -> ResolverResult<Vec<Dependency>> {
        self.dependencies_in(&mut ResolveContext::new(), gav, properties)
            .await
    }

    /// [`Self::dependencies`] reusing descriptors already fetched into `ctx`.
    pub async fn dependencies_in(
        &self,
        ctx: &mut ResolveContext,
        gav: &Gav,
        properties: &BTreeMap<String, String>,
    ) -> ResolverResult<Vec<Dependency>> {
        match self.fetch_pom(ctx, gav).await {
            Ok(Some(pom)) => {
                let deps = extract_dependencies(&pom, properties);
                debug!("{} declares {} dependencies", gav, deps.len());
                Ok(deps)
            }
            Ok(None) => Ok(vec![]),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!("Dependencies of {} unavailable: {}", gav, e);
                Ok(vec![])
            }
        }
    }
}

fn parse_pom(bytes: &[u8]) -> ResolverResult<PomDocument> {
    PomDocument::parse(&String::from_utf8_lossy(bytes))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::*;
    use crate::core::effective::gate::testing::{FakeBehavior, FakeTool};
    use crate::core::effective::{GateSettings, CAPACITY_KEY};
    use crate::core::http::testing::StaticTransport;
    use crate::core::http::FetchResponse;

    const REPO: &str = "https://repo.test/maven2";

    fn url(group: &str, artifact: &str, version: &str) -> String {
        Gav::new(group, artifact, version).pom_url(REPO)
    }

    fn project(body: &str) -> String {
        format!("<project><modelVersion>4.0.0</modelVersion>{body}</project>")
    }

    fn parent(group: &str, artifact: &str, version: &str) -> String {
        format!(
            "<parent><groupId>{group}</groupId><artifactId>{artifact}</artifactId>\
             <version>{version}</version></parent>"
        )
    }

    fn relocation(group: &str, artifact: &str) -> String {
        format!(
            "<distributionManagement><relocation><groupId>{group}</groupId>\
             <artifactId>{artifact}</artifactId></relocation></distributionManagement>"
        )
    }

    fn resolver(transport: StaticTransport) -> (MavenResolver, Arc<StaticTransport>) {
        let transport = Arc::new(transport);
        (MavenResolver::new(REPO, transport.clone()), transport)
    }

    #[tokio::test]
    async fn scenario_a_single_level() {
        let (resolver, _) = resolver(StaticTransport::new().with_body(
            &url("org", "lib", "1.0"),
            &project(
                "<groupId>org</groupId><artifactId>lib</artifactId><version>1.0</version>\
                 <url>https://example.org</url>\
                 <licenses><license><name>MIT</name></license></licenses>",
            ),
        ));

        let meta = resolver
            .resolve(&Gav::new("org", "lib", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.homepage.as_deref(), Some("https://example.org"));
        assert_eq!(meta.licenses, "MIT");
        assert_eq!(meta.repository_url, "https://example.org");
    }

    #[tokio::test]
    async fn scenario_b_parent_fills_gaps_and_properties_merge() {
        let (resolver, _) = resolver(
            StaticTransport::new()
                .with_body(
                    &url("org", "child", "1.0"),
                    &project(&format!(
                        "{}<artifactId>child</artifactId>\
                         <properties><baz>qux</baz></properties>",
                        parent("org", "parent", "1.0")
                    )),
                )
                .with_body(
                    &url("org", "parent", "1.0"),
                    &project(
                        "<groupId>org</groupId><artifactId>parent</artifactId>\
                         <version>1.0</version><url>https://parent.example</url>\
                         <properties><foo>bar</foo></properties>",
                    ),
                ),
        );

        let meta = resolver
            .resolve(&Gav::new("org", "child", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.homepage.as_deref(), Some("https://parent.example"));
        let expected: BTreeMap<String, String> = [
            ("baz".to_string(), "qux".to_string()),
            ("foo".to_string(), "bar".to_string()),
        ]
        .into();
        assert_eq!(meta.properties, expected);
    }

    #[tokio::test]
    async fn child_values_win_and_use_inherited_properties() {
        let (resolver, _) = resolver(
            StaticTransport::new()
                .with_body(
                    &url("org", "child", "1.0"),
                    &project(&format!(
                        "{}<artifactId>child</artifactId>\
                         <description>Child for ${{platform}}</description>\
                         <scm><url>https://git.example/${{project.artifactId}}</url></scm>\
                         <properties><shared>child</shared></properties>",
                        parent("org", "parent", "1.0")
                    )),
                )
                .with_body(
                    &url("org", "parent", "1.0"),
                    &project(
                        "<artifactId>parent</artifactId><description>Parent</description>\
                         <licenses><license><name>Apache-2.0</name></license></licenses>\
                         <properties><platform>JVM</platform><shared>parent</shared></properties>",
                    ),
                ),
        );

        let meta = resolver
            .resolve(&Gav::new("org", "child", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.description.as_deref(), Some("Child for JVM"));
        assert_eq!(meta.repository_url, "https://git.example/child");
        assert_eq!(meta.licenses, "Apache-2.0");
        assert_eq!(meta.properties["shared"], "child");
    }

    #[tokio::test]
    async fn parent_chain_stops_after_five_ancestors() {
        let mut transport = StaticTransport::new().with_body(
            &url("org", "p0", "1"),
            &project(&parent("org", "p1", "1")),
        );
        for level in 1..=6 {
            transport = transport.with_body(
                &url("org", &format!("p{level}"), "1"),
                &project(&format!(
                    "{}<properties><level{level}>yes</level{level}></properties>",
                    parent("org", &format!("p{}", level + 1), "1")
                )),
            );
        }
        let (resolver, transport) = resolver(transport);

        let meta = resolver
            .resolve(&Gav::new("org", "p0", "1"))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(transport.hits(&url("org", "p5", "1")), 1);
        assert_eq!(transport.hits(&url("org", "p6", "1")), 0);
        assert!(meta.properties.contains_key("level5"));
        assert!(!meta.properties.contains_key("level6"));
    }

    #[tokio::test]
    async fn strict_parent_version_resolves_from_own_properties() {
        let (resolver, transport) = resolver(
            StaticTransport::new()
                .with_body(
                    &url("org", "child", "1.0"),
                    &project(&format!(
                        "{}<properties><revision>7</revision></properties>",
                        parent("org", "parent", "${revision}")
                    )),
                )
                .with_body(
                    &url("org", "parent", "7"),
                    &project("<url>https://parent.example</url>"),
                ),
        );

        let meta = resolver
            .resolve(&Gav::new("org", "child", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.homepage.as_deref(), Some("https://parent.example"));
        assert_eq!(transport.hits(&url("org", "parent", "${revision}")), 0);
    }

    #[tokio::test]
    async fn failing_parent_is_treated_as_absent() {
        let (resolver, _) = resolver(
            StaticTransport::new()
                .with_body(
                    &url("org", "child", "1.0"),
                    &project(&format!(
                        "{}<url>https://child.example</url>",
                        parent("org", "parent", "1.0")
                    )),
                )
                .failing(&url("org", "parent", "1.0")),
        );

        let meta = resolver
            .resolve(&Gav::new("org", "child", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.homepage.as_deref(), Some("https://child.example"));
    }

    #[tokio::test]
    async fn relocation_cycle_terminates() {
        let (resolver, transport) = resolver(
            StaticTransport::new()
                .with_body(
                    &url("org", "a", "1.0"),
                    &project(&format!("<artifactId>a</artifactId>{}", relocation("org", "b"))),
                )
                .with_body(
                    &url("org", "b", "1.0"),
                    &project(&format!("<artifactId>b</artifactId>{}", relocation("org", "a"))),
                ),
        );

        let mut ctx = ResolveContext::new();
        let pom = resolver
            .get_pom(&mut ctx, &Gav::new("org", "a", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pom.artifact_id.as_deref(), Some("b"));
        assert_eq!(transport.hits(&url("org", "a", "1.0")), 1);
        assert_eq!(transport.hits(&url("org", "b", "1.0")), 1);
    }

    #[tokio::test]
    async fn broken_relocation_keeps_last_good_pom() {
        let (resolver, _) = resolver(
            StaticTransport::new()
                .with_body(
                    &url("org", "old", "1.0"),
                    &project(&format!(
                        "<artifactId>old</artifactId>{}",
                        relocation("org", "missing")
                    )),
                )
                .with_body(
                    &url("org", "flaky-old", "1.0"),
                    &project(&format!(
                        "<artifactId>flaky-old</artifactId>{}",
                        relocation("org", "down")
                    )),
                )
                .failing(&url("org", "down", "1.0")),
        );

        let mut ctx = ResolveContext::new();
        let missing = resolver
            .get_pom(&mut ctx, &Gav::new("org", "old", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(missing.artifact_id.as_deref(), Some("old"));

        let down = resolver
            .get_pom(&mut ctx, &Gav::new("org", "flaky-old", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(down.artifact_id.as_deref(), Some("flaky-old"));
    }

    #[tokio::test]
    async fn fetch_statuses() {
        let (resolver, _) = resolver(
            StaticTransport::new()
                .with(
                    &url("org", "lib", "1.0"),
                    FetchResponse {
                        status: 503,
                        ..FetchResponse::default()
                    },
                )
                .with_body(&url("org", "lib", "2.0"), "<html><body>Not a POM</body></html>")
                .failing(&url("org", "lib", "3.0")),
        );
        let mut ctx = ResolveContext::new();

        let unavailable = resolver
            .fetch_pom(&mut ctx, &Gav::new("org", "lib", "1.0"))
            .await;
        assert!(matches!(
            unavailable,
            Err(ResolverError::UnexpectedStatus { status: 503, .. })
        ));
        assert!(resolver
            .fetch_pom(&mut ctx, &Gav::new("org", "lib", "2.0"))
            .await
            .unwrap()
            .is_none());
        assert!(resolver
            .fetch_pom(&mut ctx, &Gav::new("org", "lib", "3.0"))
            .await
            .is_err());
        assert!(resolver
            .fetch_pom(&mut ctx, &Gav::new("org", "lib", "4.0"))
            .await
            .unwrap()
            .is_none());
        assert!(ctx.is_empty());
    }

    #[tokio::test]
    async fn cache_is_per_context() {
        let gav = Gav::new("org", "lib", "1.0");
        let (resolver, transport) = resolver(StaticTransport::new().with(
            &url("org", "lib", "1.0"),
            FetchResponse::ok(project("<artifactId>lib</artifactId>"))
                .with_last_modified("Tue, 12 Jul 2022 12:10:25 GMT"),
        ));

        let mut ctx = ResolveContext::new();
        let first = resolver.fetch_pom(&mut ctx, &gav).await.unwrap().unwrap();
        resolver.fetch_pom(&mut ctx, &gav).await.unwrap().unwrap();
        assert_eq!(transport.hits(&url("org", "lib", "1.0")), 1);
        assert_eq!(ctx.len(), 1);
        assert_eq!(
            first.published_at.as_deref(),
            Some("Tue, 12 Jul 2022 12:10:25 GMT")
        );

        resolver
            .fetch_pom(&mut ResolveContext::new(), &gav)
            .await
            .unwrap();
        assert_eq!(transport.hits(&url("org", "lib", "1.0")), 2);
    }

    #[tokio::test]
    async fn package_metadata_uses_newest_available_pom() {
        let coordinate = Coordinate::new("org.example", "lib");
        let (resolver, transport) = resolver(
            StaticTransport::new()
                .with_body(
                    &coordinate.metadata_url(REPO),
                    "<metadata><versioning><versions>\
                     <version>1.0</version><version>1.1</version><version>2.0</version>\
                     </versions></versioning></metadata>",
                )
                .with_body(
                    &coordinate.pom_url(REPO, "1.1"),
                    &project(
                        "<url>https://lib.example</url>\
                         <repositories><repository><url>https://repo.example/m2</url>\
                         </repository></repositories>",
                    ),
                ),
        );

        let package = resolver
            .package_metadata("org.example:lib")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(package.name, "org.example:lib");
        assert_eq!(package.namespace, "org.example");
        assert_eq!(package.versions, vec!["1.0", "1.1", "2.0"]);
        assert_eq!(package.resolved.homepage.as_deref(), Some("https://lib.example"));
        assert_eq!(package.resolved.repositories, vec!["https://repo.example/m2"]);
        assert_eq!(transport.hits(&coordinate.pom_url(REPO, "2.0")), 1);
        assert_eq!(transport.hits(&coordinate.pom_url(REPO, "1.0")), 0);
    }

    #[tokio::test]
    async fn package_metadata_without_versions() {
        let (resolver, _) = resolver(StaticTransport::new());
        assert!(resolver
            .package_metadata("org.example:nothing")
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            resolver.package_metadata("no-colon").await,
            Err(ResolverError::InvalidCoordinate(_))
        ));
    }

    #[tokio::test]
    async fn versions_metadata_newest_first_skipping_existing() {
        let coordinate = Coordinate::new("org", "lib");
        let (resolver, _) = resolver(
            StaticTransport::new()
                .with(
                    &coordinate.pom_url(REPO, "1.10"),
                    FetchResponse::ok(project(
                        "<licenses><license><name>MIT</name></license></licenses>\
                         <properties><maven.compiler.release>17</maven.compiler.release>\
                         </properties>",
                    ))
                    .with_last_modified("Tue, 12 Jul 2022 12:10:25 GMT"),
                )
                .with_body(&coordinate.pom_url(REPO, "1.9"), &project("")),
        );
        let package = PackageMetadata {
            name: "org:lib".into(),
            namespace: "org".into(),
            versions: vec!["1.0".into(), "1.9".into(), "1.10".into(), "1.2".into()],
            resolved: ResolvedMetadata::default(),
        };

        let records = resolver
            .versions_metadata(&package, &["1.0".to_string()])
            .await
            .unwrap();
        let numbers: Vec<&str> = records.iter().map(|r| r.number.as_str()).collect();
        // 1.2 has no POM
        assert_eq!(numbers, vec!["1.10", "1.9"]);

        let newest = &records[0];
        assert_eq!(newest.licenses, "MIT");
        assert_eq!(newest.metadata.java_version.as_deref(), Some("17"));
        assert_eq!(
            newest.published_at.map(|t| t.to_rfc3339()).as_deref(),
            Some("2022-07-12T12:10:25+00:00")
        );
        assert!(records[1].published_at.is_none());
    }

    #[tokio::test]
    async fn dependencies_use_resolved_properties() {
        let gav = Gav::new("org", "app", "1.0");
        let (resolver, _) = resolver(StaticTransport::new().with_body(
            &gav.pom_url(REPO),
            &project(
                "<dependencies><dependency><groupId>org</groupId>\
                 <artifactId>core</artifactId><version>${core.version}</version>\
                 <scope>runtime</scope></dependency></dependencies>",
            ),
        ));
        let properties: BTreeMap<String, String> =
            [("core.version".to_string(), "3.2".to_string())].into();

        let deps = resolver.dependencies(&gav, &properties).await.unwrap();
        assert_eq!(
            deps,
            vec![Dependency {
                name: "org:core".into(),
                requirement: "3.2".into(),
                scope: Some("runtime".into()),
            }]
        );

        let missing = resolver
            .dependencies(&Gav::new("org", "app", "9.9"), &properties)
            .await
            .unwrap();
        assert!(missing.is_empty());
    }

    fn gated(
        transport: StaticTransport,
        store: Arc<MemoryCapacityStore>,
        behavior: FakeBehavior,
        max_wait: Duration,
    ) -> MavenResolver {
        let gate = EffectivePomGate::new(
            store,
            Arc::new(FakeTool::new(behavior, Duration::ZERO)),
            GateSettings {
                enabled: true,
                max_concurrent: 1,
                max_wait,
                poll_interval: Duration::from_millis(5),
                ticket_ttl: Duration::from_secs(60),
            },
        );
        MavenResolver::new(REPO, Arc::new(transport)).with_gate(Arc::new(gate))
    }

    #[tokio::test]
    async fn effective_pom_replaces_raw_document() {
        let resolver = gated(
            StaticTransport::new().with_body(
                &url("org", "lib", "1.0"),
                &project("<description>${inherited.text}</description>"),
            ),
            Arc::new(MemoryCapacityStore::new()),
            FakeBehavior::Write(project("<description>Flattened</description>")),
            Duration::from_secs(1),
        );

        let meta = resolver
            .resolve(&Gav::new("org", "lib", "1.0"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(meta.description.as_deref(), Some("Flattened"));
    }

    #[tokio::test]
    async fn shared_context_fetches_and_flattens_once() {
        let gav = Gav::new("org", "app", "1.0");
        let pom = project(
            "<properties><core.version>3.2</core.version></properties>\
             <dependencies><dependency><groupId>org</groupId>\
             <artifactId>core</artifactId><version>${core.version}</version>\
             </dependency></dependencies>",
        );
        let transport = Arc::new(StaticTransport::new().with_body(&gav.pom_url(REPO), &pom));
        let store = Arc::new(MemoryCapacityStore::new());
        let tool = Arc::new(FakeTool::new(FakeBehavior::Write(pom.clone()), Duration::ZERO));
        let gate = EffectivePomGate::new(
            store.clone(),
            tool.clone(),
            GateSettings {
                enabled: true,
                max_concurrent: 1,
                max_wait: Duration::from_secs(1),
                poll_interval: Duration::from_millis(5),
                ticket_ttl: Duration::from_secs(60),
            },
        );
        let resolver = MavenResolver::new(REPO, transport.clone()).with_gate(Arc::new(gate));

        let mut ctx = ResolveContext::new();
        let properties = resolver
            .resolve_in(&mut ctx, &gav)
            .await
            .unwrap()
            .unwrap()
            .properties;
        let deps = resolver
            .dependencies_in(&mut ctx, &gav, &properties)
            .await
            .unwrap();

        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].requirement, "3.2");
        assert_eq!(transport.hits(&gav.pom_url(REPO)), 1);
        assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
        assert_eq!(store.in_flight(), 0);
    }

    #[tokio::test]
    async fn capacity_timeout_escapes_resolution() {
        let store = Arc::new(MemoryCapacityStore::new());
        assert!(store
            .try_acquire(CAPACITY_KEY, 1, Duration::from_secs(60))
            .await
            .unwrap());
        let resolver = gated(
            StaticTransport::new().with_body(&url("org", "lib", "1.0"), &project("")),
            store,
            FakeBehavior::Write(project("")),
            Duration::from_millis(30),
        );

        let err = resolver
            .resolve(&Gav::new("org", "lib", "1.0"))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::CapacityTimeout { .. }));

        let deps = resolver
            .dependencies(&Gav::new("org", "lib", "1.0"), &BTreeMap::new())
            .await;
        assert!(deps.is_err());
    }
}
