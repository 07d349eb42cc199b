use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use coordinate_resolver_lib::{
    init_tracing, Coordinate, Gav, MavenResolver, ResolveContext, ResolverConfig,
    ResolverResult,
};

/// Resolve Maven coordinates: versions, inherited metadata and dependencies.
#[derive(Debug, Parser)]
#[command(name = "coordinate-resolver")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the per-user config directory).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Repository base URL, overriding the config file.
    #[arg(long, global = true)]
    registry: Option<String>,

    /// Flatten POMs through the external tool.
    #[arg(long, global = true)]
    effective_pom: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// List published versions of `group:artifact`.
    Versions { name: String },
    /// Package metadata resolved through the parent chain.
    Metadata {
        name: String,
        /// Also describe each version.
        #[arg(long)]
        versions: bool,
        /// Versions already known, skipped by `--versions`.
        #[arg(long = "existing", value_delimiter = ',')]
        existing: Vec<String>,
    },
    /// Dependencies declared by one version.
    Dependencies { name: String, version: String },
}

fn print_json<T: Serialize>(value: &T) -> ResolverResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> ResolverResult<()> {
    init_tracing();

    let cli = Cli::parse();
    let mut config = ResolverConfig::load(cli.config.as_deref())?;
    if let Some(registry) = cli.registry {
        config.registry_url = registry;
    }
    if cli.effective_pom {
        config.effective_pom.enabled = true;
    }
    config.validate()?;

    info!("Resolving against {}", config.registry_url);
    let resolver = MavenResolver::from_config(&config).await?;

    match cli.command {
        Commands::Versions { name } => {
            let coordinate = Coordinate::parse(&name)?;
            print_json(&resolver.versions(&coordinate).await)
        }
        Commands::Metadata {
            name,
            versions,
            existing,
        } => {
            let Some(package) = resolver.package_metadata(&name).await? else {
                return print_json(&serde_json::Value::Null);
            };
            if versions {
                let records = resolver.versions_metadata(&package, &existing).await?;
                print_json(&serde_json::json!({ "package": package, "versions": records }))
            } else {
                print_json(&package)
            }
        }
        Commands::Dependencies { name, version } => {
            let coordinate = Coordinate::parse(&name)?;
            let gav: Gav = coordinate.at(version);
            let mut ctx = ResolveContext::new();
            let properties = resolver
                .resolve_in(&mut ctx, &gav)
                .await?
                .map(|resolved| resolved.properties)
                .unwrap_or_default();
            print_json(&resolver.dependencies_in(&mut ctx, &gav, &properties).await?)
        }
    }
}
