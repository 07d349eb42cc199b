pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::config::ResolverConfig;
pub use crate::core::error::{ResolverError, ResolverResult};
pub use crate::core::maven::{Coordinate, Gav, MavenResolver, ResolveContext};

/// Initialize structured logging. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,coordinate_resolver_lib=debug")),
        )
        .with_writer(std::io::stderr)
        .init();
}
