// ─── Coordinate Resolver Core ───
// Maven coordinate resolution and POM inheritance.
//
// Architecture:
//   core/
//     maven/     — Coordinates, version discovery, POM parsing, parent chain,
//                  relocation, interpolation, licenses, dependencies
//     effective/ — Capacity store, external tool, effective-POM gate
//     http.rs    — Transport seam + reqwest client
//     config.rs  — JSON configuration
//     error.rs   — Central error type

pub mod config;
pub mod effective;
pub mod error;
pub mod http;
pub mod maven;
