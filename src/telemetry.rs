//! Metric names emitted by the tenant caches.
//!
//! Everything goes through the `metrics` facade, so nothing is recorded
//! until the embedding service installs a recorder. Names share the
//! `muninn_` prefix.
//!
//! Lookup and build series carry a `kind` label (`dynamic` or `static`).
//! Build counts also carry `status` (`ok` or `error`). Eviction series are
//! dynamic-only and unlabelled.

/// Total lookups answered by an already-ready context.
///
/// Labels: `kind`.
pub const CACHE_HITS_TOTAL: &str = "muninn_cache_hits_total";

/// Total lookups that found no ready context (started or joined a build).
///
/// Labels: `kind`.
pub const CACHE_MISSES_TOTAL: &str = "muninn_cache_misses_total";

/// Total callers that joined a build already in flight.
pub const COALESCED_WAITS_TOTAL: &str = "muninn_coalesced_waits_total";

/// Total context builds.
///
/// Labels: `kind`, `status` ("ok" | "error").
pub const BUILDS_TOTAL: &str = "muninn_builds_total";

/// Context build duration in seconds.
///
/// Labels: `kind`.
pub const BUILD_DURATION_SECONDS: &str = "muninn_build_duration_seconds";

/// Total dynamic tenants removed by eviction passes.
pub const EVICTIONS_TOTAL: &str = "muninn_evictions_total";

/// Total eviction passes that claimed the eviction flag.
pub const EVICTION_PASSES_TOTAL: &str = "muninn_eviction_passes_total";

/// Total scheduled victims skipped because they were used after the scan.
pub const STALE_VICTIMS_TOTAL: &str = "muninn_stale_victims_total";

/// Current number of ready dynamic tenants.
pub const DYNAMIC_TENANTS: &str = "muninn_dynamic_tenants";

pub(crate) const KIND_DYNAMIC: &str = "dynamic";
pub(crate) const KIND_STATIC: &str = "static";
