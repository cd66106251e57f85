//! Tenant context caching.
//!
//! Two independent stores:
//!
//! - [`StaticRegistry`]: tenants declared at startup. Fixed membership,
//!   never evicted. A tenant whose startup build failed is rebuilt on first
//!   use.
//!
//! - [`DynamicCache`]: tenants discovered while serving requests. Built
//!   lazily with single-flight construction and bounded by least-recently-used
//!   eviction (see [`eviction`] for the pass itself).
//!
//! [`TenantResolver`](crate::TenantResolver) routes between the two.

pub mod dynamic;
mod eviction;
pub mod registry;

pub use dynamic::DynamicCache;
pub use registry::StaticRegistry;
