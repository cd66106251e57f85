//! Public types for the Muninn API.

mod context;

pub use context::TenantContext;
