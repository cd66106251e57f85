//! Muninn - bounded tenant context cache
//!
//! Resolves, per tenant id, an expensive-to-build runtime context (keys,
//! endpoints, clients) lazily and asynchronously. Tenants declared at startup
//! live in a fixed registry; tenants discovered at request time live in a
//! bounded cache that builds each context at most once concurrently and
//! evicts the least recently used tenants once the configured limit is
//! exceeded.
//!
//! # Example
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use muninn::{ContextBuilder, Muninn, MuninnError};
//!
//! struct Discovery;
//!
//! #[async_trait]
//! impl ContextBuilder for Discovery {
//!     type Config = String; // issuer URL
//!     type State = String;  // resolved keys, say
//!
//!     async fn build_context(
//!         &self,
//!         tenant_id: &str,
//!         issuer: &String,
//!         _dynamic: bool,
//!     ) -> muninn::Result<String> {
//!         if issuer.is_empty() {
//!             return Err(MuninnError::construction(tenant_id, "no issuer"));
//!         }
//!         Ok(format!("keys for {issuer}"))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> muninn::Result<()> {
//!     let resolver = Muninn::builder(Discovery)
//!         .max_dynamic_tenants(500)
//!         .default_tenant("https://idp.example.com".to_string())
//!         .build()
//!         .await?;
//!
//!     let ctx = resolver
//!         .get_or_create_context("acme", "https://acme.example.com".to_string(), true)
//!         .await?;
//!     println!("{:?}", ctx.state());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod clock;
pub mod config;
pub mod error;
pub mod resolver;
pub mod telemetry;
pub mod traits;
pub mod types;

// Re-export main types at crate root
pub use cache::{DynamicCache, StaticRegistry};
pub use clock::{LogicalClock, ManualClock, MonotonicClock};
pub use config::{CacheConfig, DEFAULT_MAX_DYNAMIC_TENANTS, DEFAULT_TENANT_ID};
pub use error::{MuninnError, Result};
pub use resolver::{Muninn, MuninnBuilder, TenantResolver};
pub use traits::ContextBuilder;
pub use types::TenantContext;
