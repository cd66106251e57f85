//! Core ContextBuilder trait

use async_trait::async_trait;

use crate::Result;

/// Builds the runtime state for a tenant.
///
/// Supplied once when the resolver is constructed. The cache treats the call
/// as opaque: it may suspend for as long as it likes (discovery, key
/// fetching), and any timeout is the implementation's own business.
///
/// Failures should be reported as [`MuninnError::ConstructionFailed`](crate::MuninnError::ConstructionFailed),
/// typically via [`MuninnError::construction`](crate::MuninnError::construction).
#[async_trait]
pub trait ContextBuilder: Send + Sync + 'static {
    /// Per-tenant configuration, passed through untouched.
    type Config: Clone + Send + Sync + 'static;

    /// Whatever the built context carries (keys, endpoints, clients).
    type State: Send + Sync + 'static;

    /// Build the state for `tenant_id`.
    ///
    /// `dynamic` is false for tenants declared at startup and true for
    /// tenants discovered while serving requests.
    async fn build_context(
        &self,
        tenant_id: &str,
        config: &Self::Config,
        dynamic: bool,
    ) -> Result<Self::State>;
}
