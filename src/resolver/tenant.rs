//! Routes tenant lookups to the static registry or the dynamic cache.

use std::sync::Arc;

use crate::cache::{DynamicCache, StaticRegistry};
use crate::config::CacheConfig;
use crate::traits::ContextBuilder;
use crate::types::TenantContext;
use crate::{MuninnError, Result};

/// Resolves tenant contexts for request handling.
///
/// Built with [`Muninn::builder`](crate::Muninn::builder). Owns its caches;
/// share it behind an `Arc` with whatever middleware needs it.
pub struct TenantResolver<B: ContextBuilder> {
    registry: StaticRegistry<B>,
    dynamic: DynamicCache<B>,
    config: CacheConfig,
}

impl<B: ContextBuilder> TenantResolver<B> {
    pub(crate) fn new(
        registry: StaticRegistry<B>,
        dynamic: DynamicCache<B>,
        config: CacheConfig,
    ) -> Self {
        Self {
            registry,
            dynamic,
            config,
        }
    }

    /// Resolve the context for `tenant_id`.
    ///
    /// With `dynamic = false` the tenant must have been declared at startup;
    /// `config` is ignored in favour of the declared one, and a tenant left
    /// not ready at startup is rebuilt here. With `dynamic = true` the tenant
    /// goes through the bounded dynamic cache, built with `config` on a miss.
    pub async fn get_or_create_context(
        &self,
        tenant_id: &str,
        config: B::Config,
        dynamic: bool,
    ) -> Result<Arc<TenantContext<B::State>>> {
        if !dynamic {
            return self.registry.get_or_initialize(tenant_id).await;
        }
        if tenant_id == self.config.default_tenant_id {
            return Err(MuninnError::InvalidTenantId(format!(
                "dynamic tenant id cannot be the default tenant id: {tenant_id}"
            )));
        }
        self.dynamic.get_or_create_context(tenant_id, config).await
    }

    /// Ready dynamic context for `tenant_id`, without building or touching it.
    pub fn peek_ready_dynamic_context(
        &self,
        tenant_id: &str,
    ) -> Option<Arc<TenantContext<B::State>>> {
        self.dynamic.peek_ready_dynamic_context(tenant_id)
    }

    /// Every ready dynamic tenant. Order is not guaranteed.
    pub fn dynamic_population_snapshot(&self) -> Vec<(String, Arc<TenantContext<B::State>>)> {
        self.dynamic.dynamic_population_snapshot()
    }

    /// Drop a ready dynamic tenant. Returns true if one was removed.
    pub fn remove_dynamic_tenant(&self, tenant_id: &str) -> bool {
        self.dynamic.remove_dynamic_tenant(tenant_id)
    }

    pub fn static_registry(&self) -> &StaticRegistry<B> {
        &self.registry
    }

    pub fn dynamic_cache(&self) -> &DynamicCache<B> {
        &self.dynamic
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }
}
