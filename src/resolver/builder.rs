//! Builder for configuring resolver instances

use std::sync::Arc;

use super::TenantResolver;
use crate::cache::{DynamicCache, StaticRegistry};
use crate::clock::{LogicalClock, MonotonicClock};
use crate::config::CacheConfig;
use crate::traits::ContextBuilder;
use crate::Result;

/// Main entry point for creating resolver instances.
pub struct Muninn;

impl Muninn {
    /// Create a new builder around the collaborator that builds contexts.
    pub fn builder<B: ContextBuilder>(context_builder: B) -> MuninnBuilder<B> {
        MuninnBuilder::new(context_builder)
    }
}

/// Builder for configuring resolver instances.
pub struct MuninnBuilder<B: ContextBuilder> {
    context_builder: Arc<B>,
    config: CacheConfig,
    clock: Option<Arc<dyn LogicalClock>>,
    default_tenant: Option<B::Config>,
    static_tenants: Vec<(String, B::Config)>,
}

impl<B: ContextBuilder> MuninnBuilder<B> {
    pub fn new(context_builder: B) -> Self {
        Self::from_shared(Arc::new(context_builder))
    }

    /// Start from a builder that is shared with other components.
    pub fn from_shared(context_builder: Arc<B>) -> Self {
        Self {
            context_builder,
            config: CacheConfig::default(),
            clock: None,
            default_tenant: None,
            static_tenants: Vec::new(),
        }
    }

    /// Replace the whole cache configuration.
    pub fn config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Bound the ready dynamic population.
    pub fn max_dynamic_tenants(mut self, n: usize) -> Self {
        self.config.max_dynamic_tenants = n;
        self
    }

    /// Rename the reserved default tenant.
    pub fn default_tenant_id(mut self, id: impl Into<String>) -> Self {
        self.config.default_tenant_id = id.into();
        self
    }

    /// Clock used to rank recency (default: [`MonotonicClock`]).
    pub fn clock(mut self, clock: impl LogicalClock + 'static) -> Self {
        let clock: Arc<dyn LogicalClock> = Arc::new(clock);
        self.clock = Some(clock);
        self
    }

    /// Declare the default tenant.
    pub fn default_tenant(mut self, config: B::Config) -> Self {
        self.default_tenant = Some(config);
        self
    }

    /// Declare a named static tenant.
    pub fn static_tenant(mut self, tenant_id: impl Into<String>, config: B::Config) -> Self {
        self.static_tenants.push((tenant_id.into(), config));
        self
    }

    /// Build the resolver, running every static tenant's startup build.
    ///
    /// Static tenants that fail to build are registered as not ready rather
    /// than failing the whole startup.
    pub async fn build(self) -> Result<TenantResolver<B>> {
        self.config.validate()?;

        let clock = self
            .clock
            .unwrap_or_else(|| Arc::new(MonotonicClock::new()) as Arc<dyn LogicalClock>);

        let mut declared = Vec::with_capacity(self.static_tenants.len() + 1);
        if let Some(config) = self.default_tenant {
            declared.push((self.config.default_tenant_id.clone(), config));
        }
        declared.extend(self.static_tenants);

        let registry = StaticRegistry::initialize(
            Arc::clone(&self.context_builder),
            Arc::clone(&clock),
            self.config.default_tenant_id.clone(),
            declared,
        )
        .await?;
        let dynamic = DynamicCache::new(
            self.context_builder,
            clock,
            self.config.max_dynamic_tenants,
        );

        Ok(TenantResolver::new(registry, dynamic, self.config))
    }
}
