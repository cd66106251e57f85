//! Registry of tenants declared at startup.
//!
//! Static tenants are built once, never evicted and never counted against
//! the dynamic limit. A tenant whose startup build fails (its provider is not
//! reachable yet, say) is kept as a not-ready context and rebuilt on first
//! use. The rebuild runs in its own task and publishes the context itself.
//! Concurrent first requests await one
//! [`Shared`](futures_util::future::Shared) handle, and a caller that walks
//! away does not cancel it.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Instant;

use futures_util::FutureExt;
use futures_util::future::join_all;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::dynamic::{BuildOutcome, SharedBuild};

use crate::clock::LogicalClock;
use crate::telemetry;
use crate::traits::ContextBuilder;
use crate::types::TenantContext;
use crate::{MuninnError, Result};

struct StaticTenant<B: ContextBuilder> {
    config: B::Config,
    context: RwLock<Arc<TenantContext<B::State>>>,
    sequence: u64,
    /// Deferred rebuild in flight, if any.
    rebuild: Mutex<Option<SharedBuild<B::State>>>,
}

impl<B: ContextBuilder> StaticTenant<B> {
    fn current(&self) -> Arc<TenantContext<B::State>> {
        let ctx = self.context.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&ctx)
    }

    fn publish(&self, ctx: Arc<TenantContext<B::State>>) {
        let mut slot = self.context.write().unwrap_or_else(PoisonError::into_inner);
        *slot = ctx;
    }

    fn clear_rebuild(&self) {
        *self.rebuild.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Tenants declared at startup, including the default tenant.
///
/// The set of tenants is fixed after [`StaticRegistry::initialize`]; only a
/// not-ready tenant's context is ever replaced.
pub struct StaticRegistry<B: ContextBuilder> {
    tenants: HashMap<String, Arc<StaticTenant<B>>>,
    default_tenant_id: String,
    builder: Arc<B>,
    clock: Arc<dyn LogicalClock>,
}

impl<B: ContextBuilder> StaticRegistry<B> {
    /// Build every declared tenant with `dynamic = false`.
    ///
    /// Builds run concurrently. A failed build does not fail startup: the
    /// tenant is registered as not ready and retried on first use. Empty or
    /// duplicate ids are configuration errors.
    pub async fn initialize(
        builder: Arc<B>,
        clock: Arc<dyn LogicalClock>,
        default_tenant_id: impl Into<String>,
        declared: Vec<(String, B::Config)>,
    ) -> Result<Self> {
        let default_tenant_id = default_tenant_id.into();

        let mut seen = std::collections::HashSet::new();
        for (id, _) in &declared {
            if id.is_empty() {
                return Err(MuninnError::Configuration(
                    "static tenant id must not be empty".to_string(),
                ));
            }
            if !seen.insert(id.as_str()) {
                return Err(MuninnError::Configuration(format!(
                    "static tenant '{id}' declared more than once"
                )));
            }
        }

        let results = join_all(
            declared
                .iter()
                .map(|(id, config)| timed_build(builder.as_ref(), id, config)),
        )
        .await;

        let mut tenants = HashMap::with_capacity(declared.len());
        for (sequence, ((id, config), built)) in declared.into_iter().zip(results).enumerate() {
            let sequence = sequence as u64;
            let ctx = match built {
                Ok(state) => {
                    debug!(tenant_id = %id, "static tenant ready");
                    TenantContext::ready(id.as_str(), state, false, clock.now(), sequence)
                }
                Err(err) => {
                    warn!(
                        tenant_id = %id,
                        error = %err,
                        "static tenant is not ready, it will be built again on first use"
                    );
                    TenantContext::not_ready(id.as_str(), clock.now(), sequence)
                }
            };
            tenants.insert(
                id,
                Arc::new(StaticTenant {
                    config,
                    context: RwLock::new(Arc::new(ctx)),
                    sequence,
                    rebuild: Mutex::new(None),
                }),
            );
        }

        Ok(Self {
            tenants,
            default_tenant_id,
            builder,
            clock,
        })
    }

    /// Current context for `tenant_id`, ready or not.
    pub fn get(&self, tenant_id: &str) -> Option<Arc<TenantContext<B::State>>> {
        self.tenants.get(tenant_id).map(|tenant| tenant.current())
    }

    /// Current context for the default tenant, if one was declared.
    pub fn default_context(&self) -> Option<Arc<TenantContext<B::State>>> {
        self.get(&self.default_tenant_id)
    }

    pub fn default_tenant_id(&self) -> &str {
        &self.default_tenant_id
    }

    pub fn contains(&self, tenant_id: &str) -> bool {
        self.tenants.contains_key(tenant_id)
    }

    /// Declared tenant ids, sorted.
    pub fn tenant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tenants.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    /// Ready context for a declared tenant, rebuilding it first if its
    /// startup build failed.
    ///
    /// Concurrent callers share one rebuild. A failed rebuild is returned to
    /// every waiting caller and leaves the tenant not ready for the next
    /// attempt.
    ///
    /// Must be called within a tokio runtime.
    pub async fn get_or_initialize(&self, tenant_id: &str) -> Result<Arc<TenantContext<B::State>>> {
        let tenant = self
            .tenants
            .get(tenant_id)
            .ok_or_else(|| MuninnError::UnknownStaticTenant(tenant_id.to_string()))?;

        let ctx = tenant.current();
        if ctx.is_ready() {
            ctx.touch(self.clock.now());
            metrics::counter!(telemetry::CACHE_HITS_TOTAL, "kind" => telemetry::KIND_STATIC)
                .increment(1);
            return Ok(ctx);
        }
        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "kind" => telemetry::KIND_STATIC)
            .increment(1);

        let build = {
            let mut rebuild = tenant.rebuild.lock().unwrap_or_else(PoisonError::into_inner);

            // A rebuild may have published while we took the lock.
            let ctx = tenant.current();
            if ctx.is_ready() {
                ctx.touch(self.clock.now());
                return Ok(ctx);
            }

            match rebuild.as_ref() {
                Some(build) => {
                    metrics::counter!(telemetry::COALESCED_WAITS_TOTAL).increment(1);
                    build.clone()
                }
                None => {
                    let build = self.spawn_rebuild(tenant_id, Arc::clone(tenant));
                    *rebuild = Some(build.clone());
                    build
                }
            }
        };
        build.await
    }

    /// Start the deferred build for a not-ready tenant. The caller holds the
    /// tenant's rebuild lock.
    fn spawn_rebuild(
        &self,
        tenant_id: &str,
        tenant: Arc<StaticTenant<B>>,
    ) -> SharedBuild<B::State> {
        let (tx, rx) = oneshot::channel::<BuildOutcome<B::State>>();
        let aborted_id = tenant_id.to_string();
        let build: SharedBuild<B::State> = rx
            .map(move |received| {
                received.unwrap_or(Err(MuninnError::BuildAborted {
                    tenant_id: aborted_id,
                }))
            })
            .boxed()
            .shared();

        debug!(tenant_id, "static tenant rebuild started");
        let builder = Arc::clone(&self.builder);
        let clock = Arc::clone(&self.clock);
        let tenant_id = tenant_id.to_string();
        tokio::spawn(async move {
            let clear = ClearRebuild(&tenant);
            let outcome = match timed_build(builder.as_ref(), &tenant_id, &tenant.config).await {
                Ok(state) => {
                    let ctx = Arc::new(TenantContext::ready(
                        tenant_id.as_str(),
                        state,
                        false,
                        clock.now(),
                        tenant.sequence,
                    ));
                    tenant.publish(Arc::clone(&ctx));
                    debug!(tenant_id = %tenant_id, "static tenant ready after deferred build");
                    Ok(ctx)
                }
                Err(err) => {
                    warn!(tenant_id = %tenant_id, error = %err, "static tenant is still not ready");
                    Err(err)
                }
            };
            // Published before the slot clears, so the next caller sees it.
            drop(clear);
            let _ = tx.send(outcome);
        });

        build
    }
}

/// Frees a tenant's rebuild slot when the rebuild task ends, including by
/// panic, so the next caller can start over.
struct ClearRebuild<'a, B: ContextBuilder>(&'a StaticTenant<B>);

impl<B: ContextBuilder> Drop for ClearRebuild<'_, B> {
    fn drop(&mut self) {
        self.0.clear_rebuild();
    }
}

async fn timed_build<B: ContextBuilder>(
    builder: &B,
    tenant_id: &str,
    config: &B::Config,
) -> Result<B::State> {
    let started = Instant::now();
    let built = builder.build_context(tenant_id, config, false).await;
    let status = if built.is_ok() { "ok" } else { "error" };
    metrics::histogram!(telemetry::BUILD_DURATION_SECONDS, "kind" => telemetry::KIND_STATIC)
        .record(started.elapsed().as_secs_f64());
    metrics::counter!(telemetry::BUILDS_TOTAL, "kind" => telemetry::KIND_STATIC, "status" => status)
        .increment(1);
    built
}
