//! Bounded, single-flight cache of dynamically discovered tenants.
//!
//! # Architecture
//!
//! One [`DashMap`] slot per tenant id, either `Pending` (a build is in
//! flight) or `Ready`. A miss claims the slot through the map's entry API,
//! so concurrent misses for one id collapse into a single build; everyone
//! else awaits the same [`Shared`] handle and receives the same
//! `Arc<TenantContext>` (or the same error).
//!
//! The build runs in its own spawned task. That task performs the slot
//! transition (Pending → Ready, or Pending → Absent on failure) and the
//! eviction check before it notifies waiters, so a caller that walks away
//! never cancels a build other callers may still want.
//!
//! Eviction is opportunistic: after each successful build, if the ready
//! population is over the limit and no other pass holds the eviction flag,
//! this task runs one pass (see [`eviction`](super::eviction)). Readers never
//! wait on a pass; a pass never waits on a build.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use super::eviction;
use crate::clock::LogicalClock;
use crate::telemetry;
use crate::traits::ContextBuilder;
use crate::types::TenantContext;
use crate::{MuninnError, Result};

pub(crate) type BuildOutcome<S> = Result<Arc<TenantContext<S>>>;
pub(crate) type SharedBuild<S> = Shared<BoxFuture<'static, BuildOutcome<S>>>;

/// Per-tenant map slot.
pub(crate) enum Slot<S> {
    /// A build is in flight. `generation` identifies the build so only its
    /// own task may resolve the slot.
    Pending {
        generation: u64,
        build: SharedBuild<S>,
    },
    Ready(Arc<TenantContext<S>>),
}

enum Lookup<S> {
    Ready(Arc<TenantContext<S>>),
    Pending(SharedBuild<S>),
}

/// Cache of dynamically discovered tenants.
///
/// Cheap to clone; clones share the same map.
pub struct DynamicCache<B: ContextBuilder> {
    inner: Arc<Inner<B>>,
}

impl<B: ContextBuilder> Clone for DynamicCache<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<B: ContextBuilder> {
    entries: DashMap<String, Slot<B::State>>,
    builder: Arc<B>,
    clock: Arc<dyn LogicalClock>,
    limit: usize,
    evicting: AtomicBool,
    ready: AtomicUsize,
    next_generation: AtomicU64,
    next_sequence: AtomicU64,
}

impl<B: ContextBuilder> DynamicCache<B> {
    /// Create an empty cache holding at most `limit` ready tenants after each
    /// eviction pass.
    pub fn new(builder: Arc<B>, clock: Arc<dyn LogicalClock>, limit: usize) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: DashMap::new(),
                builder,
                clock,
                limit,
                evicting: AtomicBool::new(false),
                ready: AtomicUsize::new(0),
                next_generation: AtomicU64::new(0),
                next_sequence: AtomicU64::new(0),
            }),
        }
    }

    /// Resolve the context for `tenant_id`, building it if needed.
    ///
    /// A ready entry is returned without suspending. An entry already being
    /// built is awaited rather than built again. On a miss this caller starts
    /// the build with `config`; `config` is ignored otherwise.
    ///
    /// A failed build is not cached: every caller waiting on it gets the
    /// error, and the next call starts from scratch.
    ///
    /// Must be called within a tokio runtime.
    pub async fn get_or_create_context(
        &self,
        tenant_id: &str,
        config: B::Config,
    ) -> Result<Arc<TenantContext<B::State>>> {
        if tenant_id.is_empty() {
            return Err(MuninnError::InvalidTenantId(
                "tenant id must not be empty".to_string(),
            ));
        }

        let found = match self.inner.lookup(tenant_id) {
            Some(Lookup::Pending(build)) => {
                metrics::counter!(telemetry::COALESCED_WAITS_TOTAL).increment(1);
                Lookup::Pending(build)
            }
            Some(found) => found,
            None => Inner::claim(&self.inner, tenant_id, config),
        };
        let build = match found {
            Lookup::Ready(ctx) => return Ok(ctx),
            Lookup::Pending(build) => build,
        };

        metrics::counter!(telemetry::CACHE_MISSES_TOTAL, "kind" => telemetry::KIND_DYNAMIC)
            .increment(1);
        build.await
    }

    /// The ready context for `tenant_id`, if any.
    ///
    /// Never starts a build and does not count as a use.
    pub fn peek_ready_dynamic_context(
        &self,
        tenant_id: &str,
    ) -> Option<Arc<TenantContext<B::State>>> {
        match self.inner.entries.get(tenant_id)?.value() {
            Slot::Ready(ctx) => Some(Arc::clone(ctx)),
            Slot::Pending { .. } => None,
        }
    }

    /// Every ready dynamic tenant. Order is not guaranteed.
    pub fn dynamic_population_snapshot(&self) -> Vec<(String, Arc<TenantContext<B::State>>)> {
        self.inner
            .entries
            .iter()
            .filter_map(|entry| match entry.value() {
                Slot::Ready(ctx) => Some((entry.key().clone(), Arc::clone(ctx))),
                Slot::Pending { .. } => None,
            })
            .collect()
    }

    /// Drop a ready tenant from the cache.
    ///
    /// Returns true if a ready entry was removed. In-flight builds cannot be
    /// cancelled and are left alone.
    pub fn remove_dynamic_tenant(&self, tenant_id: &str) -> bool {
        let removed = self
            .inner
            .entries
            .remove_if(tenant_id, |_, slot| matches!(slot, Slot::Ready(_)))
            .is_some();
        if removed {
            let remaining = self.inner.ready.fetch_sub(1, Ordering::AcqRel) - 1;
            metrics::gauge!(telemetry::DYNAMIC_TENANTS).set(remaining as f64);
            debug!(tenant_id, "dynamic tenant removed");
        }
        removed
    }

    /// Run an eviction pass now if one is needed and none is running.
    ///
    /// Returns true if this call ran a pass.
    pub fn try_evict(&self) -> bool {
        self.inner.maybe_evict()
    }

    /// Number of ready dynamic tenants.
    pub fn len(&self) -> usize {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Whether no dynamic tenant is ready.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The configured population limit.
    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    #[cfg(test)]
    fn set_evicting(&self, running: bool) {
        self.inner.evicting.store(running, Ordering::Release);
    }
}

impl<B: ContextBuilder> Inner<B> {
    /// Map lookup without insertion. Touches a ready entry while the shard guard is held so
    /// an eviction pass cannot remove it between the touch and the return.
    fn lookup(&self, tenant_id: &str) -> Option<Lookup<B::State>> {
        let slot = self.entries.get(tenant_id)?;
        let found = match slot.value() {
            Slot::Ready(ctx) => {
                ctx.touch(self.clock.now());
                metrics::counter!(telemetry::CACHE_HITS_TOTAL, "kind" => telemetry::KIND_DYNAMIC)
                    .increment(1);
                Lookup::Ready(Arc::clone(ctx))
            }
            Slot::Pending { build, .. } => Lookup::Pending(build.clone()),
        };
        Some(found)
    }

    /// Insert-if-absent. The winner spawns the build; anyone who lost the
    /// race gets whatever slot is now in place.
    fn claim(this: &Arc<Self>, tenant_id: &str, config: B::Config) -> Lookup<B::State> {
        let (generation, tx, build) = match this.entries.entry(tenant_id.to_string()) {
            Entry::Occupied(occupied) => {
                return match occupied.get() {
                    Slot::Ready(ctx) => {
                        ctx.touch(this.clock.now());
                        metrics::counter!(telemetry::CACHE_HITS_TOTAL, "kind" => telemetry::KIND_DYNAMIC)
                            .increment(1);
                        Lookup::Ready(Arc::clone(ctx))
                    }
                    Slot::Pending { build, .. } => {
                        metrics::counter!(telemetry::COALESCED_WAITS_TOTAL).increment(1);
                        Lookup::Pending(build.clone())
                    }
                };
            }
            Entry::Vacant(vacant) => {
                let generation = this.next_generation.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = oneshot::channel::<BuildOutcome<B::State>>();
                let aborted_id = tenant_id.to_string();
                let build = rx
                    .map(move |received| {
                        received.unwrap_or(Err(MuninnError::BuildAborted {
                            tenant_id: aborted_id,
                        }))
                    })
                    .boxed()
                    .shared();
                vacant.insert(Slot::Pending {
                    generation,
                    build: build.clone(),
                });
                (generation, tx, build)
            }
        };

        debug!(tenant_id, generation, "dynamic tenant build started");
        let inner = Arc::clone(this);
        let tenant_id = tenant_id.to_string();
        tokio::spawn(async move {
            let mut guard = PendingGuard {
                inner: &inner,
                tenant_id: &tenant_id,
                generation,
                armed: true,
            };
            let started = Instant::now();
            let built = inner
                .builder
                .build_context(&tenant_id, &config, true)
                .await;
            metrics::histogram!(telemetry::BUILD_DURATION_SECONDS, "kind" => telemetry::KIND_DYNAMIC)
                .record(started.elapsed().as_secs_f64());

            let outcome = inner.complete(&tenant_id, generation, built);
            guard.armed = false;
            if outcome.is_ok() {
                inner.maybe_evict();
            }
            // Every waiter may have gone away; the slot is already resolved.
            let _ = tx.send(outcome);
        });

        Lookup::Pending(build)
    }

    /// Resolve the Pending slot `generation` with the builder's result.
    fn complete(
        &self,
        tenant_id: &str,
        generation: u64,
        built: Result<B::State>,
    ) -> BuildOutcome<B::State> {
        match built {
            Ok(state) => {
                let sequence = self.next_sequence.fetch_add(1, Ordering::Relaxed);
                let ctx = Arc::new(TenantContext::ready(
                    tenant_id,
                    state,
                    true,
                    self.clock.now(),
                    sequence,
                ));
                if let Some(mut slot) = self.entries.get_mut(tenant_id) {
                    if is_generation(&slot, generation) {
                        *slot = Slot::Ready(Arc::clone(&ctx));
                        let ready = self.ready.fetch_add(1, Ordering::AcqRel) + 1;
                        metrics::gauge!(telemetry::DYNAMIC_TENANTS).set(ready as f64);
                    }
                }
                metrics::counter!(telemetry::BUILDS_TOTAL, "kind" => telemetry::KIND_DYNAMIC, "status" => "ok")
                    .increment(1);
                debug!(tenant_id, generation, "dynamic tenant ready");
                Ok(ctx)
            }
            Err(err) => {
                self.discard_pending(tenant_id, generation);
                metrics::counter!(telemetry::BUILDS_TOTAL, "kind" => telemetry::KIND_DYNAMIC, "status" => "error")
                    .increment(1);
                warn!(tenant_id, error = %err, "dynamic tenant is not initialized");
                Err(err)
            }
        }
    }

    fn discard_pending(&self, tenant_id: &str, generation: u64) {
        self.entries
            .remove_if(tenant_id, |_, slot| is_generation(slot, generation));
    }

    /// Claim the eviction flag and run one pass if the ready population is
    /// over the limit. Returns false if the pass was skipped.
    fn maybe_evict(&self) -> bool {
        if self.ready.load(Ordering::Acquire) <= self.limit {
            return false;
        }
        if self
            .evicting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            trace!("eviction pass already running, skipping");
            return false;
        }
        let _flag = FlagRelease(&self.evicting);

        metrics::counter!(telemetry::EVICTION_PASSES_TOTAL).increment(1);
        let report = eviction::evict_to_limit(&self.entries, self.limit);
        let evicted = report.evicted.len();
        let ready = self.ready.fetch_sub(evicted, Ordering::AcqRel) - evicted;

        metrics::counter!(telemetry::EVICTIONS_TOTAL).increment(evicted as u64);
        metrics::counter!(telemetry::STALE_VICTIMS_TOTAL).increment(report.stale as u64);
        metrics::gauge!(telemetry::DYNAMIC_TENANTS).set(ready as f64);
        debug!(
            evicted,
            stale = report.stale,
            remaining = ready,
            limit = self.limit,
            "eviction pass complete"
        );
        true
    }
}

fn is_generation<S>(slot: &Slot<S>, generation: u64) -> bool {
    matches!(slot, Slot::Pending { generation: g, .. } if *g == generation)
}

/// Removes a still-pending slot if the build task unwinds or is dropped
/// before resolving it, so the next call retries instead of waiting forever.
struct PendingGuard<'a, B: ContextBuilder> {
    inner: &'a Inner<B>,
    tenant_id: &'a str,
    generation: u64,
    armed: bool,
}

impl<B: ContextBuilder> Drop for PendingGuard<'_, B> {
    fn drop(&mut self) {
        if self.armed {
            warn!(tenant_id = self.tenant_id, "dynamic tenant build aborted");
            self.inner.discard_pending(self.tenant_id, self.generation);
        }
    }
}

struct FlagRelease<'a>(&'a AtomicBool);

impl Drop for FlagRelease<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
