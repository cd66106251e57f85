//! The cached per-tenant context.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A tenant's built runtime context.
///
/// Handed out as `Arc<TenantContext<S>>`; every caller that resolved the
/// same build holds the same allocation. The builder state is immutable once
/// published. Only the recency stamp moves.
pub struct TenantContext<S> {
    tenant_id: String,
    state: Option<S>,
    dynamic: bool,
    last_used: AtomicU64,
    /// Bumped on every use, even when the clock has not moved.
    uses: AtomicU64,
    sequence: u64,
}

impl<S> TenantContext<S> {
    pub(crate) fn ready(
        tenant_id: impl Into<String>,
        state: S,
        dynamic: bool,
        now: u64,
        sequence: u64,
    ) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            state: Some(state),
            dynamic,
            last_used: AtomicU64::new(now),
            uses: AtomicU64::new(0),
            sequence,
        }
    }

    /// A static tenant whose startup build failed. Rebuilt on first use.
    pub(crate) fn not_ready(tenant_id: impl Into<String>, now: u64, sequence: u64) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            state: None,
            dynamic: false,
            last_used: AtomicU64::new(now),
            uses: AtomicU64::new(0),
            sequence,
        }
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    /// Builder-supplied state, absent while the context is not ready.
    pub fn state(&self) -> Option<&S> {
        self.state.as_ref()
    }

    pub fn is_ready(&self) -> bool {
        self.state.is_some()
    }

    /// Whether the tenant was discovered at request time rather than declared
    /// at startup.
    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    /// Logical time of the most recent use.
    pub fn last_used(&self) -> u64 {
        self.last_used.load(Ordering::Acquire)
    }

    /// Order in which contexts became ready. Breaks `last_used` ties.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Record a use at `now`.
    ///
    /// Concurrent touches race, but the stamp only ever moves forward: an
    /// older reader finishing late cannot drag it back.
    pub(crate) fn touch(&self, now: u64) {
        self.last_used.fetch_max(now, Ordering::AcqRel);
        self.uses.fetch_add(1, Ordering::AcqRel);
    }

    /// Number of uses recorded since the context was published.
    pub fn use_count(&self) -> u64 {
        self.uses.load(Ordering::Acquire)
    }

    /// Ranking key used by eviction: older first, then earlier-built first.
    pub(crate) fn recency_key(&self) -> (u64, u64) {
        (self.last_used(), self.sequence)
    }
}

impl<S> fmt::Debug for TenantContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenantContext")
            .field("tenant_id", &self.tenant_id)
            .field("ready", &self.is_ready())
            .field("dynamic", &self.dynamic)
            .field("last_used", &self.last_used())
            .field("uses", &self.use_count())
            .field("sequence", &self.sequence)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touch_never_moves_backwards() {
        let ctx = TenantContext::ready("t", (), true, 10, 0);
        ctx.touch(5);
        assert_eq!(ctx.last_used(), 10);
        ctx.touch(12);
        assert_eq!(ctx.last_used(), 12);
    }

    #[test]
    fn touch_at_same_time_still_counts_as_use() {
        let ctx = TenantContext::ready("t", (), true, 5, 0);
        ctx.touch(5);
        ctx.touch(5);
        assert_eq!(ctx.last_used(), 5);
        assert_eq!(ctx.use_count(), 2);
    }

    #[test]
    fn not_ready_has_no_state() {
        let ctx: TenantContext<u32> = TenantContext::not_ready("s", 0, 0);
        assert!(!ctx.is_ready());
        assert!(ctx.state().is_none());
        assert!(!ctx.is_dynamic());
    }

    #[test]
    fn recency_key_breaks_ties_by_sequence() {
        let a = TenantContext::ready("a", (), true, 7, 1);
        let b = TenantContext::ready("b", (), true, 7, 2);
        assert!(a.recency_key() < b.recency_key());
    }
}
