//! LRU eviction pass over the dynamic tenant map.
//!
//! The pass works from a snapshot, but membership is decided at removal
//! time. Candidates are visited oldest first. Each one is removed only if its
//! use count still matches the snapshot, checked inside `remove_if` under
//! the shard's write lock. The use count moves on every lookup, so a use at an
//! unchanged clock reading still disqualifies the candidate. Lookups stamp under the read lock, so a tenant used
//! after the snapshot is never evicted by this pass. A skipped candidate
//! leaves its removal to the next one in order, which keeps the final
//! population at the limit.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use super::dynamic::Slot;
use crate::types::TenantContext;

/// Upper bound on re-snapshots within one pass. Each sweep after the first
/// only happens when touches or concurrent inserts outran the previous one.
const MAX_SWEEPS: usize = 4;

/// Scan-time view of a ready entry.
pub(crate) struct EvictionCandidate<S> {
    tenant_id: String,
    context: Arc<TenantContext<S>>,
    /// `(last_used, sequence)` when the snapshot was taken. Ordering only.
    key: (u64, u64),
    /// Use count when the snapshot was taken.
    uses: u64,
}

/// What one pass did.
#[derive(Debug, Default)]
pub(crate) struct PassReport {
    pub evicted: Vec<String>,
    /// Scheduled victims skipped because they were used after the snapshot.
    pub stale: usize,
}

enum Removal {
    Evicted,
    Touched,
    /// Removed or replaced by someone else since the snapshot.
    Gone,
}

/// Ready entries ordered least recently used first. Ties on `last_used` are
/// broken by the order in which the entries became ready.
pub(crate) fn snapshot<S>(entries: &DashMap<String, Slot<S>>) -> Vec<EvictionCandidate<S>> {
    let mut candidates: Vec<EvictionCandidate<S>> = entries
        .iter()
        .filter_map(|entry| match entry.value() {
            Slot::Ready(ctx) => Some(EvictionCandidate {
                tenant_id: entry.key().clone(),
                context: Arc::clone(ctx),
                key: ctx.recency_key(),
                uses: ctx.use_count(),
            }),
            Slot::Pending { .. } => None,
        })
        .collect();
    candidates.sort_by_key(|c| c.key);
    candidates
}

/// Remove least recently used ready entries until at most `limit` remain.
///
/// Pending entries are neither counted nor removed.
pub(crate) fn evict_to_limit<S>(entries: &DashMap<String, Slot<S>>, limit: usize) -> PassReport {
    let mut report = PassReport::default();

    for _ in 0..MAX_SWEEPS {
        let candidates = snapshot(entries);
        if candidates.len() <= limit {
            break;
        }
        let mut excess = candidates.len() - limit;
        let mut progressed = false;

        for candidate in &candidates {
            if excess == 0 {
                break;
            }
            match try_remove(entries, candidate) {
                Removal::Evicted => {
                    trace!(tenant_id = %candidate.tenant_id, last_used = candidate.key.0, "evicted");
                    report.evicted.push(candidate.tenant_id.clone());
                    excess -= 1;
                    progressed = true;
                }
                Removal::Gone => {
                    excess -= 1;
                    progressed = true;
                }
                Removal::Touched => {
                    trace!(tenant_id = %candidate.tenant_id, "used since scan, kept");
                    report.stale += 1;
                }
            }
        }

        // Every remaining candidate was used after the snapshot.
        if !progressed {
            break;
        }
    }

    report
}

fn try_remove<S>(entries: &DashMap<String, Slot<S>>, candidate: &EvictionCandidate<S>) -> Removal {
    let uses = candidate.uses;
    if candidate.context.use_count() != uses {
        return Removal::Touched;
    }

    let removed = entries.remove_if(&candidate.tenant_id, |_, slot| match slot {
        Slot::Ready(ctx) => Arc::ptr_eq(ctx, &candidate.context) && ctx.use_count() == uses,
        Slot::Pending { .. } => false,
    });

    match removed {
        Some(_) => Removal::Evicted,
        None if candidate.context.use_count() != uses => Removal::Touched,
        None => Removal::Gone,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(entries: &DashMap<String, Slot<()>>, id: &str, last_used: u64, sequence: u64) {
        let ctx = Arc::new(TenantContext::ready(id, (), true, last_used, sequence));
        entries.insert(id.to_string(), Slot::Ready(ctx));
    }

    fn ids(entries: &DashMap<String, Slot<()>>) -> Vec<String> {
        let mut ids: Vec<String> = entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    #[test]
    fn snapshot_orders_by_last_used_then_sequence() {
        let entries = DashMap::new();
        ready(&entries, "c", 5, 0);
        ready(&entries, "a", 3, 2);
        ready(&entries, "b", 3, 1);

        let order: Vec<String> = snapshot(&entries).into_iter().map(|c| c.tenant_id).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }

    #[test]
    fn evicts_oldest_down_to_limit() {
        let entries = DashMap::new();
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            ready(&entries, id, i as u64 + 1, i as u64);
        }

        let report = evict_to_limit(&entries, 2);

        assert_eq!(report.evicted, vec!["a", "b", "c"]);
        assert_eq!(report.stale, 0);
        assert_eq!(ids(&entries), vec!["d", "e"]);
    }

    #[test]
    fn under_limit_is_noop() {
        let entries = DashMap::new();
        ready(&entries, "a", 1, 0);
        let report = evict_to_limit(&entries, 1);
        assert!(report.evicted.is_empty());
        assert_eq!(ids(&entries), vec!["a"]);
    }

    #[test]
    fn touched_candidate_is_skipped_and_next_one_goes() {
        let entries = DashMap::new();
        for (i, id) in ["a", "b", "c", "d", "e"].iter().enumerate() {
            ready(&entries, id, i as u64 + 1, i as u64);
        }
        let candidates = snapshot(&entries);

        // "a" is used after the scan.
        candidates[0].context.touch(100);

        assert!(matches!(try_remove(&entries, &candidates[0]), Removal::Touched));
        assert!(matches!(try_remove(&entries, &candidates[1]), Removal::Evicted));
        assert!(matches!(try_remove(&entries, &candidates[2]), Removal::Evicted));
        assert_eq!(ids(&entries), vec!["a", "d", "e"]);
    }

    #[test]
    fn use_at_unchanged_clock_keeps_candidate() {
        let entries = DashMap::new();
        ready(&entries, "a", 5, 0);
        ready(&entries, "b", 5, 1);
        let candidates = snapshot(&entries);
        assert_eq!(candidates[0].tenant_id, "a");

        // Same logical time as the stored stamp.
        candidates[0].context.touch(5);

        assert!(matches!(try_remove(&entries, &candidates[0]), Removal::Touched));
        assert!(matches!(try_remove(&entries, &candidates[1]), Removal::Evicted));
        assert_eq!(ids(&entries), vec!["a"]);
    }

    #[test]
    fn replaced_candidate_is_gone_not_evicted() {
        let entries = DashMap::new();
        ready(&entries, "a", 1, 0);
        let candidates = snapshot(&entries);

        entries.remove("a");
        ready(&entries, "a", 1, 9);

        assert!(matches!(try_remove(&entries, &candidates[0]), Removal::Gone));
        assert_eq!(ids(&entries), vec!["a"]);
    }

    #[test]
    fn pending_entries_are_never_candidates() {
        use futures_util::FutureExt;

        let entries: DashMap<String, Slot<()>> = DashMap::new();
        let build = futures_util::future::pending::<crate::Result<Arc<TenantContext<()>>>>()
            .boxed()
            .shared();
        entries.insert(
            "p".to_string(),
            Slot::Pending {
                generation: 0,
                build,
            },
        );
        ready(&entries, "a", 1, 0);
        ready(&entries, "b", 2, 1);

        let report = evict_to_limit(&entries, 1);

        assert_eq!(report.evicted, vec!["a"]);
        assert_eq!(ids(&entries), vec!["b", "p"]);
    }
}
