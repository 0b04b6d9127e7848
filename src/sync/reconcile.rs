//! Thread reconciliation: diff, selective fetch, order-preserving merge

use std::collections::{HashMap, HashSet};
use std::thread;

use crate::error::{Error, Result};
use crate::gmail::{GmailClient, summarize_thread};
use crate::models::{Credential, KnownThreadCache, ThreadHeader, ThreadId, ThreadSummary};

/// Result of one reconciliation pass
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    /// Fully resolved threads in the input header order. This becomes the
    /// caller's next cache snapshot plus the authoritative display order.
    pub threads: Vec<ThreadSummary>,
    /// Ids whose fetch failed or resolved to nothing. Partial success is
    /// the normal contract; these are surfaced for a caller-side notice,
    /// never as a pass-level error.
    pub failed_ids: Vec<ThreadId>,
}

/// Reconcile cached thread summaries against freshly listed headers.
///
/// Headers whose `history_id` matches the cache are reused without any
/// network traffic; only changed threads are fetched, fanned out across
/// scoped workers and joined before the merge. Re-fetch cost is therefore
/// proportional to the number of changed threads, not the total listed.
///
/// `post_process` is applied to each freshly fetched summary before it is
/// merged. It must preserve `id` and `history_id`; altering either breaks
/// future diffs.
pub fn reconcile(
    client: &GmailClient,
    credential: Option<&Credential>,
    known: &KnownThreadCache,
    headers: &[ThreadHeader],
    post_process: Option<&dyn Fn(ThreadSummary) -> ThreadSummary>,
) -> Result<ReconcileOutcome> {
    match credential {
        Some(credential) if credential.is_usable() => {}
        _ => return Err(Error::MissingCredential("reconciliation requires a credential")),
    }

    let changed = changed_thread_ids(known, headers);
    log::debug!(
        "reconciling {} headers, {} changed",
        headers.len(),
        changed.len()
    );

    // Fan-out one fetch per changed id; join before merging. Workers share
    // nothing mutable and each produces a result keyed by its id.
    let fetched: Vec<(ThreadId, Result<_>)> = thread::scope(|scope| {
        let handles: Vec<_> = changed
            .iter()
            .map(|id| scope.spawn(move || (id.clone(), client.fetch_thread(credential, id))))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("thread fetch worker panicked"))
            .collect()
    });

    let mut fresh: HashMap<ThreadId, ThreadSummary> = HashMap::new();
    let mut failed_ids = Vec::new();
    for (id, result) in fetched {
        match result {
            Ok(payload) => match summarize_thread(payload) {
                Some(summary) => {
                    let summary = match post_process {
                        Some(f) => f(summary),
                        None => summary,
                    };
                    fresh.insert(id, summary);
                }
                None => {
                    log::warn!("thread {} resolved to an empty payload", id.as_str());
                    failed_ids.push(id);
                }
            },
            Err(e) => {
                log::warn!("failed to fetch thread {}: {}", id.as_str(), e);
                failed_ids.push(id);
            }
        }
    }

    Ok(ReconcileOutcome {
        threads: merge_threads(known, headers, &fresh),
        failed_ids,
    })
}

/// Ids whose cached summary is missing or out of date, in header order.
///
/// A header is changed iff its id is absent from the cache or the cached
/// `history_id` differs. Duplicate header ids are collapsed to their first
/// occurrence.
pub fn changed_thread_ids(known: &KnownThreadCache, headers: &[ThreadHeader]) -> Vec<ThreadId> {
    let mut seen = HashSet::new();
    headers
        .iter()
        .filter(|header| match known.get(&header.id) {
            Some(cached) => cached.history_id != header.history_id,
            None => true,
        })
        .filter(|header| seen.insert(header.id.clone()))
        .map(|header| header.id.clone())
        .collect()
}

/// Walk headers in original order, preferring fresh summaries over cached
/// ones and dropping ids resolved by neither
fn merge_threads(
    known: &KnownThreadCache,
    headers: &[ThreadHeader],
    fresh: &HashMap<ThreadId, ThreadSummary>,
) -> Vec<ThreadSummary> {
    headers
        .iter()
        .filter_map(|header| {
            fresh
                .get(&header.id)
                .or_else(|| known.get(&header.id))
                .cloned()
        })
        .collect()
}
