//! Longest-prefix resolution of inbound paths to registered services.
//!
//! Service ids function as hierarchical route prefixes: a request for
//! `payments/v1/charge` is matched against the 3-segment candidate
//! `payments/v1/charge`, then `payments/v1`, then `payments`, and the first
//! registered candidate wins. Ids are unique and matching proceeds strictly
//! longest-first, so the first hit is by construction the most specific.

use crate::registry::{ServiceRecord, ServiceStore, StoreError};

/// A successful path resolution: the matched record plus whatever path
/// segments remained after the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTarget {
    pub record: ServiceRecord,
    /// Residual segments joined with `/`; empty when the whole path matched
    /// a registered id exactly.
    pub subpath: String,
}

/// Resolve `path` against the store, longest prefix first.
///
/// Empty segments (doubled or leading/trailing slashes) are dropped before
/// matching. Returns `Ok(None)` when no candidate prefix is registered; cost
/// is one store lookup per segment in the worst case.
pub async fn resolve(
    store: &dyn ServiceStore,
    path: &str,
) -> Result<Option<ResolvedTarget>, StoreError> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();

    for split in (1..=segments.len()).rev() {
        let candidate = segments[..split].join("/");
        if let Some(record) = store.get(&candidate).await? {
            return Ok(Some(ResolvedTarget {
                record,
                subpath: segments[split..].join("/"),
            }));
        }
    }

    Ok(None)
}
