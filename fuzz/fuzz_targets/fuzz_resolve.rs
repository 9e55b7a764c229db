#![no_main]

//! Fuzz target for longest-prefix path resolution.
//!
//! # Goal
//! Verify that arbitrary id sets and request paths do not cause:
//! - Panics
//! - Matches that are not segment-wise prefixes of the request path
//! - Subpaths that lose or invent path segments

use libfuzzer_sys::fuzz_target;
use meshgate::registry::memory::MemoryStore;
use meshgate::registry::{ServiceRecord, ServiceStore};
use meshgate::resolver::resolve;

fuzz_target!(|input: (Vec<String>, String)| {
    let (ids, path) = input;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("build runtime");

    runtime.block_on(async {
        let store = MemoryStore::new();
        for id in ids.iter().take(32) {
            // Same shape the registration endpoint enforces.
            if id.is_empty() || id.split('/').any(|segment| segment.is_empty()) {
                continue;
            }
            store
                .put(ServiceRecord::new(id.clone(), "http://upstream", ["receive"]))
                .await
                .expect("memory store put");
        }

        let resolved = resolve(&store, &path).await.expect("memory store get");

        if let Some(target) = resolved {
            // Matched id plus subpath must reassemble exactly the normalized
            // request path; nothing dropped, nothing invented.
            let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
            let mut reassembled: Vec<&str> = target.record.id.split('/').collect();
            if !target.subpath.is_empty() {
                reassembled.extend(target.subpath.split('/'));
            }
            assert_eq!(reassembled, segments);
        }
    });
});
