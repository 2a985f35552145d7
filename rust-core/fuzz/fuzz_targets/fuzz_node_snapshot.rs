// SPDX-License-Identifier: PMPL-1.0-or-later
//
// Fuzz target for node rewriting.
// Run with: cargo +nightly fuzz run fuzz_node_snapshot
//
// Feeds arbitrary JSON node snapshots through expansion, field substitution
// and range decomposition. Every rewrite must either succeed or return an
// error; none may panic.

#![no_main]

use libfuzzer_sys::fuzz_target;

use indexa_rewrite::builder::build_like_original;
use indexa_rewrite::expand::expand;
use indexa_rewrite::{ContainerType, IndexLookupMap, Node, RangeConfig, RangeFinder};

fuzz_target!(|data: &[u8]| {
    if data.len() > 4096 {
        return;
    }
    let Ok(node) = serde_json::from_slice::<Node>(data) else {
        return;
    };

    let _ = node.to_string();
    let _ = build_like_original(&node, "FIELD", None);

    let mut lookup = IndexLookupMap::with_thresholds(Some(8), Some(4));
    for (i, name) in node.identifier_names().iter().enumerate() {
        lookup.put(name, format!("v{i}"));
    }
    for ct in [ContainerType::And, ContainerType::Or] {
        let _ = expand(ct, false, &node, lookup.clone(), true, true, true);
        let _ = expand(ct, true, &node, lookup.clone(), false, true, false);
    }

    let finder = RangeFinder::new(RangeConfig {
        include_delayed: true,
        max_depth: Some(16),
    });
    if let Ok(decomposition) = finder.decompose(&node) {
        for range in &decomposition.ranges {
            let _ = range.to_node();
        }
    }
    let _ = finder.covering_range(&node);
});
