//! First-fit placement of immediate (class C) downlinks.
//!
//! Tried in order:
//!
//! 1. `now + asap_margin`, if it collides with nothing queued
//! 2. right after each queued frame, in ascending TX time, if the gap up to
//!    the following frame is wide enough
//! 3. right after the last queued frame
//!
//! The first feasible slot wins; this is not a globally optimal packing.

use tracing::debug;

use super::store::EntryStore;
use crate::collision::Window;
use crate::config::JitConfig;
use crate::timing::{offset, CountUs};

/// Pick the TX time for an immediate downlink with the given reservation.
pub(crate) fn find_slot<P>(
    store: &EntryStore<P>,
    now: CountUs,
    pre_delay: u32,
    post_delay: u32,
    config: &JitConfig,
) -> CountUs {
    let margin = config.tx_margin_delay_us;
    let candidate = now.wrapping_add(config.asap_margin_us);

    if store.is_empty() {
        debug!(count_us = candidate, "immediate downlink first in JIT queue");
        return candidate;
    }

    let wanted = Window::new(candidate, pre_delay, post_delay);
    let blocker = store
        .entries()
        .iter()
        .position(|e| wanted.collides(&e.window(), margin));

    let Some(blocker) = blocker else {
        debug!(count_us = candidate, "immediate downlink placed ASAP, no collision");
        return candidate;
    };
    debug!(
        count_us = candidate,
        blocker,
        blocker_count_us = store.entries()[blocker].count_us,
        "ASAP slot taken, searching for a gap"
    );

    // walk in ascending TX time as seen from now
    let entries = store.entries();
    let mut order: Vec<usize> = (0..entries.len()).collect();
    order.sort_by_key(|&i| offset(entries[i].count_us, now));

    for (pos, &i) in order.iter().enumerate() {
        let current = &entries[i];
        let candidate = current
            .count_us
            .wrapping_add(current.post_delay)
            .wrapping_add(pre_delay)
            .wrapping_add(config.tx_jit_delay_us)
            .wrapping_add(margin);

        let Some(&next) = order.get(pos + 1) else {
            debug!(count_us = candidate, "immediate downlink placed last in JIT queue");
            return candidate;
        };

        let wanted = Window::new(candidate, pre_delay, post_delay);
        if wanted.collides(&entries[next].window(), margin) {
            debug!(count_us = candidate, after = i, before = next, "gap too small");
            continue;
        }

        debug!(count_us = candidate, after = i, before = next, "immediate downlink placed in gap");
        return candidate;
    }

    // the loop always returns on its last iteration
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::store::Entry;
    use crate::types::FrameClass;

    const PRE: u32 = 31_500;
    const TOA: u32 = 50_000;

    fn store_with(times: &[(CountUs, u32)]) -> EntryStore<()> {
        let mut store = EntryStore::new(8);
        for &(count_us, post_delay) in times {
            store
                .push(Entry {
                    count_us,
                    class: FrameClass::DownlinkA,
                    pre_delay: PRE,
                    post_delay,
                    payload: (),
                })
                .unwrap();
        }
        store
    }

    #[test]
    fn test_empty_queue_takes_margin() {
        let config = JitConfig::default();
        let store = store_with(&[]);
        assert_eq!(find_slot(&store, 100, PRE, TOA, &config), 1_000_100);
    }

    #[test]
    fn test_free_asap_slot() {
        let config = JitConfig::default();
        // far from now + 1 s
        let store = store_with(&[(5_000_000, TOA)]);
        assert_eq!(find_slot(&store, 0, PRE, TOA, &config), 1_000_000);
    }

    #[test]
    fn test_after_last_entry() {
        let config = JitConfig::default();
        let store = store_with(&[(1_000_000, TOA)]);
        let slot = find_slot(&store, 0, PRE, TOA, &config);
        assert_eq!(slot, 1_000_000 + TOA + PRE + 30_000 + 1_000);
    }

    #[test]
    fn test_gap_between_entries() {
        let config = JitConfig::default();
        // entries stored out of order; the wide gap is after 1.0 s
        let store = store_with(&[(3_000_000, TOA), (1_000_000, TOA)]);
        let slot = find_slot(&store, 0, PRE, TOA, &config);
        assert_eq!(slot, 1_112_500);
        assert!(!Window::new(slot, PRE, TOA)
            .collides(&Window::new(3_000_000, PRE, TOA), config.tx_margin_delay_us));
    }

    #[test]
    fn test_gap_too_small_moves_on() {
        let config = JitConfig::default();
        // 1.0 s and 1.15 s leave no room for another 50 ms frame
        let store = store_with(&[(1_150_000, TOA), (1_000_000, TOA)]);
        let slot = find_slot(&store, 0, PRE, TOA, &config);
        assert_eq!(slot, 1_150_000 + TOA + PRE + 30_000 + 1_000);
    }

    #[test]
    fn test_ordering_across_rollover() {
        let config = JitConfig::default();
        let now = u32::MAX - 2_000_000;
        let first = now.wrapping_add(1_000_000);
        let second = now.wrapping_add(4_000_000);
        // `second` has wrapped and is numerically smaller than `first`
        assert!(second < first);
        let store = store_with(&[(second, TOA), (first, TOA)]);
        let slot = find_slot(&store, now, PRE, TOA, &config);
        assert_eq!(slot, first.wrapping_add(TOA + PRE + 30_000 + 1_000));
    }
}
