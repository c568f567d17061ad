/*!
Full-feed peer classification: spec.md §6's `filter_ff_v4cnt`/`filter_ff_v6cnt` options
keep peers whose active prefix count clears the threshold for *either* address family
(matching `filter_ff`'s `(v4cnt >= v4threshold) || (v6cnt >= v6threshold)` in
`bvc_viewsender.c`) — an IPv4-only full feed with zero IPv6 routes still qualifies.
Unlike the other [`ViewFilter`] implementations, this one needs a full pass over the
view's pfx-peer cells before any single peer decision can be made, so it is built once
per view and then used as that view's filter for a subsequent `write_sync`/`write_diff`
call — it is a writer-side filter, not something a streaming decoder can apply mid-frame.
*/
use super::{Decision, ViewFilter};
use crate::models::view::{FieldFilter, IpFamily};
use crate::models::{PeerId, PeerSignature, PeerStore, View};
use std::collections::{HashMap, HashSet};

pub struct FullFeedFilter {
    full_feed_ids: HashSet<PeerId>,
    full_feed_sigs: HashSet<PeerSignature>,
}

impl FullFeedFilter {
    pub fn build(view: &View, peers: &PeerStore, v4_threshold: u32, v6_threshold: u32) -> Self {
        let mut v4_counts: HashMap<PeerId, u32> = HashMap::new();
        let mut v6_counts: HashMap<PeerId, u32> = HashMap::new();
        for pfx in view.iter_prefixes(IpFamily::Both, FieldFilter::Active) {
            let counts = if pfx.is_ipv4() {
                &mut v4_counts
            } else {
                &mut v6_counts
            };
            for (peer_id, _) in view.iter_pfx_peers(pfx, FieldFilter::Active) {
                *counts.entry(peer_id).or_insert(0) += 1;
            }
        }

        let mut full_feed_ids = HashSet::new();
        let mut full_feed_sigs = HashSet::new();
        for peer_id in view.iter_peers(FieldFilter::Active) {
            let v4 = v4_counts.get(&peer_id).copied().unwrap_or(0);
            let v6 = v6_counts.get(&peer_id).copied().unwrap_or(0);
            if v4 >= v4_threshold || v6 >= v6_threshold {
                full_feed_ids.insert(peer_id);
                if let Some(sig) = peers.lookup(peer_id) {
                    full_feed_sigs.insert(sig.clone());
                }
            }
        }
        FullFeedFilter {
            full_feed_ids,
            full_feed_sigs,
        }
    }
}

impl ViewFilter for FullFeedFilter {
    fn filter_peer(&mut self, sig: &PeerSignature) -> Decision {
        if self.full_feed_sigs.contains(sig) {
            Decision::Keep
        } else {
            Decision::Drop
        }
    }

    fn filter_pfx_peer(&mut self, _pfx: crate::models::Prefix, peer_id: PeerId) -> Decision {
        if self.full_feed_ids.contains(&peer_id) {
            Decision::Keep
        } else {
            Decision::Drop
        }
    }
}
