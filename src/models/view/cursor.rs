/*!
A stateful cursor over a [`View`], mirroring the iterator contract spec.md §4.3 names
directly (`first_peer`/`has_more_peer`/`next_peer`, `first_pfx`/`seek_pfx`,
`first_pfx_peer`) rather than Rust's `Iterator` trait. The codec and the producer's diff
pass both need to mutate the view while positioned on a particular peer or prefix
(`pfx_add_peer`, `pfx_activate_peer`), which doesn't fit a borrowed `Iterator` cleanly — a
cursor holding `&mut View` plus its own position state is the natural shape here, the way
the C library's `bgpview_iter_t` holds a view pointer plus cursor state.
*/
use super::filter::{FieldFilter, IpFamily};
use super::View;
use crate::error::CoreError;
use crate::models::network::{PeerId, Prefix};

pub struct ViewCursor<'a> {
    view: &'a mut View,
    peer_ids: Vec<PeerId>,
    peer_pos: Option<usize>,
    pfx_keys: Vec<Prefix>,
    pfx_pos: Option<usize>,
    pfx_peer_ids: Vec<PeerId>,
    pfx_peer_pos: Option<usize>,
}

impl<'a> ViewCursor<'a> {
    pub fn new(view: &'a mut View) -> Self {
        ViewCursor {
            view,
            peer_ids: Vec::new(),
            peer_pos: None,
            pfx_keys: Vec::new(),
            pfx_pos: None,
            pfx_peer_ids: Vec::new(),
            pfx_peer_pos: None,
        }
    }

    pub fn view(&self) -> &View {
        self.view
    }

    // -- peer traversal --------------------------------------------------

    /// Snapshots the current peer ids matching `filter` and positions on the first one.
    pub fn first_peer(&mut self, filter: FieldFilter) -> bool {
        self.peer_ids = self.view.iter_peers(filter).collect();
        self.peer_pos = if self.peer_ids.is_empty() {
            None
        } else {
            Some(0)
        };
        self.peer_pos.is_some()
    }

    pub fn has_more_peer(&self) -> bool {
        matches!(self.peer_pos, Some(p) if p < self.peer_ids.len())
    }

    pub fn next_peer(&mut self) -> bool {
        match self.peer_pos {
            Some(p) if p + 1 < self.peer_ids.len() => {
                self.peer_pos = Some(p + 1);
                true
            }
            _ => {
                self.peer_pos = Some(self.peer_ids.len());
                false
            }
        }
    }

    pub fn peer_id(&self) -> Option<PeerId> {
        self.peer_pos.and_then(|p| self.peer_ids.get(p).copied())
    }

    // -- prefix traversal -------------------------------------------------

    /// Snapshots prefixes of `family` matching `filter`, positioning on the first one.
    /// `IpFamily::Both` yields IPv4 prefixes before IPv6 prefixes.
    pub fn first_pfx(&mut self, family: IpFamily, filter: FieldFilter) -> bool {
        self.pfx_keys = self.view.iter_prefixes(family, filter).collect();
        self.pfx_pos = if self.pfx_keys.is_empty() {
            None
        } else {
            Some(0)
        };
        self.pfx_peer_ids.clear();
        self.pfx_peer_pos = None;
        self.pfx_pos.is_some()
    }

    pub fn has_more_pfx(&self) -> bool {
        matches!(self.pfx_pos, Some(p) if p < self.pfx_keys.len())
    }

    pub fn next_pfx(&mut self) -> bool {
        match self.pfx_pos {
            Some(p) if p + 1 < self.pfx_keys.len() => {
                self.pfx_pos = Some(p + 1);
                self.pfx_peer_ids.clear();
                self.pfx_peer_pos = None;
                true
            }
            _ => {
                self.pfx_pos = Some(self.pfx_keys.len());
                false
            }
        }
    }

    pub fn pfx(&self) -> Option<Prefix> {
        self.pfx_pos.and_then(|p| self.pfx_keys.get(p).copied())
    }

    /// Positions directly on `prefix` if present and matching `filter`, without
    /// disturbing any outer peer traversal. Returns whether the seek succeeded.
    pub fn seek_pfx(&mut self, prefix: Prefix, filter: FieldFilter) -> bool {
        let hit = self.view.has_pfx(prefix) && filter.matches(self.view.pfx_is_active(prefix));
        if hit {
            self.pfx_keys = vec![prefix];
            self.pfx_pos = Some(0);
        } else {
            self.pfx_keys.clear();
            self.pfx_pos = None;
        }
        self.pfx_peer_ids.clear();
        self.pfx_peer_pos = None;
        hit
    }

    // -- pfx-peer traversal, positioned on the current prefix -------------

    pub fn first_pfx_peer(&mut self, filter: FieldFilter) -> bool {
        self.pfx_peer_ids = match self.pfx() {
            Some(pfx) => self.view.iter_pfx_peers(pfx, filter).map(|(id, _)| id).collect(),
            None => Vec::new(),
        };
        self.pfx_peer_pos = if self.pfx_peer_ids.is_empty() {
            None
        } else {
            Some(0)
        };
        self.pfx_peer_pos.is_some()
    }

    pub fn has_more_pfx_peer(&self) -> bool {
        matches!(self.pfx_peer_pos, Some(p) if p < self.pfx_peer_ids.len())
    }

    pub fn next_pfx_peer(&mut self) -> bool {
        match self.pfx_peer_pos {
            Some(p) if p + 1 < self.pfx_peer_ids.len() => {
                self.pfx_peer_pos = Some(p + 1);
                true
            }
            _ => {
                self.pfx_peer_pos = Some(self.pfx_peer_ids.len());
                false
            }
        }
    }

    pub fn pfx_peer_id(&self) -> Option<PeerId> {
        self.pfx_peer_pos
            .and_then(|p| self.pfx_peer_ids.get(p).copied())
    }

    pub fn pfx_peer_path_idx(&self) -> Option<u32> {
        let pfx = self.pfx()?;
        let peer = self.pfx_peer_id()?;
        self.view.get_pfx_peer(pfx, peer).map(|(idx, _)| idx)
    }

    // -- mutators ----------------------------------------------------------

    pub fn add_peer(&mut self, id: PeerId) -> bool {
        self.view.add_peer(id)
    }

    pub fn activate_peer(&mut self, id: PeerId) {
        self.view.activate_peer(id)
    }

    /// Adds a pfx-peer cell under an explicit `prefix` (the hash-lookup path).
    pub fn add_pfx_peer(
        &mut self,
        prefix: Prefix,
        peer_id: PeerId,
        path_idx: u32,
    ) -> Result<(), CoreError> {
        self.view.add_pfx_peer(prefix, peer_id, path_idx)
    }

    /// Adds a pfx-peer cell under the currently positioned prefix, avoiding a second
    /// lookup of the prefix itself.
    pub fn pfx_add_peer(&mut self, peer_id: PeerId, path_idx: u32) -> Result<(), CoreError> {
        let prefix = self.pfx().ok_or_else(|| {
            CoreError::Corruption("pfx_add_peer called with no prefix positioned".into())
        })?;
        self.view.add_pfx_peer(prefix, peer_id, path_idx)
    }

    pub fn pfx_activate_peer(&mut self, peer_id: PeerId) -> Result<(), CoreError> {
        let prefix = self.pfx().ok_or_else(|| {
            CoreError::Corruption("pfx_activate_peer called with no prefix positioned".into())
        })?;
        self.view.pfx_activate_peer(prefix, peer_id)
    }
}
