/// Selects which activity state(s) an iteration step or lookup should consider, matching
/// the ACTIVE / INACTIVE filtering spec.md §4.3 attaches to every peer, pfx, and pfx-peer
/// traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldFilter {
    Active,
    Inactive,
    Any,
}

impl FieldFilter {
    pub fn matches(self, active: bool) -> bool {
        match self {
            FieldFilter::Active => active,
            FieldFilter::Inactive => !active,
            FieldFilter::Any => true,
        }
    }
}

/// Address family selector for `first_pfx`. `Both` yields IPv4 prefixes before IPv6
/// prefixes, matching `Prefix`'s `Ord` impl.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    Both,
    V4,
    V6,
}

impl From<u8> for IpFamily {
    fn from(wire: u8) -> Self {
        match wire {
            4 => IpFamily::V4,
            6 => IpFamily::V6,
            _ => IpFamily::Both,
        }
    }
}
