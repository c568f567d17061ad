use ipnet::IpNet;
use std::fmt::{Display, Formatter};
use std::net::IpAddr;

/// A canonicalized IP prefix: `{address, mask_len}` with host bits cleared.
///
/// Two `Prefix` values with the same address family, masked address, and mask length
/// compare equal and hash identically, regardless of how the un-truncated address was
/// supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    net: IpNet,
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Orders IPv4 prefixes before IPv6 prefixes, then by address, then by mask length,
/// matching the traversal order `first_pfx(ip_family = 0, ...)` must produce.
impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        let family_rank = |net: &IpNet| -> u8 {
            match net {
                IpNet::V4(_) => 0,
                IpNet::V6(_) => 1,
            }
        };
        family_rank(&self.net)
            .cmp(&family_rank(&other.net))
            .then_with(|| self.address().cmp(&other.address()))
            .then_with(|| self.mask_len().cmp(&other.mask_len()))
    }
}

impl Prefix {
    /// Build a canonicalized prefix from an address and mask length, clearing host bits.
    pub fn new(address: IpAddr, mask_len: u8) -> Result<Self, ipnet::PrefixLenError> {
        let net = IpNet::new(address, mask_len)?.trunc();
        Ok(Prefix { net })
    }

    pub fn from_net(net: IpNet) -> Self {
        Prefix { net: net.trunc() }
    }

    pub fn address(&self) -> IpAddr {
        self.net.network()
    }

    pub fn mask_len(&self) -> u8 {
        self.net.prefix_len()
    }

    pub fn is_ipv4(&self) -> bool {
        matches!(self.net, IpNet::V4(_))
    }

    pub fn is_ipv6(&self) -> bool {
        matches!(self.net, IpNet::V6(_))
    }

    pub fn as_ipnet(&self) -> IpNet {
        self.net
    }
}

impl Display for Prefix {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.net)
    }
}

impl From<IpNet> for Prefix {
    fn from(net: IpNet) -> Self {
        Prefix::from_net(net)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn truncates_host_bits() {
        let with_host_bits = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 17));
        let p = Prefix::new(with_host_bits, 24).unwrap();
        assert_eq!(p.address(), IpAddr::V4(Ipv4Addr::new(192, 0, 2, 0)));
        assert_eq!(p.mask_len(), 24);
    }

    #[test]
    fn equal_regardless_of_input_host_bits() {
        let a = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)), 24).unwrap();
        let b = Prefix::new(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 255)), 24).unwrap();
        assert_eq!(a, b);
    }
}
