use std::{fmt, net::IpAddr, ops::RangeInclusive, str::FromStr};

use ipnet::IpNet;

use crate::{
    error::{Field, ValidationError},
    frontend::{self, parser, SyntaxError},
};

/// Transport protocol of a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    /// Whether packets of this protocol carry a destination port.
    #[inline]
    pub fn has_ports(self) -> bool {
        !matches!(self, Protocol::Icmp)
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        })
    }
}

impl FromStr for Protocol {
    type Err = SyntaxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::protocol(s)
    }
}

/// Matches the source or destination address of a packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum AddressMatcher {
    #[default]
    Any,
    Host(IpAddr),
    Cidr(IpNet),
}

impl AddressMatcher {
    /// Builds a CIDR block. Host bits of `addr` are cleared.
    pub fn cidr(addr: IpAddr, prefix: u8) -> Result<Self, ValidationError> {
        IpNet::new(addr, prefix)
            .map(|net| Self::Cidr(net.trunc()))
            .map_err(|_| ValidationError::PrefixLength {
                prefix: prefix.into(),
                max: max_prefix_len(&addr),
            })
    }

    /// Addresses of a different family never match a host or a block.
    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            Self::Any => true,
            Self::Host(host) => host == addr,
            Self::Cidr(net) => net.contains(addr),
        }
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    pub(crate) fn parse_field(input: &str, field: Field) -> Result<Self, ValidationError> {
        frontend::non_empty(input, field)?;
        parser::address(input).map_err(|source| ValidationError::Syntax { field, source })?
    }
}

pub(crate) fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

impl fmt::Display for AddressMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Host(addr) => addr.fmt(f),
            Self::Cidr(net) => net.fmt(f),
        }
    }
}

impl FromStr for AddressMatcher {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_field(s, Field::Address)
    }
}

/// Matches the destination port of a packet.
///
/// A single port is stored as a one element range. Bounds are always within
/// 1-65535 and never inverted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct PortMatcher {
    bounds: Option<(u16, u16)>,
}

impl PortMatcher {
    pub const ANY: PortMatcher = PortMatcher { bounds: None };

    pub fn single(port: u16) -> Result<Self, ValidationError> {
        Self::range(port, port)
    }

    pub fn range(low: u16, high: u16) -> Result<Self, ValidationError> {
        if low == 0 {
            return Err(ValidationError::PortOutOfRange(low.into()));
        }
        if high == 0 {
            return Err(ValidationError::PortOutOfRange(high.into()));
        }
        if low > high {
            return Err(ValidationError::InvertedRange { low, high });
        }

        Ok(Self {
            bounds: Some((low, high)),
        })
    }

    pub fn matches(&self, port: u16) -> bool {
        self.bounds
            .map_or(true, |(low, high)| low <= port && port <= high)
    }

    #[inline]
    pub fn is_any(&self) -> bool {
        self.bounds.is_none()
    }

    /// The inclusive range of matched ports, `None` for the wildcard.
    pub fn bounds(&self) -> Option<RangeInclusive<u16>> {
        self.bounds.map(|(low, high)| low..=high)
    }

    pub(crate) fn parse_field(input: &str) -> Result<Self, ValidationError> {
        frontend::non_empty(input, Field::Port)?;
        parser::port(input).map_err(|source| ValidationError::Syntax {
            field: Field::Port,
            source,
        })?
    }
}

impl fmt::Display for PortMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.bounds {
            None => f.write_str("any"),
            Some((low, high)) if low == high => write!(f, "{low}"),
            Some((low, high)) => write!(f, "{low}-{high}"),
        }
    }
}

impl FromStr for PortMatcher {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_field(s)
    }
}

/// Matches the protocol of a packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ProtocolMatcher {
    #[default]
    Any,
    Only(Protocol),
}

impl ProtocolMatcher {
    #[inline]
    pub fn matches(&self, protocol: Protocol) -> bool {
        match self {
            Self::Any => true,
            Self::Only(p) => *p == protocol,
        }
    }
}

impl From<Protocol> for ProtocolMatcher {
    fn from(protocol: Protocol) -> Self {
        Self::Only(protocol)
    }
}

impl fmt::Display for ProtocolMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => f.write_str("any"),
            Self::Only(p) => p.fmt(f),
        }
    }
}

impl FromStr for ProtocolMatcher {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        frontend::non_empty(s, Field::Protocol)?;
        parser::protocol_matcher(s).map_err(|source| ValidationError::Syntax {
            field: Field::Protocol,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use pretty_assertions::assert_eq;

    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn cidr_block_matching() {
        let block: AddressMatcher = "10.0.0.0/24".parse().unwrap();

        assert!(block.matches(&ip("10.0.0.5")));
        assert!(block.matches(&ip("10.0.0.0")));
        assert!(block.matches(&ip("10.0.0.255")));
        assert!(!block.matches(&ip("10.0.1.1")));
        assert!(!block.matches(&ip("9.255.255.255")));
    }

    #[test]
    fn cidr_clears_host_bits() {
        let block = AddressMatcher::cidr(ip("192.168.1.7"), 24).unwrap();
        assert_eq!("192.168.1.0/24", block.to_string());
        assert!(block.matches(&ip("192.168.1.200")));
    }

    #[test]
    fn cidr_edge_prefixes() {
        let everything = AddressMatcher::cidr(Ipv4Addr::UNSPECIFIED.into(), 0).unwrap();
        assert!(everything.matches(&ip("203.0.113.9")));
        assert!(!everything.matches(&ip("2001:db8::1")));

        let single = AddressMatcher::cidr(ip("10.1.2.3"), 32).unwrap();
        assert!(single.matches(&ip("10.1.2.3")));
        assert!(!single.matches(&ip("10.1.2.4")));

        assert!(matches!(
            AddressMatcher::cidr(ip("10.0.0.0"), 33),
            Err(ValidationError::PrefixLength { prefix: 33, max: 32 })
        ));
        assert!(AddressMatcher::cidr(Ipv6Addr::LOCALHOST.into(), 128).is_ok());
        assert!(matches!(
            AddressMatcher::cidr(Ipv6Addr::LOCALHOST.into(), 129),
            Err(ValidationError::PrefixLength { prefix: 129, max: 128 })
        ));
    }

    #[test]
    fn address_family_mismatch_never_matches() {
        let v6: AddressMatcher = "2001:db8::/32".parse().unwrap();
        assert!(v6.matches(&ip("2001:db8:1::42")));
        assert!(!v6.matches(&ip("32.1.13.184")));

        let host: AddressMatcher = "::ffff:10.0.0.1".parse().unwrap();
        assert!(!host.matches(&ip("10.0.0.1")));
    }

    #[test]
    fn host_and_wildcard() {
        let host: AddressMatcher = " 10.0.0.1 ".parse().unwrap();
        assert_eq!(AddressMatcher::Host(ip("10.0.0.1")), host);
        assert!(host.matches(&ip("10.0.0.1")));
        assert!(!host.matches(&ip("10.0.0.2")));

        let any: AddressMatcher = "any".parse().unwrap();
        assert!(any.is_any());
        assert!(any.matches(&ip("::1")));
    }

    #[test]
    fn address_rejects_malformed_input() {
        assert!(matches!(
            "".parse::<AddressMatcher>(),
            Err(ValidationError::Empty(Field::Address))
        ));
        assert!(matches!(
            "   ".parse::<AddressMatcher>(),
            Err(ValidationError::Empty(Field::Address))
        ));
        assert!(matches!(
            "10.0.0.0/99".parse::<AddressMatcher>(),
            Err(ValidationError::PrefixLength { prefix: 99, .. })
        ));
        assert!(matches!(
            "10.0.0.0/300".parse::<AddressMatcher>(),
            Err(ValidationError::PrefixLength { prefix: 300, max: 32 })
        ));
        assert!(matches!(
            "10.0.0/24".parse::<AddressMatcher>(),
            Err(ValidationError::Syntax { field: Field::Address, .. })
        ));
        assert!(matches!(
            "example.com".parse::<AddressMatcher>(),
            Err(ValidationError::Syntax { .. })
        ));
    }

    #[test]
    fn port_range_matching() {
        let range: PortMatcher = "1-1024".parse().unwrap();

        assert!(range.matches(80));
        assert!(range.matches(1));
        assert!(range.matches(1024));
        assert!(!range.matches(1025));
        assert!(!range.matches(0));
        assert_eq!(Some(1..=1024), range.bounds());
    }

    #[test]
    fn single_port_and_wildcard() {
        let port: PortMatcher = "80".parse().unwrap();
        assert!(port.matches(80));
        assert!(!port.matches(81));
        assert_eq!("80", port.to_string());

        let collapsed: PortMatcher = "443 - 443".parse().unwrap();
        assert_eq!(port_of(443), collapsed);

        let any: PortMatcher = "any".parse().unwrap();
        assert!(any.is_any());
        assert!(any.matches(0));
        assert!(any.matches(65535));
    }

    fn port_of(p: u16) -> PortMatcher {
        PortMatcher::single(p).unwrap()
    }

    #[test]
    fn port_bounds_are_validated() {
        assert!(matches!(
            PortMatcher::single(0),
            Err(ValidationError::PortOutOfRange(0))
        ));
        assert!(matches!(
            "65536".parse::<PortMatcher>(),
            Err(ValidationError::PortOutOfRange(65536))
        ));
        assert!(matches!(
            "0-80".parse::<PortMatcher>(),
            Err(ValidationError::PortOutOfRange(0))
        ));
        assert!(matches!(
            "1024-1".parse::<PortMatcher>(),
            Err(ValidationError::InvertedRange { low: 1024, high: 1 })
        ));
        assert!(matches!(
            "".parse::<PortMatcher>(),
            Err(ValidationError::Empty(Field::Port))
        ));
        assert!(matches!(
            "http".parse::<PortMatcher>(),
            Err(ValidationError::Syntax { field: Field::Port, .. })
        ));
    }

    #[test]
    fn protocol_matching() {
        let tcp: ProtocolMatcher = "tcp".parse().unwrap();
        assert!(tcp.matches(Protocol::Tcp));
        assert!(!tcp.matches(Protocol::Udp));

        let any: ProtocolMatcher = "any".parse().unwrap();
        assert!(any.matches(Protocol::Icmp));

        assert_eq!(Protocol::Icmp, "icmp".parse::<Protocol>().unwrap());
        assert!("any".parse::<Protocol>().is_err());
        assert!("sctp".parse::<ProtocolMatcher>().is_err());
    }
}
