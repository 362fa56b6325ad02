use std::net::IpAddr;

use peg::{error::ParseError, str::LineCol};

use crate::{
    error::{Field, InvalidPacket, ValidationError},
    matcher::{max_prefix_len, AddressMatcher, PortMatcher, Protocol, ProtocolMatcher},
    packet::Packet,
    rule::{Action, NewRule},
};

/// Syntax error of the textual encodings, with its location in the input.
pub type SyntaxError = ParseError<LineCol>;

peg::parser!(pub(crate) grammar parser() for str {

    pub rule address() -> Result<AddressMatcher, ValidationError>
        = _ a:address_term() _ { a }

    pub rule port() -> Result<PortMatcher, ValidationError>
        = _ p:port_term() _ { p }

    pub rule protocol() -> Protocol
        = _ p:protocol_term() _ { p }

    pub rule protocol_matcher() -> ProtocolMatcher
        = _ p:protocol_matcher_term() _ { p }

    pub rule action() -> Action
        = _ a:action_term() _ { a }

    /// `<action> [<protocol>] from <addr> to <addr> [port <port>]`
    pub rule new_rule() -> Result<NewRule, ValidationError>
        = _ a:action_term() __ p:(p:protocol_matcher_term() __ { p })?
          "from" __ s:address_term() __ "to" __ d:address_term()
          pt:(__ "port" __ pt:port_term() { pt })? _
        {
            NewRule::assemble(a, p.unwrap_or_default(), s, d, pt.unwrap_or(Ok(PortMatcher::ANY)))
        }

    /// `<protocol> from <ip> to <ip> [port <n>]`
    pub rule packet() -> Result<Packet, InvalidPacket>
        = _ p:protocol_term() __ "from" __ s:ip() __ "to" __ d:ip()
          n:(__ "port" __ n:number() { n })? _
        {
            Packet::checked(p, s, d, n)
        }

    rule address_term() -> Result<AddressMatcher, ValidationError>
        = "any" { Ok(AddressMatcher::Any) }
        / a:ip() "/" n:number() { cidr(a, n) }
        / a:ip() { Ok(AddressMatcher::Host(a)) }

    rule port_term() -> Result<PortMatcher, ValidationError>
        = "any" { Ok(PortMatcher::ANY) }
        / l:number() _ "-" _ h:number() { port_range(l, h) }
        / n:number() { port_number(n).and_then(PortMatcher::single) }

    rule protocol_matcher_term() -> ProtocolMatcher
        = "any" { ProtocolMatcher::Any }
        / p:protocol_term() { ProtocolMatcher::Only(p) }

    rule protocol_term() -> Protocol
        = "tcp" { Protocol::Tcp }
        / "udp" { Protocol::Udp }
        / "icmp" { Protocol::Icmp }

    rule action_term() -> Action
        = "allow" { Action::Allow }
        / "deny" { Action::Deny }

    rule ip() -> IpAddr
        = n:$(['0'..='9' | 'a'..='f' | 'A'..='F' | ':' | '.']+) {? n.parse::<IpAddr>().or(Err("ip address")) }

    rule number() -> u32
        = n:$(['0'..='9']+) {? n.parse::<u32>().or(Err("number")) }

    rule _() = quiet!{[' ' | '\t']*}

    rule __() = quiet!{[' ' | '\t']+}
});

fn cidr(addr: IpAddr, prefix: u32) -> Result<AddressMatcher, ValidationError> {
    let max = max_prefix_len(&addr);
    u8::try_from(prefix)
        .map_err(|_| ValidationError::PrefixLength { prefix, max })
        .and_then(|prefix| AddressMatcher::cidr(addr, prefix))
}

fn port_number(n: u32) -> Result<u16, ValidationError> {
    u16::try_from(n)
        .ok()
        .filter(|port| *port != 0)
        .ok_or(ValidationError::PortOutOfRange(n))
}

fn port_range(low: u32, high: u32) -> Result<PortMatcher, ValidationError> {
    PortMatcher::range(port_number(low)?, port_number(high)?)
}

pub(crate) fn non_empty(input: &str, field: Field) -> Result<(), ValidationError> {
    if input.trim().is_empty() {
        Err(ValidationError::Empty(field))
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;

    use super::*;

    macro_rules! assert_rule {
        ($s: expr, $exp: expr) => {
            let rule = $crate::frontend::parser::new_rule($s)
                .unwrap_or_else(|e| panic!("{}: {}", $s, e))
                .unwrap_or_else(|e| panic!("{}: {}", $s, e));
            assert_eq!(rule.to_string(), $exp, $s);
        };
    }

    macro_rules! assert_error {
        ($s: expr, $col: expr) => {
            let err = $crate::frontend::parser::new_rule($s).unwrap_err();
            assert_eq!($col, err.location.column, $s);
        };
    }

    #[test]
    fn rule_lines() {
        assert_rule!(
            "allow tcp from 192.168.1.0/24 to any port 80",
            "allow tcp from 192.168.1.0/24 to any port 80"
        );
        assert_rule!(
            "deny tcp from any to 10.0.0.1 port 22",
            "deny tcp from any to 10.0.0.1 port 22"
        );
        assert_rule!(
            "  deny   from any to any  ",
            "deny any from any to any port any"
        );
        assert_rule!(
            "allow udp from 2001:db8::/32 to ::1 port 1-1024",
            "allow udp from 2001:db8::/32 to ::1 port 1-1024"
        );
        assert_rule!(
            "allow icmp from 10.0.0.0/8 to any",
            "allow icmp from 10.0.0.0/8 to any port any"
        );
    }

    #[test]
    fn rule_line_syntax_errors() {
        assert_error!("permit tcp from any to any", 1);
        assert_error!("allow tcp any to any", 11);

        assert!(parser::new_rule("allow tcp from any").is_err());
        assert!(parser::new_rule("allow tcp from any to any port").is_err());
        assert!(parser::new_rule("allow tcp from any to anything").is_err());
    }

    #[test]
    fn rule_line_validation_errors() {
        let res = parser::new_rule("allow from 10.0.0.0/40 to any").unwrap();
        assert!(matches!(
            res,
            Err(ValidationError::PrefixLength { prefix: 40, max: 32 })
        ));

        let res = parser::new_rule("allow from any to any port 90-80").unwrap();
        assert!(matches!(
            res,
            Err(ValidationError::InvertedRange { low: 90, high: 80 })
        ));
    }

    #[test]
    fn packet_lines() {
        let packet = parser::packet("tcp from 192.168.1.5 to 10.0.0.1 port 80")
            .unwrap()
            .unwrap();
        assert_eq!(
            Packet::new(
                Protocol::Tcp,
                Ipv4Addr::new(192, 168, 1, 5).into(),
                Ipv4Addr::new(10, 0, 0, 1).into(),
                80
            ),
            packet
        );

        let ping = parser::packet("icmp from 10.0.0.1 to 10.0.0.2").unwrap().unwrap();
        assert_eq!(0, ping.destination_port);

        assert!(parser::packet("any from 10.0.0.1 to 10.0.0.2 port 1").is_err());
        assert!(parser::packet("tcp from 10.0.0.0/8 to 10.0.0.2 port 1").is_err());
        assert!(matches!(
            parser::packet("udp from 10.0.0.1 to 10.0.0.2 port 70000").unwrap(),
            Err(InvalidPacket::PortOutOfRange(70000))
        ));
        assert!(matches!(
            parser::packet("udp from 10.0.0.1 to 10.0.0.2").unwrap(),
            Err(InvalidPacket::MissingPort(Protocol::Udp))
        ));
    }
}
