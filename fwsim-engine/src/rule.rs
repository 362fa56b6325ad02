use std::{fmt, str::FromStr};

use crate::{
    classifier::Decision,
    error::{Field, ValidationError},
    frontend::{self, parser},
    matcher::{AddressMatcher, PortMatcher, ProtocolMatcher},
    Classifiable,
};

/// What a rule does with a matching packet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Action {
    #[default]
    Allow,
    Deny,
}

impl Action {
    #[inline]
    pub fn decision(self) -> Decision {
        match self {
            Action::Allow => Decision::Allowed,
            Action::Deny => Decision::Blocked,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Allow => "allow",
            Action::Deny => "deny",
        })
    }
}

impl FromStr for Action {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        frontend::non_empty(s, Field::Action)?;
        parser::action(s).map_err(|source| ValidationError::Syntax {
            field: Field::Action,
            source,
        })
    }
}

/// Opaque rule identity, stable for the lifetime of the rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RuleId(pub(crate) u64);

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A validated rule that has not been given an identity or a priority yet.
///
/// The port matcher applies to the destination port.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct NewRule {
    pub action: Action,
    pub protocol: ProtocolMatcher,
    pub source: AddressMatcher,
    pub destination: AddressMatcher,
    pub port: PortMatcher,
}

impl NewRule {
    pub fn new(
        action: Action,
        protocol: ProtocolMatcher,
        source: AddressMatcher,
        destination: AddressMatcher,
        port: PortMatcher,
    ) -> Self {
        Self {
            action,
            protocol,
            source,
            destination,
            port,
        }
    }

    pub(crate) fn assemble(
        action: Action,
        protocol: ProtocolMatcher,
        source: Result<AddressMatcher, ValidationError>,
        destination: Result<AddressMatcher, ValidationError>,
        port: Result<PortMatcher, ValidationError>,
    ) -> Result<Self, ValidationError> {
        Ok(Self::new(action, protocol, source?, destination?, port?))
    }

    /// True when all four matchers accept the packet.
    ///
    /// ICMP carries no port: the port matcher is skipped for ICMP packets.
    pub fn matches<P: Classifiable + ?Sized>(&self, packet: &P) -> bool {
        let protocol = packet.protocol();

        self.protocol.matches(protocol)
            && self.source.matches(&packet.source())
            && self.destination.matches(&packet.destination())
            && (!protocol.has_ports() || self.port.matches(packet.destination_port()))
    }
}

impl fmt::Display for NewRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} from {} to {} port {}",
            self.action, self.protocol, self.source, self.destination, self.port
        )
    }
}

impl FromStr for NewRule {
    type Err = ValidationError;

    /// Parses `<action> [<protocol>] from <addr> to <addr> [port <port>]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        frontend::non_empty(s, Field::Rule)?;
        parser::new_rule(s).map_err(|source| ValidationError::Syntax {
            field: Field::Rule,
            source,
        })?
    }
}

/// The raw form fields of a rule, as typed by a user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleDraft {
    pub action: Action,
    pub source: String,
    pub destination: String,
    pub port: String,
    pub protocol: ProtocolMatcher,
}

impl RuleDraft {
    pub fn validate(&self) -> Result<NewRule, ValidationError> {
        Ok(NewRule::new(
            self.action,
            self.protocol,
            AddressMatcher::parse_field(&self.source, Field::Source)?,
            AddressMatcher::parse_field(&self.destination, Field::Destination)?,
            PortMatcher::parse_field(&self.port)?,
        ))
    }
}

/// A rule owned by a [`RuleStore`](crate::RuleStore).
///
/// Lower priorities are evaluated first. Priorities are dense, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rule {
    pub(crate) id: RuleId,
    pub(crate) priority: u32,
    pub(crate) definition: NewRule,
}

impl Rule {
    #[inline]
    pub fn id(&self) -> RuleId {
        self.id
    }

    #[inline]
    pub fn priority(&self) -> u32 {
        self.priority
    }

    #[inline]
    pub fn action(&self) -> Action {
        self.definition.action
    }

    #[inline]
    pub fn protocol(&self) -> ProtocolMatcher {
        self.definition.protocol
    }

    #[inline]
    pub fn source(&self) -> &AddressMatcher {
        &self.definition.source
    }

    #[inline]
    pub fn destination(&self) -> &AddressMatcher {
        &self.definition.destination
    }

    #[inline]
    pub fn port(&self) -> PortMatcher {
        self.definition.port
    }

    #[inline]
    pub fn matches<P: Classifiable + ?Sized>(&self, packet: &P) -> bool {
        self.definition.matches(packet)
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.definition.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{Packet, Protocol};

    fn draft(source: &str, destination: &str, port: &str) -> RuleDraft {
        RuleDraft {
            action: Action::Deny,
            source: source.to_owned(),
            destination: destination.to_owned(),
            port: port.to_owned(),
            protocol: ProtocolMatcher::Only(Protocol::Tcp),
        }
    }

    #[test]
    fn draft_validation() {
        let rule = draft("192.168.1.0/24", "any", "80").validate().unwrap();
        assert_eq!("deny tcp from 192.168.1.0/24 to any port 80", rule.to_string());

        assert!(matches!(
            draft("", "any", "80").validate(),
            Err(ValidationError::Empty(Field::Source))
        ));
        assert!(matches!(
            draft("any", " ", "80").validate(),
            Err(ValidationError::Empty(Field::Destination))
        ));
        assert!(matches!(
            draft("any", "any", "").validate(),
            Err(ValidationError::Empty(Field::Port))
        ));
        assert!(matches!(
            draft("10.0.0.0/33", "any", "80").validate(),
            Err(ValidationError::PrefixLength { prefix: 33, max: 32 })
        ));
        assert!(matches!(
            draft("any", "any", "1024-1").validate(),
            Err(ValidationError::InvertedRange { .. })
        ));
        assert!(matches!(
            draft("any", "10.0.0.300", "22").validate(),
            Err(ValidationError::Syntax {
                field: Field::Destination,
                ..
            })
        ));
    }

    #[test]
    fn icmp_ignores_ports() {
        let rule: NewRule = "deny from any to 10.0.0.1 port 22".parse().unwrap();
        let ping = Packet::new(
            Protocol::Icmp,
            Ipv4Addr::new(10, 0, 0, 9).into(),
            Ipv4Addr::new(10, 0, 0, 1).into(),
            0,
        );
        assert!(rule.matches(&ping));

        let ssh = Packet { protocol: Protocol::Tcp, destination_port: 22, ..ping };
        let http = Packet { destination_port: 80, ..ssh };
        assert!(rule.matches(&ssh));
        assert!(!rule.matches(&http));
    }

    #[test]
    fn all_matchers_must_agree() {
        let rule: NewRule = "allow udp from 10.0.0.0/8 to 8.8.8.8 port 53".parse().unwrap();
        let query = Packet::new(
            Protocol::Udp,
            Ipv4Addr::new(10, 1, 2, 3).into(),
            Ipv4Addr::new(8, 8, 8, 8).into(),
            53,
        );
        assert!(rule.matches(&query));
        assert!(!rule.matches(&Packet { protocol: Protocol::Tcp, ..query }));
        assert!(!rule.matches(&Packet { source: Ipv4Addr::new(11, 0, 0, 1).into(), ..query }));
        assert!(!rule.matches(&Packet { destination: Ipv4Addr::new(8, 8, 4, 4).into(), ..query }));
        assert!(!rule.matches(&Packet { destination_port: 5353, ..query }));
    }

    #[test]
    fn action_parsing() {
        assert_eq!(Action::Deny, "deny".parse::<Action>().unwrap());
        assert_eq!(Action::Allow, " allow ".parse::<Action>().unwrap());
        assert!("drop".parse::<Action>().is_err());
        assert!(matches!(
            "".parse::<NewRule>(),
            Err(ValidationError::Empty(Field::Rule))
        ));
    }
}
