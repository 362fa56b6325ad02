use std::{fmt, net::IpAddr, str::FromStr};

use crate::{
    error::{Field, InvalidPacket},
    frontend::parser,
    matcher::Protocol,
    Classifiable,
};

/// A candidate packet, built per evaluation by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Packet {
    pub protocol: Protocol,
    pub source: IpAddr,
    pub destination: IpAddr,
    /// Unused for ICMP, conventionally 0.
    pub destination_port: u16,
}

impl Packet {
    pub fn new(protocol: Protocol, source: IpAddr, destination: IpAddr, port: u16) -> Self {
        Self {
            protocol,
            source,
            destination,
            destination_port: port,
        }
    }

    /// Builds a packet from raw form fields. `port` may be empty for ICMP.
    pub fn parse(
        protocol: &str,
        source: &str,
        destination: &str,
        port: &str,
    ) -> Result<Self, InvalidPacket> {
        let protocol = protocol
            .parse::<Protocol>()
            .map_err(|_| InvalidPacket::Protocol(protocol.to_owned()))?;
        let source = parse_addr(source, Field::Source)?;
        let destination = parse_addr(destination, Field::Destination)?;

        let port = port.trim();
        let port = if port.is_empty() {
            None
        } else {
            let n = port
                .parse::<u32>()
                .map_err(|_| InvalidPacket::Port(port.to_owned()))?;
            Some(n)
        };

        Self::checked(protocol, source, destination, port)
    }

    pub(crate) fn checked(
        protocol: Protocol,
        source: IpAddr,
        destination: IpAddr,
        port: Option<u32>,
    ) -> Result<Self, InvalidPacket> {
        let port = match port {
            None if protocol.has_ports() => return Err(InvalidPacket::MissingPort(protocol)),
            None => 0,
            Some(n) => u16::try_from(n).map_err(|_| InvalidPacket::PortOutOfRange(n))?,
        };

        let packet = Self::new(protocol, source, destination, port);
        validate(&packet)?;
        Ok(packet)
    }
}

fn parse_addr(input: &str, field: Field) -> Result<IpAddr, InvalidPacket> {
    input.trim().parse().map_err(|_| InvalidPacket::Address {
        field,
        input: input.to_owned(),
    })
}

/// Rejects descriptors that cannot be evaluated.
pub(crate) fn validate<P: Classifiable + ?Sized>(packet: &P) -> Result<(), InvalidPacket> {
    if packet.protocol().has_ports() && packet.destination_port() == 0 {
        return Err(InvalidPacket::PortOutOfRange(0));
    }
    Ok(())
}

impl Classifiable for Packet {
    #[inline]
    fn source(&self) -> IpAddr {
        self.source
    }

    #[inline]
    fn destination(&self) -> IpAddr {
        self.destination
    }

    #[inline]
    fn destination_port(&self) -> u16 {
        self.destination_port
    }

    #[inline]
    fn protocol(&self) -> Protocol {
        self.protocol
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} from {} to {}",
            self.protocol, self.source, self.destination
        )?;
        if self.protocol.has_ports() {
            write!(f, " port {}", self.destination_port)?;
        }
        Ok(())
    }
}

impl FromStr for Packet {
    type Err = InvalidPacket;

    /// Parses `<tcp|udp|icmp> from <ip> to <ip> [port <n>]`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::packet(s).map_err(InvalidPacket::Syntax)?
    }
}
