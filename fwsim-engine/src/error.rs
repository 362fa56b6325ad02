use std::fmt;

use thiserror::Error;

use crate::{frontend::SyntaxError, matcher::Protocol};

/// The input field an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Action,
    Address,
    Source,
    Destination,
    Port,
    Protocol,
    Rule,
    Packet,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Action => "action",
            Field::Address => "address",
            Field::Source => "source address",
            Field::Destination => "destination address",
            Field::Port => "port",
            Field::Protocol => "protocol",
            Field::Rule => "rule",
            Field::Packet => "packet",
        };
        f.write_str(name)
    }
}

/// Malformed matcher input, rejected before a rule enters the store.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Empty(Field),

    #[error("invalid {field}: {source}")]
    Syntax { field: Field, source: SyntaxError },

    #[error("prefix length /{prefix} exceeds /{max}")]
    PrefixLength { prefix: u32, max: u8 },

    #[error("port {0} is outside 1-65535")]
    PortOutOfRange(u32),

    #[error("inverted port range {low}-{high}")]
    InvertedRange { low: u16, high: u16 },
}

/// Malformed packet descriptor, evaluation is aborted.
#[derive(Debug, Clone, Error)]
pub enum InvalidPacket {
    #[error("invalid packet: {0}")]
    Syntax(#[source] SyntaxError),

    #[error("invalid {field} {input:?}")]
    Address { field: Field, input: String },

    #[error("invalid protocol {0:?}, expected tcp, udp or icmp")]
    Protocol(String),

    #[error("invalid destination port {0:?}")]
    Port(String),

    #[error("destination port {0} is outside 1-65535")]
    PortOutOfRange(u32),

    #[error("{0} packet requires a destination port")]
    MissingPort(Protocol),
}
