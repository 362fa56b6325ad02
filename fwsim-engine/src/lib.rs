use std::net::IpAddr;

mod classifier;
mod error;
mod frontend;
mod matcher;
mod packet;
mod rule;
mod store;

pub use classifier::*;
pub use error::*;
pub use frontend::SyntaxError;
pub use matcher::*;
pub use packet::*;
pub use rule::*;
pub use store::*;

/// A packet descriptor the classifier can match rules against.
///
/// Only the destination port is inspected; the source port is not part of a rule.
pub trait Classifiable {
    fn source(&self) -> IpAddr;

    fn destination(&self) -> IpAddr;

    fn destination_port(&self) -> u16;

    fn protocol(&self) -> Protocol;
}
