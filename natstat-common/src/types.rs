use std::{fmt, net::IpAddr};

/// One direction of a tracked connection.
///
/// Only `source` and `destination` take part in NAT classification, the ports
/// are kept around for display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressTuple {
    /// Source address.
    pub source: IpAddr,
    /// Destination address.
    pub destination: IpAddr,
    /// Source port, if the protocol has one.
    pub source_port: Option<u16>,
    /// Destination port, if the protocol has one.
    pub destination_port: Option<u16>,
}

impl AddressTuple {
    /// Builds a tuple without ports.
    pub fn new(source: impl Into<IpAddr>, destination: impl Into<IpAddr>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
            source_port: None,
            destination_port: None,
        }
    }

    /// Attaches the source and destination ports.
    pub fn with_ports(mut self, source_port: u16, destination_port: u16) -> Self {
        self.source_port = Some(source_port);
        self.destination_port = Some(destination_port);
        self
    }
}

/// Transport protocol of a flow, as reported by the connection-tracking table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
    Icmpv6,
    Sctp,
    Other(u8),
}

impl Protocol {
    /// Looks up a protocol by the name used in connection-tracking dumps.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "tcp" => Some(Self::Tcp),
            "udp" => Some(Self::Udp),
            "icmp" => Some(Self::Icmp),
            "icmpv6" => Some(Self::Icmpv6),
            "sctp" => Some(Self::Sctp),
            "unknown" => Some(Self::Other(0)),
            _ => None,
        }
    }

    pub fn display(&self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Udp => "udp",
            Self::Icmp => "icmp",
            Self::Icmpv6 => "icmpv6",
            Self::Sctp => "sctp",
            Self::Other(_) => "unknown",
        }
    }
}

impl From<u8> for Protocol {
    #[inline]
    fn from(val: u8) -> Self {
        match val {
            6 => Self::Tcp,
            17 => Self::Udp,
            1 => Self::Icmp,
            58 => Self::Icmpv6,
            132 => Self::Sctp,
            n => Self::Other(n),
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display())
    }
}

/// A tracked connection: the tuple as initiated and the tuple expected for
/// the return traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Flow {
    pub protocol: Protocol,
    /// Tuple as seen when the connection was initiated.
    pub original: AddressTuple,
    /// Tuple of the reply direction.
    pub reply: AddressTuple,
    /// Connection state (`ESTABLISHED`, `TIME_WAIT`, ...), when the protocol has one.
    pub state: Option<String>,
    /// Seconds until the entry expires.
    pub timeout: Option<u64>,
}

impl Flow {
    pub fn new(protocol: Protocol, original: AddressTuple, reply: AddressTuple) -> Self {
        Self {
            protocol,
            original,
            reply,
            state: None,
            timeout: None,
        }
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = Some(timeout);
        self
    }
}
