//! Reader for the text form of the connection-tracking table.
//!
//! Both the `/proc/net/nf_conntrack` layout and the output of `conntrack -L`
//! are accepted:
//!
//! ```text
//! ipv4     2 tcp      6 431999 ESTABLISHED src=192.168.1.5 dst=93.184.216.34 sport=51234 dport=443 src=93.184.216.34 dst=203.0.113.10 sport=443 dport=51234 [ASSURED] mark=0 use=2
//! udp      17 29 src=10.0.0.7 dst=10.0.0.1 sport=5353 dport=53 src=10.0.0.1 dst=10.0.0.7 sport=53 dport=5353 mark=0 use=1
//! ```
//!
//! The first `src=`/`dst=` pair is the original tuple, the second one the
//! reply tuple.

use std::{
    io::{self, BufRead},
    net::IpAddr,
};

use log::{debug, warn};
use natstat_common::{AddressTuple, Flow, Protocol};

const SRC: &str = "src=";
const DST: &str = "dst=";
const SRC_PORT: &str = "sport=";
const DST_PORT: &str = "dport=";

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unknown or missing protocol")]
    Protocol,
    #[error("{0} tuple is incomplete")]
    Incomplete(&'static str),
    #[error("invalid address {0:?}")]
    Addr(String),
    #[error("invalid port {0:?}")]
    Port(String),
}

#[derive(Debug, Default)]
struct PartialTuple {
    source: Option<IpAddr>,
    destination: Option<IpAddr>,
    source_port: Option<u16>,
    destination_port: Option<u16>,
}

impl PartialTuple {
    fn build(self, direction: &'static str) -> Result<AddressTuple, ParseError> {
        match (self.source, self.destination) {
            (Some(source), Some(destination)) => Ok(AddressTuple {
                source,
                destination,
                source_port: self.source_port,
                destination_port: self.destination_port,
            }),
            _ => Err(ParseError::Incomplete(direction)),
        }
    }
}

fn parse_addr(s: &str) -> Result<IpAddr, ParseError> {
    s.parse().map_err(|_| ParseError::Addr(s.to_owned()))
}

fn parse_port(s: &str) -> Result<u16, ParseError> {
    s.parse().map_err(|_| ParseError::Port(s.to_owned()))
}

// `ESTABLISHED`, `TIME_WAIT`, `SYN_SENT2`
fn is_state(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Parses one entry of the table.
pub fn parse_line(line: &str) -> Result<Flow, ParseError> {
    let mut tokens = line.split_whitespace().peekable();

    // nf_conntrack prefixes entries with the l3 protocol name and number.
    if matches!(tokens.peek(), Some(&"ipv4") | Some(&"ipv6")) {
        tokens.next();
        tokens.next();
    }

    let mut protocol = tokens
        .next()
        .and_then(Protocol::from_name)
        .ok_or(ParseError::Protocol)?;

    if let Some(number) = tokens.peek().and_then(|t| t.parse::<u8>().ok()) {
        tokens.next();
        if let Protocol::Other(_) = protocol {
            protocol = number.into();
        }
    }

    let timeout = tokens.peek().and_then(|t| t.parse::<u64>().ok());
    if timeout.is_some() {
        tokens.next();
    }

    let mut state = None;
    let mut tuples: [PartialTuple; 2] = Default::default();
    let mut current = 0;

    for token in tokens {
        if let Some(addr) = token.strip_prefix(SRC) {
            if tuples[current].source.is_some() {
                if current == 1 {
                    break;
                }
                current = 1;
            }
            tuples[current].source = Some(parse_addr(addr)?);
        } else if let Some(addr) = token.strip_prefix(DST) {
            tuples[current].destination = Some(parse_addr(addr)?);
        } else if let Some(port) = token.strip_prefix(SRC_PORT) {
            tuples[current].source_port = Some(parse_port(port)?);
        } else if let Some(port) = token.strip_prefix(DST_PORT) {
            tuples[current].destination_port = Some(parse_port(port)?);
        } else if state.is_none() && tuples[0].source.is_none() && is_state(token) {
            state = Some(token.to_owned());
        }
    }

    let [original, reply] = tuples;

    Ok(Flow {
        protocol,
        original: original.build("original")?,
        reply: reply.build("reply")?,
        state,
        timeout,
    })
}

/// Reads every entry of a dump. Malformed entries, including lines that are
/// not UTF-8, are logged and skipped.
pub fn read_flows<R: BufRead>(reader: R) -> io::Result<Vec<Flow>> {
    let mut flows = Vec::new();

    for (n, line) in reader.split(b'\n').enumerate() {
        let line = match String::from_utf8(line?) {
            Ok(line) => line,
            Err(e) => {
                warn!("skipping line {}: {}", n + 1, e);
                continue;
            }
        };
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        match parse_line(line) {
            Ok(flow) => flows.push(flow),
            Err(e) => warn!("skipping line {}: {}", n + 1, e),
        }
    }

    debug!("{} flows read", flows.len());

    Ok(flows)
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;
    use pretty_assertions::assert_eq;

    const PROC_TCP: &str = "ipv4     2 tcp      6 431999 ESTABLISHED src=192.168.1.5 dst=93.184.216.34 sport=51234 dport=443 src=93.184.216.34 dst=203.0.113.10 sport=443 dport=51234 [ASSURED] mark=0 zone=0 use=2";
    const CLI_UDP: &str = "udp      17 29 src=10.0.0.7 dst=10.0.0.1 sport=5353 dport=53 [UNREPLIED] src=10.0.0.1 dst=10.0.0.7 sport=53 dport=5353 mark=0 use=1";
    const PROC_ICMPV6: &str = "ipv6     10 icmpv6   58 29 src=fd00::5 dst=fd00::1 type=128 code=0 id=7 src=fd00::1 dst=fd00::5 type=129 code=0 id=7 mark=0 use=2";

    #[test]
    fn proc_entry() {
        let flow = parse_line(PROC_TCP).unwrap();

        assert_eq!(
            Flow::new(
                Protocol::Tcp,
                AddressTuple::new(Ipv4Addr::new(192, 168, 1, 5), Ipv4Addr::new(93, 184, 216, 34))
                    .with_ports(51234, 443),
                AddressTuple::new(Ipv4Addr::new(93, 184, 216, 34), Ipv4Addr::new(203, 0, 113, 10))
                    .with_ports(443, 51234),
            )
            .with_state("ESTABLISHED")
            .with_timeout(431999),
            flow
        );
    }

    #[test]
    fn conntrack_tool_entry() {
        let flow = parse_line(CLI_UDP).unwrap();

        assert_eq!(Protocol::Udp, flow.protocol);
        assert_eq!(None, flow.state);
        assert_eq!(Some(29), flow.timeout);
        assert_eq!(IpAddr::from(Ipv4Addr::new(10, 0, 0, 1)), flow.reply.source);
        assert_eq!(Some(5353), flow.reply.destination_port);
    }

    #[test]
    fn portless_entry() {
        let flow = parse_line(PROC_ICMPV6).unwrap();

        assert_eq!(Protocol::Icmpv6, flow.protocol);
        assert_eq!(
            AddressTuple::new(
                "fd00::1".parse::<Ipv6Addr>().unwrap(),
                "fd00::5".parse::<Ipv6Addr>().unwrap()
            ),
            flow.reply
        );
    }

    #[test]
    fn unknown_protocol_number() {
        let flow =
            parse_line("unknown  47 599 src=10.0.0.1 dst=10.0.0.2 src=10.0.0.2 dst=10.0.0.1")
                .unwrap();
        assert_eq!(Protocol::Other(47), flow.protocol);
    }

    #[test]
    fn malformed_entries() {
        assert_eq!(
            Err(ParseError::Protocol),
            parse_line("gre 47 src=10.0.0.1 dst=10.0.0.2")
        );
        assert_eq!(
            Err(ParseError::Incomplete("reply")),
            parse_line("tcp 6 10 SYN_SENT src=10.0.0.1 dst=10.0.0.2 sport=1 dport=2")
        );
        assert_eq!(
            Err(ParseError::Incomplete("original")),
            parse_line("tcp 6 10 src=10.0.0.1 src=10.0.0.2 dst=10.0.0.1")
        );
        assert_eq!(
            Err(ParseError::Addr("10.0.0".to_owned())),
            parse_line("udp 17 10 src=10.0.0 dst=10.0.0.2")
        );
        assert_eq!(
            Err(ParseError::Port("70000".to_owned())),
            parse_line("udp 17 10 src=10.0.0.1 dst=10.0.0.2 sport=70000")
        );
    }

    #[test]
    fn state_with_digit() {
        let flow = parse_line(
            "tcp 6 118 SYN_SENT2 src=10.0.0.7 dst=10.0.0.1 sport=40000 dport=22 src=10.0.0.1 dst=10.0.0.7 sport=22 dport=40000",
        )
        .unwrap();
        assert_eq!(Some("SYN_SENT2".to_owned()), flow.state);

        assert!(!is_state("2SYN"));
        assert!(!is_state("[ASSURED]"));
    }

    #[test]
    fn without_number_columns() {
        let flow =
            parse_line("udp src=10.0.0.7 dst=10.0.0.1 src=10.0.0.1 dst=10.0.0.7").unwrap();

        assert_eq!(Protocol::Udp, flow.protocol);
        assert_eq!(None, flow.timeout);
        assert_eq!(IpAddr::from(Ipv4Addr::new(10, 0, 0, 7)), flow.original.source);
        assert_eq!(IpAddr::from(Ipv4Addr::new(10, 0, 0, 7)), flow.reply.destination);
    }

    #[test]
    fn read_skips_non_utf8_lines() {
        let mut dump = Vec::new();
        dump.extend_from_slice(PROC_TCP.as_bytes());
        dump.extend_from_slice(b"\ntcp 6 10 \xff\xfe src=10.0.0.1\n");
        dump.extend_from_slice(CLI_UDP.as_bytes());
        dump.push(b'\n');

        let flows = read_flows(dump.as_slice()).unwrap();

        assert_eq!(2, flows.len());
        assert_eq!(Protocol::Tcp, flows[0].protocol);
        assert_eq!(Protocol::Udp, flows[1].protocol);
    }

    #[test]
    fn read_skips_bad_lines() {
        let dump = format!("{PROC_TCP}\n\ngarbage\n{CLI_UDP}\n{PROC_ICMPV6}\n");
        let flows = read_flows(dump.as_bytes()).unwrap();

        assert_eq!(3, flows.len());
        assert_eq!(Protocol::Tcp, flows[0].protocol);
        assert_eq!(Protocol::Udp, flows[1].protocol);
        assert_eq!(Protocol::Icmpv6, flows[2].protocol);
    }
}
