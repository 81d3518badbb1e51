use std::{fmt, str::FromStr};

use peg::{error::ParseError, str::LineCol};

use crate::frontend::parser;

bitflags::bitflags! {
    /// NAT categories a flow can be selected by.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Category: u8 {
        /// Source address rewritten on the way out.
        const SNAT = 1 << 0;
        /// Destination address rewritten on the way in.
        const DNAT = 1 << 1;
        /// No rewriting, no local endpoint.
        const ROUTED = 1 << 2;
        /// No rewriting, at least one local endpoint.
        const LOCAL = 1 << 3;

        const NAT = Self::SNAT.bits() | Self::DNAT.bits();
    }
}

impl Category {
    /// Name of a single category flag.
    pub fn name(&self) -> Option<&'static str> {
        [
            (Self::SNAT, "snat"),
            (Self::DNAT, "dnat"),
            (Self::ROUTED, "routed"),
            (Self::LOCAL, "local"),
        ]
        .into_iter()
        .find_map(|(flag, name)| (flag == *self).then_some(name))
    }
}

impl Default for Category {
    fn default() -> Self {
        Self::NAT
    }
}

impl FromStr for Category {
    type Err = ParseError<LineCol>;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parser::categories(s)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("-");
        }

        let mut sep = "";
        for flag in self.iter() {
            if let Some(name) = flag.name() {
                write!(f, "{sep}{name}")?;
                sep = "|";
            }
        }
        Ok(())
    }
}
