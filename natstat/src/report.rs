use std::{
    collections::HashMap,
    io::{self, Write},
    net::IpAddr,
};

use fxhash::FxBuildHasher;
use log::trace;
use natstat_common::{AddressTuple, Flow};
use natstat_filter::Classifier;

const HEADER: [&str; 6] = [
    "Proto",
    "Original Source",
    "Original Destination",
    "Reply Source",
    "Reply Destination",
    "State",
];

/// Turns addresses into host names, remembering the answers for the run.
#[derive(Debug, Default)]
pub struct Resolver {
    numeric: bool,
    cache: HashMap<IpAddr, String, FxBuildHasher>,
}

impl Resolver {
    pub fn new(numeric: bool) -> Self {
        Self {
            numeric,
            cache: HashMap::default(),
        }
    }

    pub fn name(&mut self, ip: IpAddr) -> &str {
        let numeric = self.numeric;

        self.cache.entry(ip).or_insert_with(|| {
            if numeric {
                return ip.to_string();
            }

            dns_lookup::lookup_addr(&ip).unwrap_or_else(|e| {
                trace!("reverse lookup of {ip} failed: {e}");
                ip.to_string()
            })
        })
    }
}

/// Renders flows as an aligned table.
#[derive(Debug)]
pub struct Report {
    resolver: Resolver,
    categories: bool,
    header: bool,
}

impl Report {
    pub fn new(resolver: Resolver) -> Self {
        Self {
            resolver,
            categories: false,
            header: true,
        }
    }

    /// Adds a column with the NAT categories of each flow.
    pub fn categories(mut self, categories: bool) -> Self {
        self.categories = categories;
        self
    }

    pub fn header(mut self, header: bool) -> Self {
        self.header = header;
        self
    }

    pub fn write<'f, W: Write>(
        &mut self,
        out: &mut W,
        classifier: &Classifier,
        flows: impl IntoIterator<Item = &'f Flow>,
    ) -> io::Result<()> {
        let mut rows: Vec<Vec<String>> = Vec::new();

        if self.header {
            let mut header: Vec<String> = HEADER.iter().map(|h| h.to_string()).collect();
            if self.categories {
                header.push("NAT".to_owned());
            }
            rows.push(header);
        }

        for flow in flows {
            let mut row = vec![
                flow.protocol.to_string(),
                self.source(&flow.original),
                self.destination(&flow.original),
                self.source(&flow.reply),
                self.destination(&flow.reply),
                flow.state.clone().unwrap_or_default(),
            ];
            if self.categories {
                row.push(classifier.categories(flow).to_string());
            }
            rows.push(row);
        }

        let mut widths = vec![0; rows.first().map(Vec::len).unwrap_or_default()];
        for row in &rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.len());
            }
        }

        for row in &rows {
            let mut line = String::new();
            for (cell, &width) in row.iter().zip(&widths) {
                line.push_str(&format!("{cell:<width$}  "));
            }
            writeln!(out, "{}", line.trim_end())?;
        }

        Ok(())
    }

    fn source(&mut self, tuple: &AddressTuple) -> String {
        self.endpoint(tuple.source, tuple.source_port)
    }

    fn destination(&mut self, tuple: &AddressTuple) -> String {
        self.endpoint(tuple.destination, tuple.destination_port)
    }

    fn endpoint(&mut self, ip: IpAddr, port: Option<u16>) -> String {
        let name = self.resolver.name(ip);

        match (port, ip) {
            (None, _) => name.to_owned(),
            (Some(port), IpAddr::V6(_)) if name.contains(':') => format!("[{name}]:{port}"),
            (Some(port), _) => format!("{name}:{port}"),
        }
    }
}
