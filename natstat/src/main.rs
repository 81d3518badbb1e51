use std::{
    fs::File,
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::Parser;
use log::{debug, info};

use natstat::{
    conntrack,
    report::{Report, Resolver},
};
use natstat_filter::{Category, Classifier, LocalAddrs};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Connection-tracking dump (`/proc/net/nf_conntrack` or `conntrack -L` output), `-` for stdin.
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Show source NAT connections.
    #[arg(short = 'S', long)]
    snat: bool,

    /// Show destination NAT connections.
    #[arg(short = 'D', long)]
    dnat: bool,

    /// Show routed connections (no NAT, no local endpoint).
    #[arg(short = 'R', long)]
    routed: bool,

    /// Show local connections (no NAT, at least one local endpoint).
    #[arg(short = 'L', long)]
    local: bool,

    /// Categories to show, e.g. `snat,local` or `nat or routed`.
    #[arg(short, long)]
    filter: Option<Category>,

    /// Do not resolve addresses to host names.
    #[arg(short, long)]
    numeric: bool,

    /// Add a column with the NAT categories of each connection.
    #[arg(short, long)]
    categories: bool,

    /// Do not print the header line.
    #[arg(long)]
    no_header: bool,

    /// Do not read the local interface addresses: local and routed connections are not reported.
    #[arg(long)]
    no_local_addrs: bool,
}

impl Args {
    /// Union of the requested categories, source and destination NAT when none is.
    fn mask(&self) -> Category {
        let mut mask = self.filter.unwrap_or(Category::empty());

        for (flag, category) in [
            (self.snat, Category::SNAT),
            (self.dnat, Category::DNAT),
            (self.routed, Category::ROUTED),
            (self.local, Category::LOCAL),
        ] {
            if flag {
                mask |= category;
            }
        }

        if mask.is_empty() {
            Category::default()
        } else {
            mask
        }
    }
}

fn open(path: &Path) -> Result<Box<dyn BufRead>, anyhow::Error> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin().lock()));
    }

    let file = File::open(path).with_context(|| format!("cannot open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::init();

    let args = Args::parse();

    let classifier = if args.no_local_addrs {
        info!("local addresses disabled, no connection is local nor routed");
        Classifier::without_local_addrs()
    } else {
        let local =
            LocalAddrs::from_host_interfaces().context("cannot snapshot local addresses")?;
        Classifier::new(local)
    };

    let flows = conntrack::read_flows(open(&args.input)?)
        .with_context(|| format!("cannot read {}", args.input.display()))?;

    let mask = args.mask();
    debug!("showing {}", mask);

    let mut report = Report::new(Resolver::new(args.numeric))
        .categories(args.categories)
        .header(!args.no_header);

    let mut out = io::stdout().lock();
    report.write(&mut out, &classifier, classifier.filter_iter(&flows, mask))?;
    out.flush()?;

    Ok(())
}
