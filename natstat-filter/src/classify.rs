use log::trace;

use crate::{Category, Filterable, LocalAddrs};

/// Decides the NAT categories of flows.
///
/// All predicates compare the four addresses of a flow by exact equality:
/// `o.src`, `o.dst` for the original tuple and `r.src`, `r.dst` for the reply.
/// Only [`Classifier::is_local`] and [`Classifier::is_routed`] look at the
/// local addresses snapshot; without one, both are always false.
#[derive(Debug, Clone)]
pub struct Classifier {
    local: Option<LocalAddrs>,
}

impl Classifier {
    pub fn new(local: LocalAddrs) -> Self {
        Self { local: Some(local) }
    }

    /// A classifier for hosts whose addresses are unknown: no flow is local
    /// nor routed.
    pub fn without_local_addrs() -> Self {
        Self { local: None }
    }

    pub fn local_addrs(&self) -> Option<&LocalAddrs> {
        self.local.as_ref()
    }

    /// The reply targets another address than the initiator (the rewritten,
    /// outward facing one) while the destination is untouched.
    pub fn is_snat<F: Filterable>(&self, f: &F) -> bool {
        let (o, r) = (f.original(), f.reply());
        o.destination == r.source && o.source != r.destination
    }

    /// The reply goes back to the initiator but comes from another address
    /// than the one it targeted.
    pub fn is_dnat<F: Filterable>(&self, f: &F) -> bool {
        let (o, r) = (f.original(), f.reply());

        if o.source == r.destination && o.destination != r.source {
            return true;
        }

        // DNAT on a single interface, matched literally.
        o.source != r.source
            && o.source != r.destination
            && o.destination != r.source
            && o.destination == r.destination
    }

    /// No rewriting and at least one endpoint is a local address.
    pub fn is_local<F: Filterable>(&self, f: &F) -> bool {
        match &self.local {
            Some(local) => Self::is_untranslated(f) && Self::has_local_addr(local, f),
            None => false,
        }
    }

    /// No rewriting and none of the endpoints is a local address.
    pub fn is_routed<F: Filterable>(&self, f: &F) -> bool {
        match &self.local {
            Some(local) => Self::is_untranslated(f) && !Self::has_local_addr(local, f),
            None => false,
        }
    }

    /// Evaluates only the predicates requested by `mask`.
    pub fn matches<F: Filterable>(&self, f: &F, mask: Category) -> bool {
        (mask.contains(Category::SNAT) && self.is_snat(f))
            || (mask.contains(Category::DNAT) && self.is_dnat(f))
            || (mask.contains(Category::LOCAL) && self.is_local(f))
            || (mask.contains(Category::ROUTED) && self.is_routed(f))
    }

    /// Every category the flow falls in.
    pub fn categories<F: Filterable>(&self, f: &F) -> Category {
        let mut categories = Category::empty();
        categories.set(Category::SNAT, self.is_snat(f));
        categories.set(Category::DNAT, self.is_dnat(f));
        categories.set(Category::LOCAL, self.is_local(f));
        categories.set(Category::ROUTED, self.is_routed(f));

        trace!(
            "{} -> {} / {} -> {}: {}",
            f.original().source,
            f.original().destination,
            f.reply().source,
            f.reply().destination,
            categories
        );

        categories
    }

    #[inline]
    fn is_untranslated<F: Filterable>(f: &F) -> bool {
        let (o, r) = (f.original(), f.reply());
        o.source == r.destination && o.destination == r.source
    }

    fn has_local_addr<F: Filterable>(local: &LocalAddrs, f: &F) -> bool {
        let (o, r) = (f.original(), f.reply());
        [&o.source, &o.destination, &r.source, &r.destination]
            .into_iter()
            .any(|ip| local.contains(ip))
    }
}
