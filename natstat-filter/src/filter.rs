use log::debug;

use crate::{Category, Classifier, Filterable};

/// Lazy counterpart of [`Classifier::filter`].
pub struct FilterIter<'a, I> {
    classifier: &'a Classifier,
    mask: Category,
    inner: I,
}

impl<I> Iterator for FilterIter<'_, I>
where
    I: Iterator,
    I::Item: Filterable,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        if self.mask.is_empty() {
            return None;
        }

        let (classifier, mask) = (self.classifier, self.mask);
        self.inner.find(|f| classifier.matches(f, mask))
    }
}

impl Classifier {
    /// Keeps the flows falling in at least one of the categories of `mask`.
    ///
    /// The result is a subsequence of `flows`: order is preserved and nothing
    /// is deduplicated. An empty mask selects nothing.
    pub fn filter<F: Filterable + Clone>(&self, flows: &[F], mask: Category) -> Vec<F> {
        let selected: Vec<F> = self.filter_iter(flows, mask).cloned().collect();

        debug!(
            "{}: {} out of {} flows",
            mask,
            selected.len(),
            flows.len()
        );

        selected
    }

    /// Same selection as [`Classifier::filter`], evaluated lazily.
    pub fn filter_iter<I>(&self, flows: I, mask: Category) -> FilterIter<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: Filterable,
    {
        FilterIter {
            classifier: self,
            mask,
            inner: flows.into_iter(),
        }
    }

    pub fn filter_snat<F: Filterable + Clone>(&self, flows: &[F]) -> Vec<F> {
        self.filter(flows, Category::SNAT)
    }

    pub fn filter_dnat<F: Filterable + Clone>(&self, flows: &[F]) -> Vec<F> {
        self.filter(flows, Category::DNAT)
    }

    pub fn filter_routed<F: Filterable + Clone>(&self, flows: &[F]) -> Vec<F> {
        self.filter(flows, Category::ROUTED)
    }

    pub fn filter_local<F: Filterable + Clone>(&self, flows: &[F]) -> Vec<F> {
        self.filter(flows, Category::LOCAL)
    }
}

#[cfg(test)]
mod tests {
    use natstat_common::Flow;
    use pretty_assertions::assert_eq;

    use crate::{
        classify::tests::{flow, lan_host, scenario_a, scenario_b, scenario_c},
        LocalAddrs,
    };

    use super::*;

    fn scenario_d() -> Flow {
        flow(
            ("192.168.2.5", "192.168.2.10"),
            ("192.168.2.10", "192.168.2.5"),
        )
    }

    fn flows() -> Vec<Flow> {
        vec![scenario_a(), scenario_b(), scenario_c(), scenario_d()]
    }

    fn masks() -> impl Iterator<Item = Category> {
        (0..=Category::all().bits()).map(Category::from_bits_truncate)
    }

    fn is_subsequence(sub: &[Flow], of: &[Flow]) -> bool {
        let mut of = of.iter();
        sub.iter().all(|f| of.any(|g| g == f))
    }

    #[test]
    fn nat_mask_keeps_nat_flows_in_order() {
        let classifier = Classifier::new(lan_host());

        assert_eq!(
            vec![scenario_a(), scenario_b()],
            classifier.filter(&flows(), Category::SNAT | Category::DNAT)
        );
    }

    #[test]
    fn single_category_wrappers() {
        let classifier = Classifier::new(lan_host());
        let flows = flows();

        assert_eq!(vec![scenario_a()], classifier.filter_snat(&flows));
        assert_eq!(vec![scenario_b()], classifier.filter_dnat(&flows));
        assert_eq!(vec![scenario_c()], classifier.filter_local(&flows));
        assert_eq!(vec![scenario_d()], classifier.filter_routed(&flows));
    }

    #[test]
    fn empty_input_or_mask() {
        for classifier in [
            Classifier::new(LocalAddrs::empty()),
            Classifier::new(lan_host()),
            Classifier::without_local_addrs(),
        ] {
            for mask in masks() {
                assert!(classifier.filter::<Flow>(&[], mask).is_empty());
            }
            assert!(classifier.filter(&flows(), Category::empty()).is_empty());
            assert_eq!(0, classifier.filter_iter(&flows(), Category::empty()).count());
        }
    }

    #[test]
    fn unknown_local_addrs_keep_nat_only() {
        let classifier = Classifier::without_local_addrs();
        let flows = flows();

        assert!(classifier.filter_local(&flows).is_empty());
        assert!(classifier.filter_routed(&flows).is_empty());
        assert_eq!(
            vec![scenario_a(), scenario_b()],
            classifier.filter(&flows, Category::all())
        );
    }

    #[test]
    fn every_mask_yields_ordered_subsequence() {
        let classifier = Classifier::new(lan_host());
        let mut flows = flows();
        flows.extend(flows.clone().into_iter().rev());

        for mask in masks() {
            let selected = classifier.filter(&flows, mask);

            assert!(is_subsequence(&selected, &flows), "{mask}");
            assert!(selected.iter().all(|f| classifier.matches(f, mask)));
            assert_eq!(
                flows.iter().filter(|f| classifier.matches(*f, mask)).count(),
                selected.len()
            );
        }
    }

    #[test]
    fn idempotent() {
        let classifier = Classifier::new(lan_host());
        let flows = flows();

        for mask in masks() {
            let once = classifier.filter(&flows, mask);
            assert_eq!(once, classifier.filter(&once, mask), "{mask}");
        }
    }

    #[test]
    fn no_dedup() {
        let classifier = Classifier::new(lan_host());
        let flows = vec![scenario_a(), scenario_a()];

        assert_eq!(flows, classifier.filter(&flows, Category::all()));
    }

    #[test]
    fn lazy_matches_eager() {
        let classifier = Classifier::new(lan_host());
        let flows = flows();

        for mask in masks() {
            let lazy: Vec<&Flow> = classifier.filter_iter(&flows, mask).collect();
            let eager = classifier.filter(&flows, mask);
            assert_eq!(eager.iter().collect::<Vec<_>>(), lazy);
        }
    }
}
