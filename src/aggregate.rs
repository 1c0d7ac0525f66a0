use crate::fetcher::PageResult;
use crate::parser::ListingRecord;

/// Ordered collection of every record produced during one run.
///
/// Pages are appended in the order they are pushed; records keep their
/// discovery order within a page. Nothing is deduplicated or filtered.
/// Page outcomes are counted by [`crate::fetcher::ScrapeStats`], not here.
#[derive(Debug, Default)]
pub struct FeedAggregator {
    records: Vec<ListingRecord>,
}

impl FeedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, page: PageResult) {
        self.records.extend(page.records);
    }

    pub fn records(&self) -> &[ListingRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Fold page results into one aggregator, preserving input order.
pub fn aggregate<I>(pages: I) -> FeedAggregator
where
    I: IntoIterator<Item = PageResult>,
{
    pages
        .into_iter()
        .fold(FeedAggregator::new(), |mut acc, page| {
            acc.push(page);
            acc
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::PageStatus;

    fn named(name: &str) -> ListingRecord {
        ListingRecord::new(None, Some(name.into()), None, None, None)
    }

    fn page(url: &str, status: PageStatus, names: &[&str]) -> PageResult {
        PageResult {
            url: url.into(),
            status,
            records: names.iter().map(|n| named(n)).collect(),
        }
    }

    #[test]
    fn concatenates_in_page_then_discovery_order() {
        let agg = aggregate(vec![
            page("a", PageStatus::Parsed, &["a1", "a2"]),
            page("b", PageStatus::TimedOut, &[]),
            page("c", PageStatus::Parsed, &["c1"]),
        ]);
        let names: Vec<_> = agg.records().iter().map(|r| r.name().unwrap()).collect();
        assert_eq!(names, vec!["a1", "a2", "c1"]);
        assert_eq!(agg.len(), 3);
    }

    #[test]
    fn duplicates_across_categories_are_kept() {
        let agg = aggregate(vec![
            page("a", PageStatus::Parsed, &["Crafter"]),
            page("b", PageStatus::Parsed, &["Crafter"]),
        ]);
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.records()[0], agg.records()[1]);
    }

    #[test]
    fn blank_records_are_kept() {
        let mut agg = FeedAggregator::new();
        agg.push(PageResult {
            url: "a".into(),
            status: PageStatus::Parsed,
            records: vec![ListingRecord::default()],
        });
        assert_eq!(agg.records(), &[ListingRecord::default()][..]);
    }

    #[test]
    fn nothing_in_nothing_out() {
        let agg = aggregate(Vec::new());
        assert!(agg.is_empty());
        assert_eq!(agg.len(), 0);
    }

    #[test]
    fn skipped_pages_only_add_their_records() {
        let agg = aggregate(vec![
            page("a", PageStatus::Failed("net::ERR_CONNECTION_RESET".into()), &[]),
            page("b", PageStatus::TimedOut, &[]),
        ]);
        assert!(agg.is_empty());
    }
}
