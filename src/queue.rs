use crate::error::TaskError;
use crate::outlet::{compare, Flag, NewsOutlet};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Groups outlets by name and keeps the highest-ranked one of each group. On a
/// tie the later outlet wins.
pub fn dedup_by_name(queue: Vec<NewsOutlet>) -> BTreeMap<String, NewsOutlet> {
    let mut relevant: BTreeMap<String, NewsOutlet> = BTreeMap::new();
    for outlet in queue {
        let outranked = relevant
            .get(outlet.name())
            .is_some_and(|kept| compare(&outlet, kept) == Ordering::Less);
        if !outranked {
            relevant.insert(outlet.name().to_string(), outlet);
        }
    }
    relevant
}

/// One outlet per distinct name, in name order.
pub fn filter_dedup(queue: Vec<NewsOutlet>) -> Vec<NewsOutlet> {
    dedup_by_name(queue).into_values().collect()
}

/// Returns `(remaining, bypassed)`: outlets still missing `flag`, and those that
/// already have it and skip the stage.
pub fn split_by_flag(queue: Vec<NewsOutlet>, flag: Flag) -> (Vec<NewsOutlet>, Vec<NewsOutlet>) {
    let (bypassed, remaining) = queue.into_iter().partition(|outlet| outlet.has(flag));
    (remaining, bypassed)
}

pub fn split_by_flag_name(queue: Vec<NewsOutlet>, flag: &str) -> Result<(Vec<NewsOutlet>, Vec<NewsOutlet>), TaskError> {
    Ok(split_by_flag(queue, flag.parse()?))
}

/// Bypassed outlets first, then the processed ones.
pub fn merge_bypass(remaining: Vec<NewsOutlet>, mut bypassed: Vec<NewsOutlet>) -> Vec<NewsOutlet> {
    bypassed.extend(remaining);
    bypassed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outlet::OutletKind;
    use crate::source::Engine;
    use std::collections::HashSet;

    fn outlet(name: &str, flags: usize) -> NewsOutlet {
        let kind = if flags % 2 == 0 { OutletKind::Newspaper } else { OutletKind::TvChannel };
        let mut o = NewsOutlet::new(name, kind);
        if flags > 0 { o.set_country("country1"); }
        if flags > 1 { o.set_raw_readership(1234); }
        if flags > 2 { o.set_normalized_readership(12340); }
        if flags > 3 { o.set_engine_name(Engine::Google, name); }
        if flags > 4 { o.set_engine_name(Engine::Bing, name); }
        o
    }

    fn mixed_queue() -> Vec<NewsOutlet> {
        let mut queue = Vec::new();
        for (i, flags) in [0, 1, 2, 3, 4, 5, 2, 3].iter().enumerate() {
            queue.push(outlet(&format!("site{}", i), *flags));
        }
        queue.push(outlet("site0", 3));
        queue.push(outlet("site5", 1));
        queue.push(outlet("site6", 2));
        queue
    }

    fn count_flag(queue: &[NewsOutlet], flag: Flag) -> usize {
        queue.iter().filter(|o| o.has(flag)).count()
    }

    #[test]
    fn dedup_keeps_one_best_entry_per_name() {
        let queue = mixed_queue();
        let names: HashSet<String> = queue.iter().map(|o| o.name().to_string()).collect();
        let index = dedup_by_name(queue);
        assert_eq!(index.len(), names.len());
        assert_eq!(index["site0"].completeness().count(), 3);
        assert_eq!(index["site5"].completeness().count(), 5);
        assert_eq!(index["site6"].completeness().count(), 2);

        let filtered = filter_dedup(mixed_queue());
        assert_eq!(filtered.len(), 8);
    }

    #[test]
    fn dedup_breaks_ties_on_date_then_readers() {
        let mut old = outlet("dup", 3);
        old.set_last_edited("01 January 2019");
        let mut new = outlet("dup", 3);
        new.set_last_edited("01 January 2021");
        let kept = filter_dedup(vec![new.clone(), old.clone()]);
        assert_eq!(kept, vec![new.clone()]);
        assert_eq!(filter_dedup(vec![old, new.clone()]), vec![new.clone()]);

        let mut bigger = new.clone();
        bigger.set_normalized_readership(99_999);
        assert_eq!(filter_dedup(vec![bigger.clone(), new]), vec![bigger]);
    }

    #[test]
    fn split_partitions_by_flag() {
        for flag in Flag::ALL {
            let queue = mixed_queue();
            let total = queue.len();
            let expected = count_flag(&queue, flag);
            let (remaining, bypassed) = split_by_flag(queue, flag);
            assert_eq!(remaining.len() + bypassed.len(), total);
            assert_eq!(bypassed.len(), expected);
            assert!(bypassed.iter().all(|o| o.has(flag)));
            assert!(remaining.iter().all(|o| !o.has(flag)));
        }
    }

    #[test]
    fn split_by_name_rejects_unknown_flag() {
        let (remaining, bypassed) = split_by_flag_name(mixed_queue(), "readers").unwrap();
        assert_eq!(bypassed.len(), count_flag(&mixed_queue(), Flag::NormalizedReadership));
        assert!(!remaining.is_empty());
        assert!(split_by_flag_name(mixed_queue(), "wiki_url").is_err());
    }

    #[test]
    fn merge_puts_bypass_first_and_keeps_everything() {
        let a = vec![outlet("a", 1), outlet("b", 2)];
        let b = vec![outlet("c", 5)];
        let merged = merge_bypass(a, b);
        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].name(), "c");
        for flag in Flag::ALL {
            let expected = [1usize, 2, 5].iter().filter(|n| outlet("x", **n).has(flag)).count();
            assert_eq!(count_flag(&merged, flag), expected);
        }
    }
}
