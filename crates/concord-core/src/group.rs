use std::collections::{BTreeMap, BTreeSet};

use crate::model::{CanonicalResultRecord, CombinationGroup, CombinationKey};

/// Partition records by (architecture, suite).
///
/// The key set is the union over every platform, so a combination seen on a
/// single platform still gets a group and can be reported as under-covered.
pub fn group_records<I>(records: I) -> BTreeMap<CombinationKey, CombinationGroup>
where
    I: IntoIterator<Item = CanonicalResultRecord>,
{
    let mut groups: BTreeMap<CombinationKey, CombinationGroup> = BTreeMap::new();
    for record in records {
        let key = record.key();
        groups
            .entry(key.clone())
            .or_insert_with(|| CombinationGroup { key, records: Vec::new() })
            .records
            .push(record);
    }
    // Input order must not leak into verdicts or evidence.
    for group in groups.values_mut() {
        group.records.sort();
        group.records.dedup();
    }
    groups
}

/// Sorted, de-duplicated platform names across all records.
pub fn observed_platforms<'a, I>(records: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a CanonicalResultRecord>,
{
    records
        .into_iter()
        .map(|r| r.platform.as_str().to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::PlatformName;
    use crate::model::Provenance;

    fn rec(platform: &str, arch: &str, suite: &str, sum: char) -> CanonicalResultRecord {
        CanonicalResultRecord {
            platform: PlatformName::from_str(platform),
            architecture: arch.into(),
            suite: suite.into(),
            checksum: std::iter::repeat(sum).take(64).collect(),
            claimed_reproducible: None,
            provenance: Provenance::default(),
        }
    }

    #[test]
    fn union_of_keys_across_platforms() {
        let groups = group_records(vec![
            rec("github", "amd64", "bookworm", 'a'),
            rec("gitlab", "amd64", "bookworm", 'a'),
            rec("gitlab", "i386", "bullseye", 'b'),
        ]);
        assert_eq!(groups.len(), 2);
        let single = &groups[&CombinationKey::new("i386", "bullseye")];
        assert_eq!(single.platforms().len(), 1);
        assert_eq!(groups[&CombinationKey::new("amd64", "bookworm")].records.len(), 2);
    }

    #[test]
    fn grouping_is_order_independent() {
        let a = vec![rec("b", "amd64", "trixie", '1'), rec("a", "amd64", "trixie", '2')];
        let mut b = a.clone();
        b.reverse();
        assert_eq!(group_records(a), group_records(b));
    }

    #[test]
    fn exact_duplicates_collapse() {
        let groups = group_records(vec![
            rec("github", "arm64", "trixie", 'c'),
            rec("github", "arm64", "trixie", 'c'),
        ]);
        assert_eq!(groups.values().next().unwrap().records.len(), 1);
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(group_records(Vec::new()).is_empty());
    }

    #[test]
    fn platforms_are_sorted_and_unique() {
        let records = vec![
            rec("gitlab", "amd64", "bookworm", 'a'),
            rec("github", "amd64", "bookworm", 'a'),
            rec("gitlab", "i386", "bookworm", 'a'),
        ];
        assert_eq!(observed_platforms(&records), vec!["github".to_string(), "gitlab".to_string()]);
    }
}
