//! Order-independent comparison of domain name sets.

/// Returns `true` if `requested` and `actual` hold the same names, ignoring
/// order.
///
/// Lengths are compared first and a mismatch returns immediately. Otherwise
/// sorted copies of both sides are compared element by element, so duplicates
/// count: `["a", "a"]` does not equal `["a", "b"]`. Neither input is
/// modified.
pub fn equal_sets(requested: &[String], actual: &[String]) -> bool {
    if requested.len() != actual.len() {
        return false;
    }

    let mut requested: Vec<&str> = requested.iter().map(String::as_str).collect();
    let mut actual: Vec<&str> = actual.iter().map(String::as_str).collect();
    requested.sort_unstable();
    actual.sort_unstable();

    requested == actual
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_same_names_different_order() {
        assert!(equal_sets(
            &names(&["a.com", "b.com"]),
            &names(&["b.com", "a.com"])
        ));
    }

    #[test]
    fn test_length_mismatch() {
        assert!(!equal_sets(&names(&["a.com"]), &names(&["a.com", "b.com"])));
    }

    #[test]
    fn test_same_length_different_names() {
        // Equal length alone is not enough
        assert!(!equal_sets(&names(&["a.com"]), &names(&["b.com"])));
        assert!(!equal_sets(
            &names(&["a.com", "a.com"]),
            &names(&["a.com", "b.com"])
        ));
    }

    #[test]
    fn test_empty_sets() {
        assert!(equal_sets(&[], &[]));
        assert!(!equal_sets(&[], &names(&["a.com"])));
    }

    #[test]
    fn test_comparison_is_case_sensitive() {
        assert!(!equal_sets(&names(&["Example.com"]), &names(&["example.com"])));
    }

    #[test]
    fn test_inputs_are_not_reordered() {
        let requested = names(&["b.com", "a.com"]);
        let actual = names(&["a.com", "b.com"]);

        assert!(equal_sets(&requested, &actual));
        assert_eq!(requested, names(&["b.com", "a.com"]));
    }

    proptest! {
        #[test]
        fn prop_permutation_is_equal(mut domains in prop::collection::vec("[a-z]{1,8}\\.com", 0..8)) {
            let original = domains.clone();
            domains.reverse();
            prop_assert!(equal_sets(&original, &domains));
        }

        #[test]
        fn prop_extra_name_is_not_equal(
            domains in prop::collection::vec("[a-z]{1,8}\\.com", 0..8),
            extra in "[a-z]{1,8}\\.org",
        ) {
            let mut longer = domains.clone();
            longer.push(extra);
            prop_assert!(!equal_sets(&domains, &longer));
        }

        #[test]
        fn prop_replacing_a_name_is_not_equal(
            domains in prop::collection::btree_set("[a-z]{1,8}\\.com", 1..8),
            replacement in "[a-z]{1,8}\\.org",
        ) {
            let original: Vec<String> = domains.into_iter().collect();
            let mut changed = original.clone();
            changed[0] = replacement;
            prop_assert!(!equal_sets(&original, &changed));
        }
    }
}
