//! Level of assurance comparator.
//!
//! Notified levels (`low`, `substantial`, `high`) are ordered; any other
//! value is a non-notified level that only compares by equality.

use std::collections::HashSet;

use eidas_saml::{AuthenticationRequest, LoaComparison, NotifiedLoa};

/// Returns true if `request_loa` is satisfied by a responder whose highest
/// level is `max_loa`.
///
/// Both values must be notified levels; anything else is invalid.
#[must_use]
pub fn is_loa_valid(_comparison: LoaComparison, request_loa: &str, max_loa: &str) -> bool {
    match (NotifiedLoa::from_uri(request_loa), NotifiedLoa::from_uri(max_loa)) {
        (Some(requested), Some(max)) => requested.numeric() <= max.numeric(),
        _ => false,
    }
}

/// Returns true if the first published level is the highest notified level
/// of the list.
#[must_use]
pub fn is_first_loa_highest_notified<S: AsRef<str>>(published: &[S]) -> bool {
    let highest = published
        .iter()
        .filter_map(|loa| NotifiedLoa::from_uri(loa.as_ref()))
        .max();
    match (highest, published.first()) {
        (Some(highest), Some(first)) => highest.uri() == first.as_ref(),
        _ => false,
    }
}

/// Returns true if `loas`, extended with every notified level above its
/// notified members, shares a value with `equal_or_better`.
#[must_use]
pub fn is_equal_or_better_loas<S: AsRef<str>, T: AsRef<str>>(
    loas: &[S],
    equal_or_better: &[T],
) -> bool {
    let mut accepted: HashSet<&str> = loas.iter().map(AsRef::as_ref).collect();
    for notified in loas.iter().filter_map(|loa| NotifiedLoa::from_uri(loa.as_ref())) {
        for higher in notified.and_higher() {
            accepted.insert(higher.uri());
        }
    }
    equal_or_better
        .iter()
        .any(|loa| accepted.contains(loa.as_ref()))
}

/// Returns true if the two lists share at least one value.
#[must_use]
pub fn has_common_loa<S: AsRef<str>, T: AsRef<str>>(first: &[S], second: &[T]) -> bool {
    let first: HashSet<&str> = first.iter().map(AsRef::as_ref).collect();
    second.iter().any(|loa| first.contains(loa.as_ref()))
}

/// Returns true if the asserted level is one of the requested levels.
#[must_use]
pub fn is_non_notified_loa_valid<S: AsRef<str>>(
    _comparison: LoaComparison,
    request_loas: &[S],
    response_loa: &str,
) -> bool {
    !response_loa.is_empty() && request_loas.iter().any(|loa| loa.as_ref() == response_loa)
}

/// Returns true if the node can satisfy the levels the request asks for.
///
/// A `minimum` request is served by any published level at or above one of
/// its levels; an `exact` request needs one of its levels to be published.
#[must_use]
pub fn is_request_loa_valid<S: AsRef<str>>(request: &AuthenticationRequest, published: &[S]) -> bool {
    if request.levels_of_assurance.is_empty() || published.is_empty() {
        return false;
    }
    match request.loa_comparison {
        LoaComparison::Minimum => is_equal_or_better_loas(&request.levels_of_assurance, published),
        LoaComparison::Exact => has_common_loa(&request.levels_of_assurance, published),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const LOW: &str = "http://eidas.europa.eu/LoA/low";
    const SUBSTANTIAL: &str = "http://eidas.europa.eu/LoA/substantial";
    const HIGH: &str = "http://eidas.europa.eu/LoA/high";
    const NON_NOTIFIED: &str = "http://eidas.europa.eu/LoA/NotNotified/low";

    fn request(loas: &[&str], comparison: LoaComparison) -> AuthenticationRequest {
        AuthenticationRequest::new("_loa", "https://connector.example/metadata")
            .with_levels_of_assurance(loas.iter().copied(), comparison)
    }

    #[test]
    fn minimum_comparison() {
        assert!(is_loa_valid(LoaComparison::Minimum, LOW, HIGH));
        assert!(is_loa_valid(LoaComparison::Minimum, HIGH, HIGH));
        assert!(!is_loa_valid(LoaComparison::Minimum, HIGH, SUBSTANTIAL));
        assert!(!is_loa_valid(LoaComparison::Minimum, NON_NOTIFIED, HIGH));
        assert!(!is_loa_valid(LoaComparison::Minimum, LOW, ""));
    }

    #[test]
    fn first_published_must_be_highest() {
        assert!(is_first_loa_highest_notified(&[HIGH, LOW, NON_NOTIFIED]));
        assert!(!is_first_loa_highest_notified(&[LOW, HIGH]));
        assert!(!is_first_loa_highest_notified(&[NON_NOTIFIED, HIGH]));
        assert!(!is_first_loa_highest_notified::<&str>(&[]));
    }

    #[test]
    fn equal_or_better_includes_higher_levels() {
        assert!(is_equal_or_better_loas(&[LOW], &[HIGH]));
        assert!(!is_equal_or_better_loas(&[HIGH], &[LOW, SUBSTANTIAL]));
        assert!(is_equal_or_better_loas(&[NON_NOTIFIED], &[NON_NOTIFIED]));
        assert!(!is_equal_or_better_loas(&[NON_NOTIFIED], &[LOW]));
    }

    #[test]
    fn equal_or_better_accepts_owned_levels() {
        let requested = vec![SUBSTANTIAL.to_string(), NON_NOTIFIED.to_string()];
        let published = vec![HIGH.to_string()];
        assert!(is_equal_or_better_loas(&requested, &published));
        assert!(!is_equal_or_better_loas(&requested, &[LOW.to_string()]));
    }

    #[test]
    fn common_loa() {
        assert!(has_common_loa(&[LOW, NON_NOTIFIED], &[NON_NOTIFIED]));
        assert!(!has_common_loa(&[LOW], &[HIGH]));
    }

    #[test]
    fn non_notified_matches_by_equality() {
        assert!(is_non_notified_loa_valid(LoaComparison::Exact, &[NON_NOTIFIED, LOW], LOW));
        assert!(!is_non_notified_loa_valid(LoaComparison::Exact, &[LOW], HIGH));
        assert!(!is_non_notified_loa_valid(LoaComparison::Exact, &[LOW], ""));
        assert!(!is_non_notified_loa_valid::<&str>(LoaComparison::Exact, &[], LOW));
    }

    #[test]
    fn request_levels_against_published() {
        let published = [SUBSTANTIAL, LOW];
        assert!(is_request_loa_valid(&request(&[LOW], LoaComparison::Minimum), &published));
        assert!(!is_request_loa_valid(&request(&[HIGH], LoaComparison::Minimum), &published));
        assert!(is_request_loa_valid(&request(&[LOW], LoaComparison::Exact), &published));
        assert!(!is_request_loa_valid(&request(&[HIGH, NON_NOTIFIED], LoaComparison::Exact), &published));
        assert!(!is_request_loa_valid(&request(&[], LoaComparison::Minimum), &published));
    }

    fn notified() -> impl Strategy<Value = NotifiedLoa> {
        prop::sample::select(NotifiedLoa::ALL.to_vec())
    }

    proptest! {
        #[test]
        fn minimum_is_monotonic(requested in notified(), max in notified()) {
            prop_assert_eq!(
                is_loa_valid(LoaComparison::Minimum, requested.uri(), max.uri()),
                requested.numeric() <= max.numeric()
            );
        }

        #[test]
        fn unparseable_levels_never_validate(garbage in "[a-z:/.]{0,40}", level in notified()) {
            prop_assume!(NotifiedLoa::from_uri(&garbage).is_none());
            prop_assert!(!is_loa_valid(LoaComparison::Minimum, &garbage, level.uri()));
            prop_assert!(!is_loa_valid(LoaComparison::Minimum, level.uri(), &garbage));
        }
    }
}
