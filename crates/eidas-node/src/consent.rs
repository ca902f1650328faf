//! Citizen consent and attribute completeness.

use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};

use eidas_saml::{AttributeRegistry, ImmutableAttributeMap, PersonType};

/// Attribute names the citizen agreed to release.
///
/// The two sets are disjoint: an attribute lands in `mandatory` when the
/// request flags it required, in `optional` otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CitizenConsent {
    mandatory: BTreeSet<String>,
    optional: BTreeSet<String>,
}

impl CitizenConsent {
    /// Creates an empty consent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records consent for a mandatory attribute.
    pub fn set_mandatory_attribute(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.optional.remove(&name);
        self.mandatory.insert(name);
    }

    /// Records consent for an optional attribute.
    pub fn set_optional_attribute(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.mandatory.contains(&name) {
            self.optional.insert(name);
        }
    }

    /// Names of consented mandatory attributes.
    #[must_use]
    pub fn mandatory(&self) -> &BTreeSet<String> {
        &self.mandatory
    }

    /// Names of consented optional attributes.
    #[must_use]
    pub fn optional(&self) -> &BTreeSet<String> {
        &self.optional
    }
}

/// Builds the consent from the parameters posted by the consent form.
///
/// The form posts one parameter per ticked attribute, named by the
/// attribute's name URI.
#[must_use]
pub fn build_consent(
    web_params: &HashMap<String, String>,
    requested: &ImmutableAttributeMap,
) -> CitizenConsent {
    let mut consent = CitizenConsent::new();
    for definition in requested.definitions() {
        if !web_params.contains_key(&definition.name_uri) {
            continue;
        }
        if definition.required {
            consent.set_mandatory_attribute(definition.name_uri.clone());
        } else {
            consent.set_optional_attribute(definition.name_uri.clone());
        }
    }
    consent
}

/// Returns the name of the first required attribute the citizen did not
/// consent to, if any.
#[must_use]
pub fn missing_mandatory_consent<'a>(
    consent: &CitizenConsent,
    requested: &'a ImmutableAttributeMap,
) -> Option<&'a str> {
    requested
        .definitions()
        .filter(|definition| definition.required)
        .find(|definition| !consent.mandatory.contains(&definition.name_uri))
        .map(|definition| definition.name_uri.as_str())
}

/// Keeps every required attribute and the optional ones in the consent.
///
/// Returns the input itself when nothing is removed.
#[must_use]
pub fn filter_consented<'a>(
    consent: &CitizenConsent,
    attributes: &'a ImmutableAttributeMap,
) -> Cow<'a, ImmutableAttributeMap> {
    let keep = |required: bool, name: &str| required || consent.optional.contains(name);
    if attributes
        .definitions()
        .all(|definition| keep(definition.required, &definition.name_uri))
    {
        return Cow::Borrowed(attributes);
    }
    Cow::Owned(attributes.filtered(|definition| keep(definition.required, &definition.name_uri)))
}

/// Returns true if every attribute required by the request has a value.
#[must_use]
pub fn check_mandatory_attributes(
    requested: &ImmutableAttributeMap,
    response: &ImmutableAttributeMap,
) -> bool {
    requested
        .definitions()
        .filter(|definition| definition.required)
        .all(|definition| response.has_value(&definition.name_uri))
}

/// Returns true if the minimum data set is complete.
///
/// For every person type present in `attributes`, each attribute the
/// registry flags required for that type must have a non-empty value.
#[must_use]
pub fn check_mandatory_attribute_set(
    registry: &AttributeRegistry,
    attributes: &ImmutableAttributeMap,
) -> bool {
    if attributes.is_empty() {
        return false;
    }
    let person_types: HashSet<PersonType> = attributes
        .definitions()
        .map(|definition| definition.person_type)
        .collect();
    person_types.into_iter().all(|person_type| {
        registry
            .minimum_data_set(person_type)
            .all(|definition| attributes.has_value(&definition.name_uri))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use eidas_saml::AttributeDefinition;
    use proptest::prelude::*;

    const NATURAL: &str = "http://eidas.europa.eu/attributes/naturalperson/";

    fn registry() -> AttributeRegistry {
        AttributeRegistry::eidas()
    }

    fn definition(name: &str) -> AttributeDefinition {
        registry()
            .get(&format!("{NATURAL}{name}"))
            .cloned()
            .unwrap()
    }

    fn requested() -> ImmutableAttributeMap {
        ImmutableAttributeMap::of_definitions([
            definition("PersonIdentifier"),
            definition("CurrentFamilyName"),
            definition("BirthName"),
            definition("PlaceOfBirth"),
        ])
    }

    fn params(names: &[&str]) -> HashMap<String, String> {
        names
            .iter()
            .map(|name| (format!("{NATURAL}{name}"), "on".to_string()))
            .collect()
    }

    #[test]
    fn consent_splits_required_and_optional() {
        let consent = build_consent(
            &params(&["PersonIdentifier", "BirthName", "Gender"]),
            &requested(),
        );
        assert_eq!(
            consent.mandatory().iter().collect::<Vec<_>>(),
            vec![&format!("{NATURAL}PersonIdentifier")]
        );
        assert_eq!(
            consent.optional().iter().collect::<Vec<_>>(),
            vec![&format!("{NATURAL}BirthName")]
        );
    }

    #[test]
    fn missing_mandatory_consent_is_reported() {
        let requested = requested();
        let consent = build_consent(&params(&["PersonIdentifier"]), &requested);
        assert_eq!(
            missing_mandatory_consent(&consent, &requested),
            Some(format!("{NATURAL}CurrentFamilyName").as_str())
        );

        let consent = build_consent(&params(&["PersonIdentifier", "CurrentFamilyName"]), &requested);
        assert_eq!(missing_mandatory_consent(&consent, &requested), None);
    }

    #[test]
    fn unchanged_map_is_borrowed() {
        let requested = requested();
        let consent = build_consent(
            &params(&["PersonIdentifier", "CurrentFamilyName", "BirthName", "PlaceOfBirth"]),
            &requested,
        );
        assert!(matches!(filter_consented(&consent, &requested), Cow::Borrowed(_)));

        let consent = build_consent(&params(&["BirthName"]), &requested);
        let filtered = filter_consented(&consent, &requested);
        assert!(matches!(filtered, Cow::Owned(_)));
        assert_eq!(filtered.len(), 3);
        assert!(!filtered.contains(&format!("{NATURAL}PlaceOfBirth")));
    }

    #[test]
    fn requested_mandatory_attributes() {
        let response = ImmutableAttributeMap::builder()
            .put_text(definition("PersonIdentifier"), "CA/CC/123")
            .put_text(definition("CurrentFamilyName"), "  ")
            .build();
        assert!(!check_mandatory_attributes(&requested(), &response));

        let response = ImmutableAttributeMap::builder()
            .put_text(definition("PersonIdentifier"), "CA/CC/123")
            .put_text(definition("CurrentFamilyName"), "Garcia")
            .build();
        assert!(check_mandatory_attributes(&requested(), &response));
    }

    #[test]
    fn minimum_data_set_per_person_type() {
        let natural = ImmutableAttributeMap::builder()
            .put_text(definition("PersonIdentifier"), "CA/CC/123")
            .put_text(definition("CurrentFamilyName"), "Garcia")
            .put_text(definition("CurrentGivenName"), "Javier")
            .put(
                definition("DateOfBirth"),
                vec![definition("DateOfBirth").unmarshal("1965-01-01").unwrap()],
            )
            .build();
        assert!(check_mandatory_attribute_set(&registry(), &natural));

        let legal_name = registry()
            .get("http://eidas.europa.eu/attributes/legalperson/LegalName")
            .cloned()
            .unwrap();
        let mixed = ImmutableAttributeMap::builder()
            .put(legal_name, Vec::new())
            .build();
        assert!(!check_mandatory_attribute_set(&registry(), &mixed));
        assert!(!check_mandatory_attribute_set(&registry(), &ImmutableAttributeMap::new()));

        let incomplete = natural.filtered(|d| d.friendly_name != "DateOfBirth");
        assert!(!check_mandatory_attribute_set(&registry(), &incomplete));
    }

    proptest! {
        #[test]
        fn filtering_keeps_required_and_consented(mask in prop::collection::vec(any::<bool>(), 4)) {
            let requested = requested();
            let ticked: Vec<&str> = ["PersonIdentifier", "CurrentFamilyName", "BirthName", "PlaceOfBirth"]
                .into_iter()
                .zip(&mask)
                .filter(|(_, ticked)| **ticked)
                .map(|(name, _)| name)
                .collect();
            let consent = build_consent(&params(&ticked), &requested);
            let filtered = filter_consented(&consent, &requested);

            for definition in requested.definitions() {
                let kept = filtered.contains(&definition.name_uri);
                if definition.required {
                    prop_assert!(kept);
                } else {
                    prop_assert_eq!(kept, consent.optional().contains(&definition.name_uri));
                }
            }
        }
    }
}
