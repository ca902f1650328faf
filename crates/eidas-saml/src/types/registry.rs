//! The eIDAS attribute registry.
//!
//! Attributes flagged `required` here form the minimum data set of their
//! person type.

use super::attribute::{AttributeDefinition, PersonType, ValueType};

const NATURAL: &str = "http://eidas.europa.eu/attributes/naturalperson/";
const LEGAL: &str = "http://eidas.europa.eu/attributes/legalperson/";
const REPRESENTATIVE_NATURAL: &str =
    "http://eidas.europa.eu/attributes/naturalperson/representative/";
const REPRESENTATIVE_LEGAL: &str = "http://eidas.europa.eu/attributes/legalperson/representative/";

/// Set of attribute definitions known to the node.
#[derive(Debug, Clone)]
pub struct AttributeRegistry {
    definitions: Vec<AttributeDefinition>,
}

impl Default for AttributeRegistry {
    fn default() -> Self {
        Self::eidas()
    }
}

impl AttributeRegistry {
    /// Creates a registry from explicit definitions.
    #[must_use]
    pub fn new(definitions: Vec<AttributeDefinition>) -> Self {
        Self { definitions }
    }

    /// The eIDAS natural and legal person attributes.
    #[must_use]
    pub fn eidas() -> Self {
        let mut definitions = Vec::new();
        for (prefix, person_type) in [
            (NATURAL, PersonType::NaturalPerson),
            (REPRESENTATIVE_NATURAL, PersonType::RepresentativeNaturalPerson),
        ] {
            definitions.extend(natural_person(prefix, person_type));
        }
        for (prefix, person_type) in [
            (LEGAL, PersonType::LegalPerson),
            (REPRESENTATIVE_LEGAL, PersonType::RepresentativeLegalPerson),
        ] {
            definitions.extend(legal_person(prefix, person_type));
        }
        Self { definitions }
    }

    /// Looks up a definition by name URI.
    #[must_use]
    pub fn get(&self, name_uri: &str) -> Option<&AttributeDefinition> {
        self.definitions.iter().find(|d| d.name_uri == name_uri)
    }

    /// Iterates over every definition.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions.iter()
    }

    /// Iterates over the minimum data set of a person type.
    pub fn minimum_data_set(
        &self,
        person_type: PersonType,
    ) -> impl Iterator<Item = &AttributeDefinition> {
        self.definitions
            .iter()
            .filter(move |d| d.required && d.person_type == person_type)
    }
}

fn natural_person(prefix: &str, person_type: PersonType) -> Vec<AttributeDefinition> {
    let def = |name: &str, friendly: &str| {
        AttributeDefinition::new(format!("{prefix}{name}"), friendly, person_type)
    };
    vec![
        def("PersonIdentifier", "PersonIdentifier")
            .with_required(true)
            .with_unique_identifier()
            .with_max_length(256),
        def("CurrentFamilyName", "FamilyName").with_required(true),
        def("CurrentGivenName", "FirstName").with_required(true),
        def("DateOfBirth", "DateOfBirth")
            .with_required(true)
            .with_value_type(ValueType::Date),
        def("BirthName", "BirthName"),
        def("PlaceOfBirth", "PlaceOfBirth"),
        def("CurrentAddress", "CurrentAddress"),
        def("Gender", "Gender").with_value_type(ValueType::Gender),
    ]
}

fn legal_person(prefix: &str, person_type: PersonType) -> Vec<AttributeDefinition> {
    let def = |name: &str, friendly: &str| {
        AttributeDefinition::new(format!("{prefix}{name}"), friendly, person_type)
    };
    vec![
        def("LegalPersonIdentifier", "LegalPersonIdentifier")
            .with_required(true)
            .with_unique_identifier()
            .with_max_length(256),
        def("LegalName", "LegalName").with_required(true),
        def("LegalPersonAddress", "LegalAddress"),
        def("VATRegistrationNumber", "VATRegistration"),
        def("TaxReference", "TaxReference"),
        def("D-2012-17-EUIdentifier", "D-2012-17-EUIdentifier"),
        def("LEI", "LEI"),
        def("EORI", "EORI"),
        def("SEED", "SEED"),
        def("SIC", "SIC"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_minimum_data_set() {
        let registry = AttributeRegistry::eidas();
        let names: Vec<_> = registry
            .minimum_data_set(PersonType::NaturalPerson)
            .map(|d| d.friendly_name.as_str())
            .collect();
        assert_eq!(names, vec!["PersonIdentifier", "FamilyName", "FirstName", "DateOfBirth"]);
    }

    #[test]
    fn lookup_by_uri() {
        let registry = AttributeRegistry::eidas();
        let identifier = registry
            .get("http://eidas.europa.eu/attributes/legalperson/LegalPersonIdentifier")
            .unwrap();
        assert!(identifier.unique_identifier);
        assert_eq!(identifier.person_type, PersonType::LegalPerson);
        assert!(registry.get("urn:unknown").is_none());
    }

    #[test]
    fn representative_attributes_have_their_own_type() {
        let registry = AttributeRegistry::eidas();
        let rep = registry
            .get("http://eidas.europa.eu/attributes/naturalperson/representative/PersonIdentifier")
            .unwrap();
        assert_eq!(rep.person_type, PersonType::RepresentativeNaturalPerson);
    }
}
