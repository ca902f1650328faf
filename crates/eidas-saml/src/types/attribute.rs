//! Attribute definitions, typed values and the immutable attribute map.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{SamlError, SamlResult};

/// Kind of person an attribute describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PersonType {
    /// Natural person.
    NaturalPerson,
    /// Legal person.
    LegalPerson,
    /// Natural person acting as representative.
    RepresentativeNaturalPerson,
    /// Legal person acting as representative.
    RepresentativeLegalPerson,
}

/// Marshaller selecting how values are converted to and from strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Free text.
    String,
    /// Calendar date, `YYYY-MM-DD`.
    Date,
    /// Gender code.
    Gender,
}

/// Gender attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    /// `Male`
    Male,
    /// `Female`
    Female,
    /// `Unspecified`
    Unspecified,
    /// `Not Specified`, used by protocol versions 1.1 and 1.2.
    NotSpecified,
}

impl Gender {
    /// Returns the wire value.
    #[must_use]
    pub const fn value(self) -> &'static str {
        match self {
            Self::Male => "Male",
            Self::Female => "Female",
            Self::Unspecified => "Unspecified",
            Self::NotSpecified => "Not Specified",
        }
    }

    /// Parses a wire value.
    #[must_use]
    pub fn from_value(value: &str) -> Option<Self> {
        match value {
            "Male" => Some(Self::Male),
            "Female" => Some(Self::Female),
            "Unspecified" => Some(Self::Unspecified),
            "Not Specified" => Some(Self::NotSpecified),
            _ => None,
        }
    }
}

/// A typed attribute value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeValue {
    /// Text value.
    Text(String),
    /// Date value.
    Date(NaiveDate),
    /// Gender value.
    Gender(Gender),
}

impl AttributeValue {
    /// Returns true for a text value that is blank.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Text(text) if text.trim().is_empty())
    }

    /// Returns the text content, if this is a text value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => f.write_str(text),
            Self::Date(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Gender(gender) => f.write_str(gender.value()),
        }
    }
}

/// Describes one exchangeable attribute.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeDefinition {
    /// Name URI.
    pub name_uri: String,
    /// Friendly name.
    pub friendly_name: String,
    /// Person type.
    pub person_type: PersonType,
    /// Whether the attribute is mandatory.
    pub required: bool,
    /// Whether the attribute uniquely identifies the person.
    pub unique_identifier: bool,
    /// Value marshaller.
    pub value_type: ValueType,
    /// Upper bound on the marshalled value length.
    pub max_length: Option<usize>,
}

impl AttributeDefinition {
    /// Creates an optional, non-identifying text attribute.
    #[must_use]
    pub fn new(
        name_uri: impl Into<String>,
        friendly_name: impl Into<String>,
        person_type: PersonType,
    ) -> Self {
        Self {
            name_uri: name_uri.into(),
            friendly_name: friendly_name.into(),
            person_type,
            required: false,
            unique_identifier: false,
            value_type: ValueType::String,
            max_length: None,
        }
    }

    /// Sets the required flag.
    #[must_use]
    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Marks the attribute as a unique identifier.
    #[must_use]
    pub fn with_unique_identifier(mut self) -> Self {
        self.unique_identifier = true;
        self
    }

    /// Sets the value marshaller.
    #[must_use]
    pub fn with_value_type(mut self, value_type: ValueType) -> Self {
        self.value_type = value_type;
        self
    }

    /// Sets the maximum marshalled length.
    #[must_use]
    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    /// Converts a typed value to its string form.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::AttributeMarshalling`] if the value does not
    /// match this attribute's value type.
    pub fn marshal(&self, value: &AttributeValue) -> SamlResult<String> {
        match (self.value_type, value) {
            (ValueType::String, AttributeValue::Text(_))
            | (ValueType::Date, AttributeValue::Date(_))
            | (ValueType::Gender, AttributeValue::Gender(_)) => Ok(value.to_string()),
            _ => Err(SamlError::AttributeMarshalling(format!(
                "value type mismatch for {}",
                self.friendly_name
            ))),
        }
    }

    /// Converts a string to a typed value.
    ///
    /// # Errors
    ///
    /// Returns [`SamlError::AttributeMarshalling`] if the string is not a
    /// valid value of this attribute's type.
    pub fn unmarshal(&self, value: &str) -> SamlResult<AttributeValue> {
        match self.value_type {
            ValueType::String => Ok(AttributeValue::Text(value.to_string())),
            ValueType::Date => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                .map(AttributeValue::Date)
                .map_err(|e| {
                    SamlError::AttributeMarshalling(format!("{}: {e}", self.friendly_name))
                }),
            ValueType::Gender => Gender::from_value(value.trim())
                .map(AttributeValue::Gender)
                .ok_or_else(|| {
                    SamlError::AttributeMarshalling(format!("{}: unknown gender", self.friendly_name))
                }),
        }
    }

    /// Checks the length and emptiness constraints on a marshalled value.
    #[must_use]
    pub fn accepts(&self, marshalled: &str) -> bool {
        !marshalled.trim().is_empty()
            && self
                .max_length
                .map_or(true, |max| marshalled.chars().count() <= max)
    }
}

/// Ordered mapping from attribute definition to a set of values.
///
/// There are no mutating methods; every transformation returns a new map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImmutableAttributeMap {
    entries: Vec<(AttributeDefinition, Vec<AttributeValue>)>,
}

impl ImmutableAttributeMap {
    /// Returns an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts building a map.
    #[must_use]
    pub fn builder() -> AttributeMapBuilder {
        AttributeMapBuilder::default()
    }

    /// Builds a map of definitions without values, as requested attributes
    /// usually are.
    #[must_use]
    pub fn of_definitions(definitions: impl IntoIterator<Item = AttributeDefinition>) -> Self {
        definitions
            .into_iter()
            .fold(Self::builder(), |builder, definition| builder.put(definition, Vec::new()))
            .build()
    }

    /// Number of attributes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the map holds no attributes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over definitions and their values, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&AttributeDefinition, &[AttributeValue])> {
        self.entries
            .iter()
            .map(|(definition, values)| (definition, values.as_slice()))
    }

    /// Iterates over the definitions.
    pub fn definitions(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.entries.iter().map(|(definition, _)| definition)
    }

    /// Returns the definition stored under a name URI.
    #[must_use]
    pub fn definition(&self, name_uri: &str) -> Option<&AttributeDefinition> {
        self.definitions().find(|definition| definition.name_uri == name_uri)
    }

    /// Returns the values stored under a name URI.
    #[must_use]
    pub fn values(&self, name_uri: &str) -> Option<&[AttributeValue]> {
        self.iter()
            .find(|(definition, _)| definition.name_uri == name_uri)
            .map(|(_, values)| values)
    }

    /// Returns true if the name URI is present.
    #[must_use]
    pub fn contains(&self, name_uri: &str) -> bool {
        self.definition(name_uri).is_some()
    }

    /// Returns true if the name URI has at least one non-blank value.
    #[must_use]
    pub fn has_value(&self, name_uri: &str) -> bool {
        self.values(name_uri)
            .is_some_and(|values| values.iter().any(|value| !value.is_blank()))
    }

    /// Returns a map holding only the attributes matching `keep`.
    #[must_use]
    pub fn filtered(&self, mut keep: impl FnMut(&AttributeDefinition) -> bool) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(definition, _)| keep(definition))
                .cloned()
                .collect(),
        }
    }

    /// Returns a map with every value passed through `f`.
    #[must_use]
    pub fn map_values(
        &self,
        mut f: impl FnMut(&AttributeDefinition, &AttributeValue) -> AttributeValue,
    ) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .map(|(definition, values)| {
                    let mapped = values.iter().map(|value| f(definition, value)).collect();
                    (definition.clone(), mapped)
                })
                .collect(),
        }
    }
}

/// Builder for [`ImmutableAttributeMap`].
#[derive(Debug, Default)]
pub struct AttributeMapBuilder {
    entries: Vec<(AttributeDefinition, Vec<AttributeValue>)>,
}

impl AttributeMapBuilder {
    /// Adds an attribute, replacing an earlier one with the same name URI.
    /// Repeated values are kept once.
    #[must_use]
    pub fn put(mut self, definition: AttributeDefinition, values: Vec<AttributeValue>) -> Self {
        let mut distinct: Vec<AttributeValue> = Vec::with_capacity(values.len());
        for value in values {
            if !distinct.contains(&value) {
                distinct.push(value);
            }
        }

        match self
            .entries
            .iter_mut()
            .find(|(existing, _)| existing.name_uri == definition.name_uri)
        {
            Some(entry) => *entry = (definition, distinct),
            None => self.entries.push((definition, distinct)),
        }
        self
    }

    /// Adds a text-valued attribute.
    #[must_use]
    pub fn put_text(self, definition: AttributeDefinition, value: impl Into<String>) -> Self {
        self.put(definition, vec![AttributeValue::Text(value.into())])
    }

    /// Finishes the map.
    #[must_use]
    pub fn build(self) -> ImmutableAttributeMap {
        ImmutableAttributeMap {
            entries: self.entries,
        }
    }
}
