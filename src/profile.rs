//! Declarative profile layers and the structural check.
//!
//! A [`ProfileDefinition`] lists the top-level elements a profile constrains:
//! cardinality, allowed types (several for a `[x]` choice) and an optional
//! required binding. [`ProfileValidator`] enforces one definition and is used
//! for both the base R4 layer and the US Core overlay.

use crate::datatypes::{CodeableConcept, Coding, split_choice_key};
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::pipeline::ResourceValidator;
use crate::resource::{Resource, is_empty_value};
use crate::validation::Validation;
use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use url::Url;

static FHIR_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9\-.]{1,64}$").expect("id pattern is valid"));

#[derive(Debug, Clone, PartialEq)]
pub struct ElementDefinition {
    /// Top-level field name; choice elements end in `[x]`.
    pub name: String,
    pub min: usize,
    /// `None` for unbounded.
    pub max: Option<usize>,
    /// FHIR type codes, e.g. `code`, `dateTime`, `CodeableConcept`.
    pub types: Vec<String>,
    /// Required binding; empty when unbound.
    pub binding: Vec<Coding>,
}

impl ElementDefinition {
    pub fn new(name: impl Into<String>, types: &[&str]) -> Self {
        Self {
            name: name.into(),
            min: 0,
            max: Some(1),
            types: types.iter().map(|t| t.to_string()).collect(),
            binding: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.min = 1;
        self
    }

    /// Repeating element (`0..*`).
    pub fn list(mut self) -> Self {
        self.max = None;
        self
    }

    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    pub fn bound_to(mut self, codings: Vec<Coding>) -> Self {
        self.binding = codings;
        self
    }

    /// Binding over plain codes (for `code` elements).
    pub fn bound_to_codes(self, system: &str, codes: &[&str]) -> Self {
        self.bound_to(codes.iter().map(|code| Coding::new(system, *code)).collect())
    }

    fn is_list(&self) -> bool {
        self.max != Some(1)
    }

    fn choice_base(&self) -> Option<&str> {
        self.name.strip_suffix("[x]")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProfileDefinition {
    pub url: String,
    pub resource_type: String,
    pub elements: Vec<ElementDefinition>,
}

impl ProfileDefinition {
    pub fn new(url: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            resource_type: resource_type.into(),
            elements: Vec::new(),
        }
    }

    pub fn element(mut self, element: ElementDefinition) -> Self {
        self.elements.push(element);
        self
    }
}

pub struct ProfileValidator {
    definition: ProfileDefinition,
}

impl ProfileValidator {
    pub fn new(definition: ProfileDefinition) -> Self {
        Self { definition }
    }

    fn validate_element(
        &self,
        resource: &Resource,
        element: &ElementDefinition,
        parent: &LocationContext,
        validation: &mut Validation,
    ) {
        if let Some(base) = element.choice_base() {
            self.validate_choice(resource, element, base, parent, validation);
            return;
        }

        let location = parent.append(&element.name);
        let value = match resource.field(&element.name) {
            Some(value) if !is_empty_value(value) => value,
            _ => {
                if element.min > 0 {
                    validation.add_rule(Rule::required_field(&element.name), location);
                }
                return;
            }
        };

        if !element.is_list() {
            check_value(element, value, &location, validation);
            return;
        }
        let Value::Array(items) = value else {
            validation.add_rule(Rule::invalid_type(&element.name, "expected a list"), location);
            return;
        };
        if let Some(max) = element.max {
            validation.check_true(
                items.len() <= max,
                Rule::invalid_cardinality(&element.name, max),
                &location,
            );
        }
        for (index, item) in items.iter().enumerate() {
            check_value(
                element,
                item,
                &parent.append_index(&element.name, index),
                validation,
            );
        }
    }

    fn validate_choice(
        &self,
        resource: &Resource,
        element: &ElementDefinition,
        base: &str,
        parent: &LocationContext,
        validation: &mut Validation,
    ) {
        let Some(key) = resource.choice_key(base) else {
            if element.min > 0 {
                validation.add_rule(
                    Rule::required_field(&element.name),
                    parent.append(&element.name),
                );
            }
            return;
        };
        let location = parent.append(key);
        let suffix = split_choice_key(key, base).unwrap_or_default();
        let Some(type_code) = element.types.iter().find(|t| choice_suffix(t) == suffix) else {
            let allowed: Vec<String> = element.types.iter().map(|t| choice_suffix(t)).collect();
            let allowed: Vec<&str> = allowed.iter().map(String::as_str).collect();
            validation.add_rule(
                Rule::invalid_dynamic_value(&element.name, &allowed),
                parent.append(&element.name),
            );
            return;
        };
        if let Some(value) = resource.field(key) {
            let single = ElementDefinition {
                types: vec![type_code.clone()],
                ..element.clone()
            };
            check_value(&single, value, &location, validation);
        }
    }
}

impl ResourceValidator for ProfileValidator {
    fn validate(&self, resource: &Resource, location: &LocationContext) -> Validation {
        let mut validation = Validation::new();
        for element in &self.definition.elements {
            self.validate_element(resource, element, location, &mut validation);
        }
        validation
    }
}

/// `dateTime` -> `DateTime`
fn choice_suffix(type_code: &str) -> String {
    let mut chars = type_code.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Type and binding checks for one (non-list) value.
fn check_value(
    element: &ElementDefinition,
    value: &Value,
    location: &LocationContext,
    validation: &mut Validation,
) {
    let field = location.field();
    let Some(type_code) = element.types.first() else {
        return;
    };
    match type_code.as_str() {
        "string" | "code" | "id" | "uri" | "url" | "canonical" | "markdown" => {
            let Some(text) = value.as_str() else {
                validation.add_rule(Rule::invalid_type(field, "expected a string"), location.clone());
                return;
            };
            if type_code == "code" && !element.binding.is_empty() {
                validation.check_true(
                    element.binding.iter().any(|c| c.code.as_deref() == Some(text)),
                    Rule::invalid_value_set(text),
                    location,
                );
            }
        }
        "boolean" => {
            validation.check_true(
                value.is_boolean(),
                Rule::invalid_type(field, "expected a boolean"),
                location,
            );
        }
        "integer" | "positiveInt" | "unsignedInt" => {
            validation.check_true(
                value.is_i64() || value.is_u64(),
                Rule::invalid_type(field, "expected an integer"),
                location,
            );
        }
        "decimal" => {
            validation.check_true(
                value.is_number(),
                Rule::invalid_type(field, "expected a number"),
                location,
            );
        }
        "date" | "dateTime" | "instant" => {
            let Some(text) = value.as_str() else {
                validation.add_rule(Rule::invalid_type(field, "expected a string"), location.clone());
                return;
            };
            let valid = match type_code.as_str() {
                "date" => is_fhir_date(text),
                "dateTime" => is_fhir_date_time(text),
                _ => DateTime::parse_from_rfc3339(text).is_ok(),
            };
            validation.check_true(valid, Rule::invalid_primitive(type_code, text), location);
        }
        "CodeableConcept" => match serde_json::from_value::<CodeableConcept>(value.clone()) {
            Ok(concept) => check_binding(element, &concept.coding, &concept.source_value(), location, validation),
            Err(e) => validation.add_rule(Rule::invalid_type(field, &e.to_string()), location.clone()),
        },
        "Coding" => match serde_json::from_value::<Coding>(value.clone()) {
            Ok(coding) => {
                let rendered = coding.code.clone().unwrap_or_default();
                check_binding(element, std::slice::from_ref(&coding), &rendered, location, validation)
            }
            Err(e) => validation.add_rule(Rule::invalid_type(field, &e.to_string()), location.clone()),
        },
        "Reference" => check_shape::<crate::datatypes::Reference>(value, field, location, validation),
        "Identifier" => check_shape::<crate::datatypes::Identifier>(value, field, location, validation),
        "Period" => check_shape::<crate::datatypes::Period>(value, field, location, validation),
        "Quantity" => check_shape::<crate::datatypes::Quantity>(value, field, location, validation),
        _ => {
            validation.check_true(
                value.is_object(),
                Rule::invalid_type(field, "expected an object"),
                location,
            );
        }
    }
}

fn check_shape<T: serde::de::DeserializeOwned>(
    value: &Value,
    field: &str,
    location: &LocationContext,
    validation: &mut Validation,
) {
    if let Err(e) = serde_json::from_value::<T>(value.clone()) {
        validation.add_rule(Rule::invalid_type(field, &e.to_string()), location.clone());
    }
}

fn check_binding(
    element: &ElementDefinition,
    codings: &[Coding],
    rendered: &str,
    location: &LocationContext,
    validation: &mut Validation,
) {
    if element.binding.is_empty() {
        return;
    }
    let bound = codings
        .iter()
        .any(|coding| element.binding.iter().any(|allowed| allowed.matches(coding)));
    validation.check_true(bound, Rule::invalid_value_set(rendered), location);
}

/// `YYYY`, `YYYY-MM` or `YYYY-MM-DD`.
pub fn is_fhir_date(text: &str) -> bool {
    let bytes = text.as_bytes();
    match bytes.len() {
        4 => bytes.iter().all(u8::is_ascii_digit),
        7 => bytes[4] == b'-' && NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").is_ok(),
        10 => NaiveDate::parse_from_str(text, "%Y-%m-%d").is_ok(),
        _ => false,
    }
}

/// A partial date, or a full timestamp with offset.
pub fn is_fhir_date_time(text: &str) -> bool {
    is_fhir_date(text) || DateTime::parse_from_rfc3339(text).is_ok()
}

/// Resource-level well-formedness that every profile shares.
pub struct StructuralValidator {
    resource_type: String,
}

impl StructuralValidator {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
        }
    }
}

impl ResourceValidator for StructuralValidator {
    fn validate(&self, resource: &Resource, location: &LocationContext) -> Validation {
        let mut validation = Validation::new();
        validation.check_true(
            resource.resource_type() == self.resource_type,
            Rule::invalid_resource_type(&self.resource_type, resource.resource_type()),
            location,
        );

        match resource.field("id") {
            None => {}
            Some(Value::String(id)) => {
                validation.check_true(
                    FHIR_ID.is_match(id),
                    Rule::invalid_primitive("id", id),
                    &location.append("id"),
                );
            }
            Some(_) => validation.add_rule(
                Rule::invalid_type("id", "expected a string"),
                location.append("id"),
            ),
        }

        if let Err(e) = resource.identifiers() {
            validation.add_rule(
                Rule::invalid_type("identifier", &e.to_string()),
                location.append("identifier"),
            );
        }

        walk_object(resource.fields(), location, &mut validation);
        validation
    }
}

fn walk_object(map: &Map<String, Value>, location: &LocationContext, validation: &mut Validation) {
    for (key, value) in map {
        match value {
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    let item_location = location.append_index(key, index);
                    if let Value::Object(object) = item {
                        if key == "extension" || key == "modifierExtension" {
                            check_extension(object, &item_location, validation);
                        } else if key == "coding" {
                            check_coding_system(object, &item_location, validation);
                        }
                        walk_object(object, &item_location, validation);
                    }
                }
            }
            Value::Object(object) => walk_object(object, &location.append(key), validation),
            _ => {}
        }
    }
}

fn check_extension(object: &Map<String, Value>, location: &LocationContext, validation: &mut Validation) {
    if !matches!(object.get("url"), Some(Value::String(url)) if !url.is_empty()) {
        validation.add_rule(Rule::required_field("url"), location.append("url"));
    }
    let has_value = object.keys().any(|key| split_choice_key(key, "value").is_some());
    let has_nested = object.get("extension").is_some_and(|nested| !is_empty_value(nested));
    validation.check_true(
        has_value != has_nested,
        Rule::error(
            crate::issue::R4_INV_EXT,
            "Extension must have either extensions or value[x], not both",
        ),
        location,
    );
}

fn check_coding_system(object: &Map<String, Value>, location: &LocationContext, validation: &mut Validation) {
    if let Some(Value::String(system)) = object.get("system") {
        validation.check_true(
            Url::parse(system).is_ok(),
            Rule::invalid_primitive("uri", system),
            &location.append("system"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::{INV_CARDINALITY, INV_DYN_VAL, INV_PRIM, INV_RES_TYPE, INV_TYPE, INV_VALUE_SET, R4_INV_EXT, REQ_FIELD};
    use serde_json::json;

    fn observation_profile() -> ProfileDefinition {
        ProfileDefinition::new("http://hl7.org/fhir/StructureDefinition/Observation", "Observation")
            .element(
                ElementDefinition::new("status", &["code"])
                    .required()
                    .bound_to_codes("http://hl7.org/fhir/observation-status", &["final", "amended"]),
            )
            .element(ElementDefinition::new("category", &["CodeableConcept"]).list())
            .element(ElementDefinition::new("code", &["CodeableConcept"]).required())
            .element(ElementDefinition::new("effective[x]", &["dateTime", "Period"]))
            .element(ElementDefinition::new("basedOn", &["Reference"]).list().max(2))
    }

    fn validate(json: Value) -> Validation {
        let resource = Resource::from_json(json).unwrap();
        ProfileValidator::new(observation_profile())
            .validate(&resource, &LocationContext::new("Observation"))
    }

    fn codes(validation: &Validation) -> Vec<&str> {
        validation.issues().iter().map(|i| i.code()).collect()
    }

    #[test]
    fn test_conformant_resource() {
        let validation = validate(json!({
            "resourceType": "Observation",
            "status": "final",
            "category": [{"text": "lab"}],
            "code": {"text": "glucose"},
            "effectiveDateTime": "2023-04-05T10:00:00Z"
        }));
        assert!(validation.is_empty(), "{:?}", validation.issues());
    }

    #[test]
    fn test_required_and_binding() {
        let validation = validate(json!({
            "resourceType": "Observation",
            "status": "preliminary"
        }));
        assert_eq!(codes(&validation), vec![INV_VALUE_SET, REQ_FIELD]);
        assert_eq!(
            validation.issues()[1].to_string(),
            "ERROR REQ_FIELD: code is a required element @ Observation.code"
        );
    }

    #[test]
    fn test_choice_type_not_allowed() {
        let validation = validate(json!({
            "resourceType": "Observation",
            "status": "final",
            "code": {"text": "x"},
            "effectiveInstant": "2023-04-05T10:00:00Z"
        }));
        assert_eq!(codes(&validation), vec![INV_DYN_VAL]);
        assert_eq!(
            validation.issues()[0].description(),
            "effective[x] can only be one of the following: DateTime, Period"
        );
    }

    #[test]
    fn test_bad_date_and_cardinality() {
        let validation = validate(json!({
            "resourceType": "Observation",
            "status": "final",
            "code": {"text": "x"},
            "effectiveDateTime": "2023-13-45",
            "basedOn": [{"reference": "A/1"}, {"reference": "A/2"}, {"reference": "A/3"}],
            "category": {"text": "not a list"}
        }));
        assert_eq!(codes(&validation), vec![INV_TYPE, INV_PRIM, INV_CARDINALITY]);
    }

    #[test]
    fn test_fhir_dates() {
        assert!(is_fhir_date("2023"));
        assert!(is_fhir_date("2023-04"));
        assert!(is_fhir_date("2023-04-05"));
        assert!(!is_fhir_date("2023-4-5"));
        assert!(is_fhir_date_time("2023-04-05T10:00:00-05:00"));
        assert!(!is_fhir_date_time("2023-04-05T10:00:00"));
    }

    #[test]
    fn test_structural_checks() {
        let resource = Resource::from_json(json!({
            "resourceType": "Condition",
            "id": "bad id!",
            "extension": [
                {"valueString": "no url"},
                {"url": "http://e", "valueString": "x", "extension": [{"url": "http://n", "valueBoolean": true}]}
            ],
            "code": {"coding": [{"system": "loinc", "code": "1"}]}
        }))
        .unwrap();
        let validation =
            StructuralValidator::new("Patient").validate(&resource, &LocationContext::new("Condition"));
        assert_eq!(
            codes(&validation),
            vec![INV_RES_TYPE, INV_PRIM, REQ_FIELD, R4_INV_EXT, INV_PRIM]
        );
        assert_eq!(
            validation.issues()[2].location().as_str(),
            "Condition.extension[0].url"
        );
        assert_eq!(
            validation.issues()[4].location().as_str(),
            "Condition.code.coding[0].system"
        );
    }
}
