//! FHIR R4 datatypes used by the transformation core.
//!
//! Only the datatypes the core reads or writes are modelled. Every struct keeps
//! unmodelled members in a flattened `extra` map so that a parse/serialize
//! round-trip never drops tenant data.

use crate::error::{Result, RoninError};
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_selected: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Coding {
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: Some(code.into()),
            ..Default::default()
        }
    }

    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }

    /// Structural identity used for lookups: (system, code).
    pub fn key(&self) -> (Option<String>, Option<String>) {
        (self.system.clone(), self.code.clone())
    }

    /// Same system and code; display and version are ignored.
    pub fn matches(&self, other: &Coding) -> bool {
        self.system == other.system && self.code == other.code
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CodeableConcept {
    pub fn from_coding(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Structural lookup key: the set of (system, code) pairs.
    pub fn coding_key(&self) -> BTreeSet<(Option<String>, Option<String>)> {
        self.coding.iter().map(Coding::key).collect()
    }

    pub fn has_coding(&self, system: &str, code: &str) -> bool {
        self.coding
            .iter()
            .any(|c| c.system.as_deref() == Some(system) && c.code.as_deref() == Some(code))
    }

    /// True when both concepts carry the same (system, code) set.
    pub fn same_codes(&self, other: &CodeableConcept) -> bool {
        self.coding_key() == other.coding_key()
    }

    /// Short rendering for issue descriptions.
    pub fn source_value(&self) -> String {
        let codes: Vec<&str> = self
            .coding
            .iter()
            .filter_map(|c| c.code.as_deref())
            .collect();
        if codes.is_empty() {
            self.text.clone().unwrap_or_default()
        } else {
            codes.join(", ")
        }
    }
}

/// Holder for the `id`/`extension` of a primitive, serialized as `_field`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "use", skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigner: Option<Box<Reference>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Identifier {
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            value: Some(value.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_: CodeableConcept) -> Self {
        self.type_ = Some(type_);
        self
    }

    pub fn with_use(mut self, use_: impl Into<String>) -> Self {
        self.use_ = Some(use_.into());
        self
    }

    pub fn has_system(&self, system: &str) -> bool {
        self.system.as_deref() == Some(system)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
    #[serde(rename = "_type", skip_serializing_if = "Option::is_none")]
    pub type_element: Option<Element>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<Box<Identifier>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Reference {
    pub fn to(reference: impl Into<String>) -> Self {
        Self {
            reference: Some(reference.into()),
            ..Default::default()
        }
    }

    pub fn with_type(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    /// True for `#id` references to contained resources.
    pub fn is_contained(&self) -> bool {
        self.reference
            .as_deref()
            .is_some_and(|r| r.starts_with('#'))
    }

    /// Extensions attached to the `type` primitive.
    pub fn type_extensions(&self) -> &[Extension] {
        self.type_element
            .as_ref()
            .map(|e| e.extension.as_slice())
            .unwrap_or_default()
    }

    pub fn has_type_extension(&self, url: &str) -> bool {
        self.type_extensions()
            .iter()
            .any(|e| e.url.as_deref() == Some(url))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Period {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quantity {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Number>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Value of a `field[x]` choice element.
///
/// The variant is taken from the JSON key suffix (`valueQuantity`,
/// `performedDateTime`, ...), never guessed from the value's shape.
#[derive(Debug, Clone, PartialEq)]
pub enum DynamicValue {
    Boolean(bool),
    Integer(i64),
    Decimal(Number),
    String(String),
    Code(String),
    Uri(String),
    Date(String),
    DateTime(String),
    Instant(String),
    Time(String),
    Period(Period),
    Quantity(Quantity),
    CodeableConcept(CodeableConcept),
    Coding(Coding),
    Reference(Reference),
    Identifier(Identifier),
    Other { type_name: String, value: Value },
}

impl DynamicValue {
    /// The JSON key suffix for this variant.
    pub fn type_name(&self) -> &str {
        match self {
            DynamicValue::Boolean(_) => "Boolean",
            DynamicValue::Integer(_) => "Integer",
            DynamicValue::Decimal(_) => "Decimal",
            DynamicValue::String(_) => "String",
            DynamicValue::Code(_) => "Code",
            DynamicValue::Uri(_) => "Uri",
            DynamicValue::Date(_) => "Date",
            DynamicValue::DateTime(_) => "DateTime",
            DynamicValue::Instant(_) => "Instant",
            DynamicValue::Time(_) => "Time",
            DynamicValue::Period(_) => "Period",
            DynamicValue::Quantity(_) => "Quantity",
            DynamicValue::CodeableConcept(_) => "CodeableConcept",
            DynamicValue::Coding(_) => "Coding",
            DynamicValue::Reference(_) => "Reference",
            DynamicValue::Identifier(_) => "Identifier",
            DynamicValue::Other { type_name, .. } => type_name,
        }
    }

    pub fn from_json(type_name: &str, value: Value) -> Result<Self> {
        let dynamic = match type_name {
            "Boolean" => DynamicValue::Boolean(serde_json::from_value(value)?),
            "Integer" | "PositiveInt" | "UnsignedInt" => {
                DynamicValue::Integer(serde_json::from_value(value)?)
            }
            "Decimal" => DynamicValue::Decimal(serde_json::from_value(value)?),
            "String" | "Markdown" => DynamicValue::String(serde_json::from_value(value)?),
            "Code" => DynamicValue::Code(serde_json::from_value(value)?),
            "Uri" | "Url" | "Canonical" => DynamicValue::Uri(serde_json::from_value(value)?),
            "Date" => DynamicValue::Date(serde_json::from_value(value)?),
            "DateTime" => DynamicValue::DateTime(serde_json::from_value(value)?),
            "Instant" => DynamicValue::Instant(serde_json::from_value(value)?),
            "Time" => DynamicValue::Time(serde_json::from_value(value)?),
            "Period" => DynamicValue::Period(serde_json::from_value(value)?),
            "Quantity" => DynamicValue::Quantity(serde_json::from_value(value)?),
            "CodeableConcept" => DynamicValue::CodeableConcept(serde_json::from_value(value)?),
            "Coding" => DynamicValue::Coding(serde_json::from_value(value)?),
            "Reference" => DynamicValue::Reference(serde_json::from_value(value)?),
            "Identifier" => DynamicValue::Identifier(serde_json::from_value(value)?),
            other => DynamicValue::Other {
                type_name: other.to_string(),
                value,
            },
        };
        Ok(dynamic)
    }

    pub fn to_json(&self) -> Result<Value> {
        let value = match self {
            DynamicValue::Boolean(b) => Value::Bool(*b),
            DynamicValue::Integer(i) => Value::from(*i),
            DynamicValue::Decimal(n) => Value::Number(n.clone()),
            DynamicValue::String(s)
            | DynamicValue::Code(s)
            | DynamicValue::Uri(s)
            | DynamicValue::Date(s)
            | DynamicValue::DateTime(s)
            | DynamicValue::Instant(s)
            | DynamicValue::Time(s) => Value::String(s.clone()),
            DynamicValue::Period(p) => serde_json::to_value(p)?,
            DynamicValue::Quantity(q) => serde_json::to_value(q)?,
            DynamicValue::CodeableConcept(c) => serde_json::to_value(c)?,
            DynamicValue::Coding(c) => serde_json::to_value(c)?,
            DynamicValue::Reference(r) => serde_json::to_value(r)?,
            DynamicValue::Identifier(i) => serde_json::to_value(i)?,
            DynamicValue::Other { value, .. } => value.clone(),
        };
        Ok(value)
    }
}

/// Splits `valueQuantity` into `Quantity` for base `value`.
pub fn split_choice_key<'a>(key: &'a str, base: &str) -> Option<&'a str> {
    let suffix = key.strip_prefix(base)?;
    suffix
        .chars()
        .next()
        .filter(char::is_ascii_uppercase)
        .map(|_| suffix)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extension {
    pub id: Option<String>,
    pub url: Option<String>,
    pub value: Option<DynamicValue>,
    pub extension: Vec<Extension>,
}

impl Extension {
    pub fn new(url: impl Into<String>, value: DynamicValue) -> Self {
        Self {
            url: Some(url.into()),
            value: Some(value),
            ..Default::default()
        }
    }

    pub fn has_url(&self, url: &str) -> bool {
        self.url.as_deref() == Some(url)
    }
}

impl TryFrom<Map<String, Value>> for Extension {
    type Error = RoninError;

    fn try_from(map: Map<String, Value>) -> Result<Self> {
        let mut extension = Extension::default();
        for (key, value) in map {
            match key.as_str() {
                "id" => extension.id = serde_json::from_value(value)?,
                "url" => extension.url = serde_json::from_value(value)?,
                "extension" => extension.extension = serde_json::from_value(value)?,
                other => {
                    let Some(type_name) = split_choice_key(other, "value") else {
                        continue;
                    };
                    if extension.value.is_some() {
                        return Err(RoninError::invalid_field(
                            "Extension.value[x]",
                            "more than one value[x] present",
                        ));
                    }
                    extension.value = Some(DynamicValue::from_json(type_name, value)?);
                }
            }
        }
        Ok(extension)
    }
}

impl Serialize for Extension {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(id) = &self.id {
            map.serialize_entry("id", id)?;
        }
        if !self.extension.is_empty() {
            map.serialize_entry("extension", &self.extension)?;
        }
        if let Some(url) = &self.url {
            map.serialize_entry("url", url)?;
        }
        if let Some(value) = &self.value {
            let json = value.to_json().map_err(serde::ser::Error::custom)?;
            map.serialize_entry(&format!("value{}", value.type_name()), &json)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Extension {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let map = Map::deserialize(deserializer)?;
        Extension::try_from(map).map_err(D::Error::custom)
    }
}
