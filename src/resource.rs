//! Generic, type-tagged resource tree.
//!
//! The core never depends on per-resource classes: a [`Resource`] is the
//! `resourceType` tag plus an ordered JSON object. Typed views of individual
//! fields are produced on demand through serde.

use crate::datatypes::{DynamicValue, Extension, Identifier, split_choice_key};
use crate::error::{Result, RoninError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Resource {
    resource_type: String,
    fields: Map<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            fields: Map::new(),
        }
    }

    pub fn from_json(value: Value) -> Result<Self> {
        let Value::Object(mut fields) = value else {
            return Err(RoninError::invalid_resource("resource must be a JSON object"));
        };
        let resource_type = match fields.remove("resourceType") {
            Some(Value::String(resource_type)) if !resource_type.is_empty() => resource_type,
            _ => {
                return Err(RoninError::invalid_resource(
                    "resourceType is missing or not a string",
                ));
            }
        };
        Ok(Self {
            resource_type,
            fields,
        })
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Self::from_json(serde_json::from_str(json)?)
    }

    pub fn into_json(self) -> Value {
        let mut object = Map::with_capacity(self.fields.len() + 1);
        object.insert("resourceType".to_string(), Value::String(self.resource_type));
        object.extend(self.fields);
        Value::Object(object)
    }

    pub fn to_json(&self) -> Value {
        self.clone().into_json()
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn id(&self) -> Option<&str> {
        self.fields.get("id").and_then(Value::as_str)
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.fields.insert("id".to_string(), Value::String(id.into()));
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.get(name).is_some_and(|v| !is_empty_value(v))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn set_field(&mut self, name: &str, value: impl Serialize) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.fields.insert(name.to_string(), value);
        Ok(())
    }

    pub fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    /// Typed view of a single field; `Ok(None)` when absent or null.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        match self.fields.get(name) {
            None | Some(Value::Null) => Ok(None),
            Some(value) => T::deserialize(value)
                .map(Some)
                .map_err(|e| RoninError::invalid_field(self.path(name), e.to_string())),
        }
    }

    /// Typed view of a list field; absent lists read as empty.
    pub fn get_list<T: DeserializeOwned>(&self, name: &str) -> Result<Vec<T>> {
        Ok(self.get::<Vec<T>>(name)?.unwrap_or_default())
    }

    /// Appends to a list field without touching existing elements.
    pub fn push_to_list(&mut self, name: &str, item: impl Serialize) -> Result<()> {
        let item = serde_json::to_value(item)?;
        match self.fields.get_mut(name) {
            Some(Value::Array(items)) => {
                items.push(item);
                Ok(())
            }
            None | Some(Value::Null) => {
                self.fields
                    .insert(name.to_string(), Value::Array(vec![item]));
                Ok(())
            }
            Some(_) => Err(RoninError::invalid_field(self.path(name), "expected a list")),
        }
    }

    pub fn identifiers(&self) -> Result<Vec<Identifier>> {
        self.get_list("identifier")
    }

    pub fn extensions(&self) -> Result<Vec<Extension>> {
        self.get_list("extension")
    }

    /// Finds the JSON key of a `base[x]` choice element, e.g. `valueQuantity`.
    pub fn choice_key(&self, base: &str) -> Option<&str> {
        self.fields
            .keys()
            .find(|key| split_choice_key(key, base).is_some())
            .map(String::as_str)
    }

    /// Typed value of a `base[x]` choice element.
    pub fn choice(&self, base: &str) -> Result<Option<DynamicValue>> {
        let Some(key) = self.choice_key(base) else {
            return Ok(None);
        };
        let type_name = split_choice_key(key, base).unwrap_or_default();
        let value = self.fields.get(key).cloned().unwrap_or(Value::Null);
        DynamicValue::from_json(type_name, value)
            .map(Some)
            .map_err(|e| RoninError::invalid_field(self.path(&format!("{base}[x]")), e.to_string()))
    }

    /// Replaces any existing `base[x]` value.
    pub fn set_choice(&mut self, base: &str, value: &DynamicValue) -> Result<()> {
        if let Some(existing) = self.choice_key(base).map(str::to_string) {
            self.fields.shift_remove(&existing);
        }
        self.fields.insert(
            format!("{base}{}", value.type_name()),
            value.to_json()?,
        );
        Ok(())
    }

    /// Adds `url` to `meta.profile`, keeping the rest of `meta`.
    pub fn add_meta_profile(&mut self, url: &str) -> Result<()> {
        let meta_path = self.path("meta");
        let meta = self
            .fields
            .entry("meta")
            .or_insert_with(|| Value::Object(Map::new()));
        let Value::Object(meta) = meta else {
            return Err(RoninError::invalid_field(meta_path, "expected an object"));
        };
        let profiles = meta
            .entry("profile")
            .or_insert_with(|| Value::Array(Vec::new()));
        let Value::Array(profiles) = profiles else {
            return Err(RoninError::invalid_field(
                format!("{meta_path}.profile"),
                "expected a list",
            ));
        };
        if !profiles.iter().any(|p| p.as_str() == Some(url)) {
            profiles.push(Value::String(url.to_string()));
        }
        Ok(())
    }

    pub fn meta_profiles(&self) -> Vec<String> {
        self.fields
            .get("meta")
            .and_then(|meta| meta.get("profile"))
            .and_then(Value::as_array)
            .map(|profiles| {
                profiles
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub(crate) fn into_parts(self) -> (String, Map<String, Value>) {
        (self.resource_type, self.fields)
    }

    pub(crate) fn from_parts(resource_type: String, fields: Map<String, Value>) -> Self {
        Self {
            resource_type,
            fields,
        }
    }

    fn path(&self, field: &str) -> String {
        format!("{}.{}", self.resource_type, field)
    }
}

/// FHIR treats empty strings, lists and objects as absent.
pub(crate) fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl TryFrom<Value> for Resource {
    type Error = RoninError;

    fn try_from(value: Value) -> Result<Self> {
        Resource::from_json(value)
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        resource.into_json()
    }
}
