//! Tenant concept-map normalization of coded fields.
//!
//! A lookup either yields a normalized value plus a provenance extension
//! holding the tenant's original, or misses. A miss is always an ERROR and the
//! source value stays in place; nothing is ever defaulted.

use crate::config::RoninConfig;
use crate::datatypes::{CodeableConcept, Coding, DynamicValue, Extension};
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::resource::Resource;
use crate::validation::Validation;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Describes the concept map entry that produced a mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConceptMapMetadata {
    pub registry_entry_type: String,
    pub concept_map_name: String,
    pub concept_map_uuid: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConceptMapping {
    pub value: CodeableConcept,
    pub metadata: Vec<ConceptMapMetadata>,
}

/// Read-only source of tenant concept maps and required value sets.
pub trait ConceptMapRegistry: Send + Sync {
    fn get_mapping(
        &self,
        tenant: &str,
        field_key: &str,
        source: &CodeableConcept,
        owning: &Resource,
    ) -> Option<ConceptMapping>;

    /// Codings allowed for `field_key` under the profile; empty when unrestricted.
    fn get_required_value_set(&self, field_key: &str, profile_url: &str) -> Vec<Coding>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum MappingResult {
    Mapped {
        value: CodeableConcept,
        extension: Extension,
        metadata: Vec<ConceptMapMetadata>,
    },
    Unmapped,
}

/// JSON shape of a concept-mapped field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Plain `code` string, looked up under the tenant source system.
    Code,
    Coding,
    CodeableConcept,
    CodeableConceptList,
}

/// One concept-mapped field of a resource type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedField {
    pub field: &'static str,
    /// Registry key, e.g. `Condition.code`.
    pub field_key: &'static str,
    pub extension_url: &'static str,
    pub kind: FieldKind,
    /// Issue raised when the provenance extension is missing or malformed.
    pub rule_code: &'static str,
    pub rule_description: &'static str,
}

impl MappedField {
    /// Value type the provenance extension must carry.
    pub fn provenance_type(&self) -> &'static str {
        match self.kind {
            FieldKind::Code | FieldKind::Coding => "Coding",
            FieldKind::CodeableConcept | FieldKind::CodeableConceptList => "CodeableConcept",
        }
    }
}

/// `Appointment.status` -> `AppointmentStatus`
fn field_key_segment(field_key: &str) -> String {
    field_key
        .split('.')
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// Code system under which a tenant's plain codes are looked up.
pub fn tenant_source_system(config: &RoninConfig, tenant: &str, field_key: &str) -> String {
    format!(
        "{}/{}/{}",
        config.tenant_source_system_base.trim_end_matches('/'),
        tenant,
        field_key_segment(field_key)
    )
}

pub struct ConceptMapNormalizer<'a> {
    registry: &'a dyn ConceptMapRegistry,
    config: &'a RoninConfig,
}

impl<'a> ConceptMapNormalizer<'a> {
    pub fn new(registry: &'a dyn ConceptMapRegistry, config: &'a RoninConfig) -> Self {
        Self { registry, config }
    }

    pub fn normalize(
        &self,
        tenant: &str,
        field_key: &str,
        source: &CodeableConcept,
        owning: &Resource,
        extension_url: &str,
    ) -> MappingResult {
        match self.registry.get_mapping(tenant, field_key, source, owning) {
            Some(mapping) => {
                tracing::debug!(
                    "Concept map hit for {} '{}' (tenant {})",
                    field_key,
                    source.source_value(),
                    tenant
                );
                MappingResult::Mapped {
                    value: mapping.value,
                    extension: Extension::new(
                        extension_url,
                        DynamicValue::CodeableConcept(source.clone()),
                    ),
                    metadata: mapping.metadata,
                }
            }
            None => {
                tracing::debug!(
                    "Concept map miss for {} '{}' (tenant {})",
                    field_key,
                    source.source_value(),
                    tenant
                );
                MappingResult::Unmapped
            }
        }
    }

    /// Normalizes every configured field present on `resource`.
    ///
    /// Mapped values are replaced and their provenance extensions appended to
    /// `resource.extension`; misses are recorded as `NOV_CONMAP_LOOKUP`.
    pub fn normalize_fields(
        &self,
        mut resource: Resource,
        tenant: &str,
        fields: &[MappedField],
    ) -> (Resource, Validation, Vec<ConceptMapMetadata>) {
        let mut validation = Validation::new();
        let mut metadata = Vec::new();
        let mut provenance = Vec::new();
        let root = LocationContext::new(resource.resource_type());

        for mapped in fields {
            if !resource.has_field(mapped.field) {
                continue;
            }
            let location = root.append(mapped.field);
            let outcome = match mapped.kind {
                FieldKind::Code => self.normalize_code(&mut resource, tenant, mapped, &location),
                FieldKind::Coding => {
                    self.normalize_coding(&mut resource, tenant, mapped, &location)
                }
                FieldKind::CodeableConcept => {
                    self.normalize_concept(&mut resource, tenant, mapped, &location)
                }
                FieldKind::CodeableConceptList => {
                    self.normalize_concept_list(&mut resource, tenant, mapped, &root)
                }
            };
            match outcome {
                Ok(field_outcome) => {
                    validation.merge(field_outcome.validation);
                    metadata.extend(field_outcome.metadata);
                    provenance.extend(field_outcome.extensions);
                }
                Err(message) => {
                    validation.add_rule(Rule::invalid_type(mapped.field, &message), location);
                }
            }
        }

        for extension in provenance {
            if let Err(e) = resource.push_to_list("extension", extension) {
                validation.add_rule(
                    Rule::invalid_type("extension", &e.to_string()),
                    root.append("extension"),
                );
                break;
            }
        }
        (resource, validation, metadata)
    }

    fn normalize_code(
        &self,
        resource: &mut Resource,
        tenant: &str,
        mapped: &MappedField,
        location: &LocationContext,
    ) -> Result<FieldOutcome, String> {
        let code: String = resource
            .get(mapped.field)
            .map_err(|e| e.to_string())?
            .unwrap_or_default();
        let source_coding = Coding::new(
            tenant_source_system(self.config, tenant, mapped.field_key),
            code.clone(),
        );
        let source = CodeableConcept::from_coding(source_coding.clone());

        let mut outcome = FieldOutcome::default();
        match self.normalize(tenant, mapped.field_key, &source, resource, mapped.extension_url) {
            MappingResult::Mapped {
                value,
                mut extension,
                metadata,
            } => {
                let Some(target) = value.coding.iter().find_map(|c| c.code.clone()) else {
                    outcome.miss(&code, mapped, tenant, location);
                    return Ok(outcome);
                };
                resource
                    .set_field(mapped.field, target)
                    .map_err(|e| e.to_string())?;
                extension.value = Some(DynamicValue::Coding(source_coding));
                outcome.hit(extension, metadata);
            }
            MappingResult::Unmapped => outcome.miss(&code, mapped, tenant, location),
        }
        Ok(outcome)
    }

    fn normalize_coding(
        &self,
        resource: &mut Resource,
        tenant: &str,
        mapped: &MappedField,
        location: &LocationContext,
    ) -> Result<FieldOutcome, String> {
        let coding: Coding = resource
            .get(mapped.field)
            .map_err(|e| e.to_string())?
            .unwrap_or_default();
        let source = CodeableConcept::from_coding(coding.clone());

        let mut outcome = FieldOutcome::default();
        match self.normalize(tenant, mapped.field_key, &source, resource, mapped.extension_url) {
            MappingResult::Mapped {
                value,
                mut extension,
                metadata,
            } => {
                let Some(target) = value.coding.into_iter().next() else {
                    outcome.miss(&source.source_value(), mapped, tenant, location);
                    return Ok(outcome);
                };
                resource
                    .set_field(mapped.field, target)
                    .map_err(|e| e.to_string())?;
                extension.value = Some(DynamicValue::Coding(coding));
                outcome.hit(extension, metadata);
            }
            MappingResult::Unmapped => {
                outcome.miss(&source.source_value(), mapped, tenant, location)
            }
        }
        Ok(outcome)
    }

    fn normalize_concept(
        &self,
        resource: &mut Resource,
        tenant: &str,
        mapped: &MappedField,
        location: &LocationContext,
    ) -> Result<FieldOutcome, String> {
        let source: CodeableConcept = resource
            .get(mapped.field)
            .map_err(|e| e.to_string())?
            .unwrap_or_default();

        let mut outcome = FieldOutcome::default();
        match self.normalize(tenant, mapped.field_key, &source, resource, mapped.extension_url) {
            MappingResult::Mapped {
                value,
                extension,
                metadata,
            } => {
                resource
                    .set_field(mapped.field, value)
                    .map_err(|e| e.to_string())?;
                outcome.hit(extension, metadata);
            }
            MappingResult::Unmapped => {
                outcome.miss(&source.source_value(), mapped, tenant, location)
            }
        }
        Ok(outcome)
    }

    fn normalize_concept_list(
        &self,
        resource: &mut Resource,
        tenant: &str,
        mapped: &MappedField,
        root: &LocationContext,
    ) -> Result<FieldOutcome, String> {
        let sources: Vec<CodeableConcept> =
            resource.get_list(mapped.field).map_err(|e| e.to_string())?;

        let mut outcome = FieldOutcome::default();
        let mut normalized = Vec::with_capacity(sources.len());
        for (index, source) in sources.into_iter().enumerate() {
            match self.normalize(tenant, mapped.field_key, &source, resource, mapped.extension_url)
            {
                MappingResult::Mapped {
                    value,
                    extension,
                    metadata,
                } => {
                    outcome.hit(extension, metadata);
                    normalized.push(value);
                }
                MappingResult::Unmapped => {
                    let location = root.append_index(mapped.field, index);
                    outcome.miss(&source.source_value(), mapped, tenant, &location);
                    normalized.push(source);
                }
            }
        }
        resource
            .set_field(mapped.field, normalized)
            .map_err(|e| e.to_string())?;
        Ok(outcome)
    }
}

#[derive(Default)]
struct FieldOutcome {
    validation: Validation,
    metadata: Vec<ConceptMapMetadata>,
    extensions: Vec<Extension>,
}

impl FieldOutcome {
    fn hit(&mut self, extension: Extension, metadata: Vec<ConceptMapMetadata>) {
        self.extensions.push(extension);
        self.metadata.extend(metadata);
    }

    fn miss(&mut self, value: &str, mapped: &MappedField, tenant: &str, location: &LocationContext) {
        self.validation.add_rule(
            Rule::failed_concept_map_lookup(value, mapped.field_key, tenant),
            location.clone(),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum LookupKey {
    Codes(BTreeSet<(Option<String>, Option<String>)>),
    Text(String),
}

impl LookupKey {
    fn of(concept: &CodeableConcept) -> Option<Self> {
        if !concept.coding.is_empty() {
            Some(LookupKey::Codes(concept.coding_key()))
        } else {
            concept.text.clone().map(LookupKey::Text)
        }
    }
}

/// Registry over pre-resolved mapping tables.
///
/// Source concepts match on their (system, code) set; `text` is only used for
/// concepts without codings.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConceptMapRegistry {
    mappings: HashMap<(String, String, LookupKey), ConceptMapping>,
    value_sets: HashMap<(String, String), Vec<Coding>>,
}

impl InMemoryConceptMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mapping(
        &mut self,
        tenant: &str,
        field_key: &str,
        source: &CodeableConcept,
        mapping: ConceptMapping,
    ) {
        match LookupKey::of(source) {
            Some(key) => {
                self.mappings
                    .insert((tenant.to_string(), field_key.to_string(), key), mapping);
            }
            None => tracing::warn!(
                "Ignoring {} mapping for tenant {} with an empty source concept",
                field_key,
                tenant
            ),
        }
    }

    pub fn with_mapping(
        mut self,
        tenant: &str,
        field_key: &str,
        source: CodeableConcept,
        mapping: ConceptMapping,
    ) -> Self {
        self.add_mapping(tenant, field_key, &source, mapping);
        self
    }

    pub fn with_value_set(
        mut self,
        field_key: &str,
        profile_url: &str,
        codings: Vec<Coding>,
    ) -> Self {
        self.value_sets
            .insert((field_key.to_string(), profile_url.to_string()), codings);
        self
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl ConceptMapRegistry for InMemoryConceptMapRegistry {
    fn get_mapping(
        &self,
        tenant: &str,
        field_key: &str,
        source: &CodeableConcept,
        _owning: &Resource,
    ) -> Option<ConceptMapping> {
        let key = LookupKey::of(source)?;
        self.mappings
            .get(&(tenant.to_string(), field_key.to_string(), key))
            .cloned()
    }

    fn get_required_value_set(&self, field_key: &str, profile_url: &str) -> Vec<Coding> {
        self.value_sets
            .get(&(field_key.to_string(), profile_url.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
