use super::{read_list, ronin_pipeline, validate_reference_field, validate_ronin_base};
use crate::concept_map::{FieldKind, MappedField};
use crate::datatypes::{CodeableConcept, Coding};
use crate::identifier::IdentifierPolicy;
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::pipeline::ValidationPipeline;
use crate::profile::{ElementDefinition, ProfileDefinition};
use crate::resource::Resource;
use crate::transform::{ProfileContext, RoninProfile};
use crate::validation::Validation;
use serde_json::Value;

pub const RONIN_LAB_RESULT_PROFILE: &str =
    "http://projectronin.io/fhir/StructureDefinition/ronin-observationLaboratoryResult";

pub const RONIN_OBS_001: &str = "RONIN_OBS_001";
pub const RONIN_LABOBS_001: &str = "RONIN_LABOBS_001";
pub const RONIN_LABOBS_002: &str = "RONIN_LABOBS_002";
pub const RONIN_LABOBS_003: &str = "RONIN_LABOBS_003";

const OBSERVATION_CATEGORY: &str = "http://terminology.hl7.org/CodeSystem/observation-category";

const MAPPED_FIELDS: &[MappedField] = &[MappedField {
    field: "code",
    field_key: "Observation.code",
    extension_url: "http://projectronin.io/fhir/StructureDefinition/Extension/tenant-sourceObservationCode",
    kind: FieldKind::CodeableConcept,
    rule_code: RONIN_OBS_001,
    rule_description: "Tenant source observation code extension is missing or invalid",
}];

fn laboratory() -> Coding {
    Coding::new(OBSERVATION_CATEGORY, "laboratory")
}

fn laboratory_codings(resource: &Resource) -> usize {
    let laboratory = laboratory();
    read_list::<CodeableConcept>(resource, "category")
        .iter()
        .flat_map(|category| category.coding.iter())
        .filter(|coding| laboratory.matches(coding))
        .count()
}

/// Laboratory results: observations carrying the `laboratory` category.
#[derive(Debug, Clone, Copy, Default)]
pub struct LaboratoryResultProfile;

fn r4_definition() -> ProfileDefinition {
    ProfileDefinition::new("http://hl7.org/fhir/StructureDefinition/Observation", "Observation")
        .element(ElementDefinition::new("identifier", &["Identifier"]).list())
        .element(
            ElementDefinition::new("status", &["code"]).required().bound_to_codes(
                "http://hl7.org/fhir/observation-status",
                &[
                    "registered",
                    "preliminary",
                    "final",
                    "amended",
                    "corrected",
                    "cancelled",
                    "entered-in-error",
                    "unknown",
                ],
            ),
        )
        .element(ElementDefinition::new("category", &["CodeableConcept"]).list())
        .element(ElementDefinition::new("code", &["CodeableConcept"]).required())
        .element(ElementDefinition::new("subject", &["Reference"]))
        .element(ElementDefinition::new("encounter", &["Reference"]))
        .element(ElementDefinition::new(
            "effective[x]",
            &["dateTime", "Period", "Timing", "instant"],
        ))
        .element(ElementDefinition::new("issued", &["instant"]))
        .element(ElementDefinition::new("performer", &["Reference"]).list())
        .element(ElementDefinition::new(
            "value[x]",
            &[
                "Quantity",
                "CodeableConcept",
                "string",
                "boolean",
                "integer",
                "Range",
                "Ratio",
                "SampledData",
                "time",
                "dateTime",
                "Period",
            ],
        ))
        .element(ElementDefinition::new("dataAbsentReason", &["CodeableConcept"]))
        .element(ElementDefinition::new("interpretation", &["CodeableConcept"]).list())
        .element(ElementDefinition::new("referenceRange", &["BackboneElement"]).list())
        .element(ElementDefinition::new("hasMember", &["Reference"]).list())
        .element(ElementDefinition::new("component", &["BackboneElement"]).list())
}

fn us_core_definition() -> ProfileDefinition {
    ProfileDefinition::new(
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-observation-lab",
        "Observation",
    )
    .element(ElementDefinition::new("category", &["CodeableConcept"]).required().list())
    .element(ElementDefinition::new("subject", &["Reference"]).required())
}

impl RoninProfile for LaboratoryResultProfile {
    fn resource_type(&self) -> &'static str {
        "Observation"
    }

    fn profile_url(&self) -> &'static str {
        RONIN_LAB_RESULT_PROFILE
    }

    fn qualifies(&self, resource: &Resource) -> bool {
        laboratory_codings(resource) > 0
    }

    fn identifier_policy(&self) -> IdentifierPolicy {
        IdentifierPolicy::with_data_authority()
    }

    fn mapped_fields(&self) -> &'static [MappedField] {
        MAPPED_FIELDS
    }

    fn pipeline(&self, context: &ProfileContext) -> ValidationPipeline {
        let config = context.config.clone();
        ronin_pipeline(
            "Observation",
            r4_definition(),
            us_core_definition(),
            move |resource: &Resource, location: &LocationContext| {
                let mut validation = Validation::new();
                validate_ronin_base(resource, location, &config, MAPPED_FIELDS, &mut validation);

                validation.check_true(
                    laboratory_codings(resource) == 1,
                    Rule::error(
                        RONIN_LABOBS_001,
                        format!(
                            "Must match this system|code: {}|laboratory",
                            OBSERVATION_CATEGORY
                        ),
                    ),
                    &location.append("category"),
                );

                let has_result = resource.choice_key("value").is_some()
                    || resource.has_field("dataAbsentReason")
                    || resource.has_field("component")
                    || resource.has_field("hasMember");
                validation.check_true(
                    has_result,
                    Rule::error(
                        RONIN_LABOBS_002,
                        "If there is no component or hasMember element then either a value[x] or a data absent reason must be present",
                    ),
                    location,
                );

                let status = resource.field("status").and_then(Value::as_str);
                if matches!(status, Some("final" | "amended" | "corrected")) {
                    validation.check_true(
                        resource.choice_key("effective").is_some(),
                        Rule::warning(
                            RONIN_LABOBS_003,
                            "effective[x] should be present for a resulted laboratory observation",
                        ),
                        &location.append("effective[x]"),
                    );
                }

                validate_reference_field(
                    resource,
                    "subject",
                    &["Patient"],
                    &config,
                    location,
                    &mut validation,
                );
                validation
            },
        )
    }
}
