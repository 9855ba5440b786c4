use super::{ronin_pipeline, validate_reference_field, validate_ronin_base};
use crate::concept_map::{FieldKind, MappedField};
use crate::identifier::IdentifierPolicy;
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::pipeline::ValidationPipeline;
use crate::profile::{ElementDefinition, ProfileDefinition};
use crate::resource::Resource;
use crate::transform::{ProfileContext, RoninProfile};
use crate::validation::Validation;
use serde_json::Value;

pub const RONIN_PROCEDURE_PROFILE: &str =
    "http://projectronin.io/fhir/StructureDefinition/ronin-procedure";

pub const RONIN_PROC_001: &str = "RONIN_PROC_001";
pub const RONIN_PROC_002: &str = "RONIN_PROC_002";

const MAPPED_FIELDS: &[MappedField] = &[MappedField {
    field: "code",
    field_key: "Procedure.code",
    extension_url: "http://projectronin.io/fhir/StructureDefinition/Extension/tenant-sourceProcedureCode",
    kind: FieldKind::CodeableConcept,
    rule_code: RONIN_PROC_001,
    rule_description: "Tenant source procedure code extension is missing or invalid",
}];

#[derive(Debug, Clone, Copy, Default)]
pub struct ProcedureProfile;

fn r4_definition() -> ProfileDefinition {
    ProfileDefinition::new("http://hl7.org/fhir/StructureDefinition/Procedure", "Procedure")
        .element(ElementDefinition::new("identifier", &["Identifier"]).list())
        .element(
            ElementDefinition::new("status", &["code"]).required().bound_to_codes(
                "http://hl7.org/fhir/event-status",
                &[
                    "preparation",
                    "in-progress",
                    "not-done",
                    "on-hold",
                    "stopped",
                    "completed",
                    "entered-in-error",
                    "unknown",
                ],
            ),
        )
        .element(ElementDefinition::new("category", &["CodeableConcept"]))
        .element(ElementDefinition::new("code", &["CodeableConcept"]))
        .element(ElementDefinition::new("subject", &["Reference"]).required())
        .element(ElementDefinition::new("encounter", &["Reference"]))
        .element(ElementDefinition::new(
            "performed[x]",
            &["dateTime", "Period", "string", "Age", "Range"],
        ))
        .element(ElementDefinition::new("performer", &["BackboneElement"]).list())
        .element(ElementDefinition::new("reasonCode", &["CodeableConcept"]).list())
}

fn us_core_definition() -> ProfileDefinition {
    ProfileDefinition::new(
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-procedure",
        "Procedure",
    )
    .element(ElementDefinition::new("code", &["CodeableConcept"]).required())
}

impl RoninProfile for ProcedureProfile {
    fn resource_type(&self) -> &'static str {
        "Procedure"
    }

    fn profile_url(&self) -> &'static str {
        RONIN_PROCEDURE_PROFILE
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
            "Procedure",
            r4_definition(),
            us_core_definition(),
            move |resource: &Resource, location: &LocationContext| {
                let mut validation = Validation::new();
                validate_ronin_base(resource, location, &config, MAPPED_FIELDS, &mut validation);

                let status = resource.field("status").and_then(Value::as_str);
                if matches!(status, Some("completed" | "in-progress")) {
                    validation.check_true(
                        resource.choice_key("performed").is_some(),
                        Rule::error(
                            RONIN_PROC_002,
                            "Performed SHALL be present if the status is 'completed' or 'in-progress'",
                        ),
                        &location.append("performed[x]"),
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
                validate_reference_field(
                    resource,
                    "encounter",
                    &["Encounter"],
                    &config,
                    location,
                    &mut validation,
                );
                validation
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_map::InMemoryConceptMapRegistry;
    use crate::config::RoninConfig;
    use crate::issue::{NOV_CONMAP_LOOKUP, RONIN_INV_REF_TYPE};
    use crate::transform::{RoninTransformer, TenantContext};
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_completed_without_performed() {
        let transformer = RoninTransformer::new(
            ProcedureProfile,
            Arc::new(InMemoryConceptMapRegistry::new()),
            Arc::new(RoninConfig::default()),
        );
        let resource = Resource::from_json(json!({
            "resourceType": "Procedure",
            "id": "p-1",
            "status": "completed",
            "code": {"text": "Appendectomy"},
            "subject": {"reference": "Group/7"}
        }))
        .unwrap();

        let (response, validation) = transformer.transform(resource, &TenantContext::new("test").unwrap());
        assert!(response.is_some());
        let codes: Vec<&str> = validation.issues().iter().map(|i| i.code()).collect();
        assert_eq!(
            codes,
            vec![NOV_CONMAP_LOOKUP, RONIN_PROC_001, RONIN_PROC_002, RONIN_INV_REF_TYPE]
        );
        assert_eq!(
            validation.issues()[0].description(),
            "Tenant source value 'Appendectomy' has no target defined in any Procedure.code concept map for tenant 'test'"
        );
    }
}
