use super::{read, read_list, ronin_pipeline, validate_reference_field, validate_ronin_base};
use crate::config::RoninConfig;
use crate::datatypes::Reference;
use crate::identifier::IdentifierPolicy;
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::pipeline::ValidationPipeline;
use crate::profile::{ElementDefinition, ProfileDefinition};
use crate::resource::Resource;
use crate::rules::{validate_mutually_exclusive, validate_reference_type};
use crate::transform::{ProfileContext, RoninProfile};
use crate::validation::Validation;
use serde_json::Value;

pub const RONIN_CARE_PLAN_PROFILE: &str =
    "http://projectronin.io/fhir/StructureDefinition/ronin-carePlan";

pub const RONIN_CAREPLAN_001: &str = "RONIN_CAREPLAN_001";

const REQUEST_STATUS: &str = "http://hl7.org/fhir/request-status";

/// Resources a CarePlan activity may point at.
const ACTIVITY_REFERENCE_TYPES: &[&str] = &[
    "Appointment",
    "CommunicationRequest",
    "DeviceRequest",
    "MedicationRequest",
    "NutritionOrder",
    "Task",
    "ServiceRequest",
    "VisionPrescription",
    "RequestGroup",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CarePlanProfile;

fn r4_definition() -> ProfileDefinition {
    ProfileDefinition::new("http://hl7.org/fhir/StructureDefinition/CarePlan", "CarePlan")
        .element(ElementDefinition::new("identifier", &["Identifier"]).list())
        .element(
            ElementDefinition::new("status", &["code"]).required().bound_to_codes(
                REQUEST_STATUS,
                &[
                    "draft",
                    "active",
                    "on-hold",
                    "revoked",
                    "completed",
                    "entered-in-error",
                    "unknown",
                ],
            ),
        )
        .element(
            ElementDefinition::new("intent", &["code"]).required().bound_to_codes(
                "http://hl7.org/fhir/request-intent",
                &["proposal", "plan", "order", "option"],
            ),
        )
        .element(ElementDefinition::new("category", &["CodeableConcept"]).list())
        .element(ElementDefinition::new("title", &["string"]))
        .element(ElementDefinition::new("subject", &["Reference"]).required())
        .element(ElementDefinition::new("encounter", &["Reference"]))
        .element(ElementDefinition::new("period", &["Period"]))
        .element(ElementDefinition::new("created", &["dateTime"]))
        .element(ElementDefinition::new("activity", &["BackboneElement"]).list())
}

fn us_core_definition() -> ProfileDefinition {
    ProfileDefinition::new(
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-careplan",
        "CarePlan",
    )
    .element(ElementDefinition::new("category", &["CodeableConcept"]).required().list())
}

fn validate_activity(
    activity: &Value,
    config: &RoninConfig,
    location: &LocationContext,
    validation: &mut Validation,
) {
    let reference = activity.get("reference").filter(|v| !v.is_null());
    let detail = activity.get("detail").filter(|v| !v.is_null());
    validate_mutually_exclusive(
        &[reference.is_some(), detail.is_some()],
        true,
        Rule::error(
            RONIN_CAREPLAN_001,
            "Exactly one of activity.reference or activity.detail SHALL be present",
        ),
        location,
        validation,
    );

    if let Some(reference) = reference {
        match serde_json::from_value::<Reference>(reference.clone()) {
            Ok(reference) => validate_reference_type(
                &reference,
                ACTIVITY_REFERENCE_TYPES,
                config,
                &location.append("reference"),
                validation,
            ),
            Err(e) => validation.add_rule(
                Rule::invalid_type("reference", &e.to_string()),
                location.append("reference"),
            ),
        }
    }

    if let Some(detail) = detail {
        let detail_location = location.append("detail");
        let status = detail.get("status").and_then(Value::as_str);
        validation.require(status, "status", &detail_location);
    }
}

impl RoninProfile for CarePlanProfile {
    fn resource_type(&self) -> &'static str {
        "CarePlan"
    }

    fn profile_url(&self) -> &'static str {
        RONIN_CARE_PLAN_PROFILE
    }

    fn identifier_policy(&self) -> IdentifierPolicy {
        IdentifierPolicy::with_data_authority()
    }

    fn pipeline(&self, context: &ProfileContext) -> ValidationPipeline {
        let config = context.config.clone();
        ronin_pipeline(
            "CarePlan",
            r4_definition(),
            us_core_definition(),
            move |resource: &Resource, location: &LocationContext| {
                let mut validation = Validation::new();
                validate_ronin_base(resource, location, &config, &[], &mut validation);

                validate_reference_field(
                    resource,
                    "subject",
                    &["Patient", "Group"],
                    &config,
                    location,
                    &mut validation,
                );
                for (index, activity) in read_list::<Value>(resource, "activity").iter().enumerate() {
                    validate_activity(
                        activity,
                        &config,
                        &location.append_index("activity", index),
                        &mut validation,
                    );
                }
                if read::<String>(resource, "title").is_some_and(|t| t.trim().is_empty()) {
                    validation.add_rule(
                        Rule::invalid_primitive("string", ""),
                        location.append("title"),
                    );
                }
                validation
            },
        )
    }
}
