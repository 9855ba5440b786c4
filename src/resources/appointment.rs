use super::{read_list, ronin_pipeline, validate_ronin_base};
use crate::concept_map::{FieldKind, MappedField};
use crate::config::RoninConfig;
use crate::datatypes::Reference;
use crate::identifier::IdentifierPolicy;
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::pipeline::ValidationPipeline;
use crate::profile::{ElementDefinition, ProfileDefinition};
use crate::resource::Resource;
use crate::rules::validate_reference_type;
use crate::transform::{ProfileContext, RoninProfile};
use crate::validation::Validation;
use serde_json::Value;

pub const RONIN_APPOINTMENT_PROFILE: &str =
    "http://projectronin.io/fhir/StructureDefinition/ronin-appointment";

pub const RONIN_APPT_001: &str = "RONIN_APPT_001";
pub const RONIN_APPT_002: &str = "RONIN_APPT_002";
pub const RONIN_APPT_003: &str = "RONIN_APPT_003";

/// Statuses for which `start` and `end` may be absent.
const UNSCHEDULED_STATUSES: &[&str] = &["proposed", "cancelled", "waitlist"];

const PARTICIPANT_ACTOR_TYPES: &[&str] = &[
    "Patient",
    "Practitioner",
    "PractitionerRole",
    "RelatedPerson",
    "Device",
    "HealthcareService",
    "Location",
];

const MAPPED_FIELDS: &[MappedField] = &[MappedField {
    field: "status",
    field_key: "Appointment.status",
    extension_url: "http://projectronin.io/fhir/StructureDefinition/Extension/tenant-sourceAppointmentStatus",
    kind: FieldKind::Code,
    rule_code: RONIN_APPT_001,
    rule_description: "Tenant source appointment status extension is missing or invalid",
}];

/// Appointments: the status is a tenant code, concept-mapped before validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentProfile;

fn r4_definition() -> ProfileDefinition {
    ProfileDefinition::new("http://hl7.org/fhir/StructureDefinition/Appointment", "Appointment")
        .element(ElementDefinition::new("identifier", &["Identifier"]).list())
        .element(
            ElementDefinition::new("status", &["code"]).required().bound_to_codes(
                "http://hl7.org/fhir/appointmentstatus",
                &[
                    "proposed",
                    "pending",
                    "booked",
                    "arrived",
                    "fulfilled",
                    "cancelled",
                    "noshow",
                    "entered-in-error",
                    "checked-in",
                    "waitlist",
                ],
            ),
        )
        .element(ElementDefinition::new("cancelationReason", &["CodeableConcept"]))
        .element(ElementDefinition::new("serviceType", &["CodeableConcept"]).list())
        .element(ElementDefinition::new("appointmentType", &["CodeableConcept"]))
        .element(ElementDefinition::new("priority", &["unsignedInt"]))
        .element(ElementDefinition::new("description", &["string"]))
        .element(ElementDefinition::new("start", &["instant"]))
        .element(ElementDefinition::new("end", &["instant"]))
        .element(ElementDefinition::new("minutesDuration", &["positiveInt"]))
        .element(ElementDefinition::new("created", &["dateTime"]))
        .element(ElementDefinition::new("participant", &["BackboneElement"]).required().list())
}

fn ronin_overlay() -> ProfileDefinition {
    ProfileDefinition::new(RONIN_APPOINTMENT_PROFILE, "Appointment")
        .element(ElementDefinition::new("identifier", &["Identifier"]).required().list())
}

fn validate_participant(
    participant: &Value,
    config: &RoninConfig,
    location: &LocationContext,
    validation: &mut Validation,
) {
    let actor = participant.get("actor").filter(|v| !v.is_null());
    let has_type = participant
        .get("type")
        .and_then(Value::as_array)
        .is_some_and(|types| !types.is_empty());
    validation.check_true(
        actor.is_some() || has_type,
        Rule::error(
            RONIN_APPT_003,
            "Either the type or actor on the participant SHALL be specified",
        ),
        location,
    );

    if let Some(Ok(actor)) = actor.map(|a| serde_json::from_value::<Reference>(a.clone())) {
        validate_reference_type(
            &actor,
            PARTICIPANT_ACTOR_TYPES,
            config,
            &location.append("actor"),
            validation,
        );
    }
}

impl RoninProfile for AppointmentProfile {
    fn resource_type(&self) -> &'static str {
        "Appointment"
    }

    fn profile_url(&self) -> &'static str {
        RONIN_APPOINTMENT_PROFILE
    }

    fn identifier_policy(&self) -> IdentifierPolicy {
        IdentifierPolicy::with_data_authority()
    }

    fn mapped_fields(&self) -> &'static [MappedField] {
        MAPPED_FIELDS
    }

    fn mandatory_fields(&self) -> &'static [&'static str] {
        &["id", "status"]
    }

    fn pipeline(&self, context: &ProfileContext) -> ValidationPipeline {
        let config = context.config.clone();
        ronin_pipeline(
            "Appointment",
            r4_definition(),
            ronin_overlay(),
            move |resource: &Resource, location: &LocationContext| {
                let mut validation = Validation::new();
                validate_ronin_base(resource, location, &config, MAPPED_FIELDS, &mut validation);

                let status = resource.field("status").and_then(Value::as_str);
                let scheduled = !status.is_some_and(|s| UNSCHEDULED_STATUSES.contains(&s));
                if scheduled {
                    validation.check_true(
                        resource.has_field("start") && resource.has_field("end"),
                        Rule::error(
                            RONIN_APPT_002,
                            "Start and end can only be missing for appointments with the following statuses: proposed, cancelled, waitlist",
                        ),
                        location,
                    );
                }

                for (index, participant) in
                    read_list::<Value>(resource, "participant").iter().enumerate()
                {
                    validate_participant(
                        participant,
                        &config,
                        &location.append_index("participant", index),
                        &mut validation,
                    );
                }
                for (index, based_on) in read_list::<Reference>(resource, "basedOn").iter().enumerate() {
                    validate_reference_type(
                        based_on,
                        &["ServiceRequest"],
                        &config,
                        &location.append_index("basedOn", index),
                        &mut validation,
                    );
                }
                validation
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::concept_map::{ConceptMapping, InMemoryConceptMapRegistry, tenant_source_system};
    use crate::datatypes::{CodeableConcept, Coding, DynamicValue};
    use crate::issue::{NOV_CONMAP_LOOKUP, REQ_FIELD};
    use crate::transform::{RoninTransformer, TenantContext};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn transformer() -> RoninTransformer<AppointmentProfile> {
        let config = RoninConfig::default();
        let registry = InMemoryConceptMapRegistry::new().with_mapping(
            "test",
            "Appointment.status",
            CodeableConcept::from_coding(Coding::new(
                tenant_source_system(&config, "test", "Appointment.status"),
                "SCHEDULED",
            )),
            ConceptMapping {
                value: CodeableConcept::from_coding(Coding::new(
                    "http://hl7.org/fhir/appointmentstatus",
                    "booked",
                )),
                metadata: vec![],
            },
        );
        RoninTransformer::new(AppointmentProfile, Arc::new(registry), Arc::new(config))
    }

    fn appointment(status: &str) -> Resource {
        Resource::from_json(json!({
            "resourceType": "Appointment",
            "id": "appt-1",
            "status": status,
            "start": "2023-03-01T10:00:00Z",
            "end": "2023-03-01T10:30:00Z",
            "participant": [
                {"actor": {"reference": "Patient/1234"}, "status": "accepted"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_status_is_mapped_with_provenance() {
        let (response, validation) =
            transformer().transform(appointment("SCHEDULED"), &TenantContext::new("test").unwrap());
        assert!(validation.is_empty(), "{:?}", validation.issues());
        let resource = response.unwrap().resource;
        assert_eq!(resource.field("status"), Some(&json!("booked")));

        let extension = resource
            .extensions()
            .unwrap()
            .into_iter()
            .find(|e| e.has_url(MAPPED_FIELDS[0].extension_url))
            .unwrap();
        match extension.value {
            Some(DynamicValue::Coding(coding)) => assert_eq!(coding.code.as_deref(), Some("SCHEDULED")),
            other => panic!("unexpected provenance {other:?}"),
        }
    }

    #[test]
    fn test_unmapped_status_is_kept() {
        let (response, validation) =
            transformer().transform(appointment("UNKNOWN-STATUS"), &TenantContext::new("test").unwrap());
        let resource = response.unwrap().resource;
        assert_eq!(resource.field("status"), Some(&json!("UNKNOWN-STATUS")));
        let codes: Vec<&str> = validation.issues().iter().map(|i| i.code()).collect();
        assert_eq!(codes, vec![NOV_CONMAP_LOOKUP, "INV_VALUE_SET", RONIN_APPT_001]);
    }

    #[test]
    fn test_missing_status_is_not_transformed() {
        let mut resource = appointment("SCHEDULED");
        resource.remove_field("status");
        let (response, validation) = transformer().transform(resource, &TenantContext::new("test").unwrap());
        assert!(response.is_none());
        assert_eq!(validation.issues()[0].code(), REQ_FIELD);
        assert_eq!(validation.issues()[0].location().as_str(), "Appointment.status");
    }

    #[test]
    fn test_start_end_and_participant_rules() {
        let mut resource = appointment("SCHEDULED");
        resource.remove_field("end");
        resource
            .set_field("participant", json!([{"status": "accepted"}]))
            .unwrap();
        let (_, validation) = transformer().transform(resource, &TenantContext::new("test").unwrap());
        let codes: Vec<&str> = validation.issues().iter().map(|i| i.code()).collect();
        assert_eq!(codes, vec![RONIN_APPT_002, RONIN_APPT_003]);
        assert_eq!(
            validation.issues()[1].location().as_str(),
            "Appointment.participant[0]"
        );
    }

    #[test]
    fn test_cancelled_appointment_may_be_unscheduled() {
        let mut resource = appointment("cancelled");
        resource.remove_field("start");
        resource.remove_field("end");
        let validation = transformer().validate(&resource, None);
        assert!(validation.issues().iter().all(|i| i.code() != RONIN_APPT_002));
    }
}
