use octofhir_ronin::*;
use serde_json::{Value, json};
use std::sync::Arc;

pub const TENANT: &str = "test";
pub const EPIC_MRN_SYSTEM: &str = "urn:oid:1.2.840.114350.1.13.0.1.7.5.737384.14";

#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[allow(dead_code)]
pub fn tenant() -> TenantContext {
    TenantContext::new(TENANT).unwrap()
}

#[allow(dead_code)]
pub fn resource(value: Value) -> Resource {
    Resource::from_json(value).unwrap()
}

#[allow(dead_code)]
pub fn create_test_registry() -> InMemoryConceptMapRegistry {
    let config = RoninConfig::default();
    InMemoryConceptMapRegistry::new()
        .with_mapping(
            TENANT,
            "Condition.code",
            CodeableConcept::from_coding(Coding::new("http://tenant.org/dx", "DX-1")),
            ConceptMapping {
                value: CodeableConcept::from_coding(
                    Coding::new("http://snomed.info/sct", "44054006").with_display("Diabetes"),
                ),
                metadata: vec![ConceptMapMetadata {
                    registry_entry_type: "concept-map".to_string(),
                    concept_map_name: "test-condition-code".to_string(),
                    concept_map_uuid: "cm-uuid-1".to_string(),
                    version: "1".to_string(),
                }],
            },
        )
        .with_mapping(
            TENANT,
            "Appointment.status",
            CodeableConcept::from_coding(Coding::new(
                concept_map::tenant_source_system(&config, TENANT, "Appointment.status"),
                "SCHEDULED",
            )),
            ConceptMapping {
                value: CodeableConcept::from_coding(Coding::new(
                    "http://hl7.org/fhir/appointmentstatus",
                    "booked",
                )),
                metadata: vec![],
            },
        )
}

#[allow(dead_code)]
pub fn create_test_resolver() -> StaticIdentifierResolver {
    StaticIdentifierResolver::new().with_tenant(TENANT, EPIC_MRN_SYSTEM)
}

#[allow(dead_code)]
pub fn transformer<P: RoninProfile>(profile: P) -> RoninTransformer<P> {
    RoninTransformer::new(
        profile,
        Arc::new(create_test_registry()),
        Arc::new(RoninConfig::default()),
    )
    .with_identifier_resolver(Arc::new(create_test_resolver()))
}

#[allow(dead_code)]
pub fn create_test_condition() -> Resource {
    resource(json!({
        "resourceType": "Condition",
        "id": "c-1",
        "category": [{
            "coding": [{
                "system": "http://terminology.hl7.org/CodeSystem/condition-category",
                "code": "problem-list-item"
            }]
        }],
        "code": {"coding": [{"system": "http://tenant.org/dx", "code": "DX-1"}]},
        "subject": {"reference": "Patient/1234"}
    }))
}

#[allow(dead_code)]
pub fn create_test_patient() -> Resource {
    resource(json!({
        "resourceType": "Patient",
        "id": "12345",
        "identifier": [{"system": EPIC_MRN_SYSTEM, "value": "E1234"}],
        "name": [{"family": "Doe", "given": ["Jane"]}],
        "gender": "female",
        "birthDate": "1975-07-05"
    }))
}

#[allow(dead_code)]
pub fn codes(validation: &Validation) -> Vec<&str> {
    validation.issues().iter().map(|issue| issue.code()).collect()
}

#[allow(dead_code)]
pub fn rendered(validation: &Validation) -> Vec<String> {
    validation.issues().iter().map(ToString::to_string).collect()
}
