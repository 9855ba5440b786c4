mod common;

use common::*;
use octofhir_ronin::issue::{INV_CARDINALITY, INV_DYN_VAL, INV_PRIM, INV_RES_TYPE, INV_VALUE_SET, REQ_FIELD};
use octofhir_ronin::resources::procedure::RONIN_PROC_002;
use octofhir_ronin::*;
use pretty_assertions::assert_eq;
use serde_json::json;

fn stage_marker(code: &'static str) -> impl Fn(&Resource, &LocationContext) -> Validation + Send + Sync {
    move |_: &Resource, location: &LocationContext| {
        let mut validation = Validation::new();
        validation.add_rule(Rule::error(code, "marker"), location.clone());
        validation
    }
}

#[test]
fn test_pipeline_runs_every_stage_in_order() {
    let pipeline = ValidationPipeline::builder()
        .stage(PipelineStage::BusinessRules, stage_marker("BUSINESS_1"))
        .stage(PipelineStage::Structural, stage_marker("STRUCTURAL"))
        .stage(PipelineStage::BusinessRules, stage_marker("BUSINESS_2"))
        .stage(PipelineStage::OverlayProfile, stage_marker("OVERLAY"))
        .stage(PipelineStage::BaseProfile, stage_marker("BASE"))
        .build();

    let validation = pipeline.validate(&Resource::new("Basic"), &LocationContext::new("Basic"));
    assert_eq!(
        codes(&validation),
        vec!["STRUCTURAL", "BASE", "OVERLAY", "BUSINESS_1", "BUSINESS_2"]
    );
}

#[test]
fn test_profile_definition_checks() {
    let definition = ProfileDefinition::new("http://example.org/StructureDefinition/test", "Procedure")
        .element(
            ElementDefinition::new("status", &["code"])
                .required()
                .bound_to_codes("http://hl7.org/fhir/event-status", &["completed"]),
        )
        .element(ElementDefinition::new("performed[x]", &["dateTime", "Period"]))
        .element(ElementDefinition::new("recorded", &["dateTime"]))
        .element(ElementDefinition::new("reasonCode", &["CodeableConcept"]).list().max(1));
    let validator = ProfileValidator::new(definition);

    let procedure = resource(json!({
        "resourceType": "Procedure",
        "status": "done",
        "performedString": "yesterday",
        "recorded": "2023-13-45",
        "reasonCode": [{"text": "a"}, {"text": "b"}]
    }));
    let validation = validator.validate(&procedure, &LocationContext::new("Procedure"));
    assert_eq!(
        rendered(&validation),
        vec![
            "ERROR INV_VALUE_SET: 'done' is outside of required value set @ Procedure.status",
            "ERROR INV_DYN_VAL: performed[x] can only be one of the following: DateTime, Period @ Procedure.performed[x]",
            "ERROR INV_PRIM: '2023-13-45' is not a valid dateTime @ Procedure.recorded",
            "ERROR INV_CARDINALITY: reasonCode must not contain more than 1 element(s) @ Procedure.reasonCode",
        ]
    );
    assert_eq!(
        codes(&validation),
        vec![INV_VALUE_SET, INV_DYN_VAL, INV_PRIM, INV_CARDINALITY]
    );

    let missing = validator.validate(&Resource::new("Procedure"), &LocationContext::new("Procedure"));
    assert_eq!(codes(&missing), vec![REQ_FIELD]);
}

#[test]
fn test_structural_checks_resource_type() {
    let validator = StructuralValidator::new("Condition");
    let validation = validator.validate(&create_test_patient(), &LocationContext::new("Condition"));
    assert_eq!(codes(&validation), vec![INV_RES_TYPE]);
}

#[test]
fn test_nested_location_for_reused_validation() {
    let transformer = transformer(ConditionProfile);
    let (response, _) = transformer.transform(create_test_condition(), &tenant());
    let mut condition = response.unwrap().resource;
    condition.remove_field("code");

    let parent = LocationContext::new("Bundle").append_index("entry", 0).append("resource");
    let validation = transformer.validate(&condition, Some(&parent));
    assert_eq!(
        rendered(&validation),
        vec!["ERROR REQ_FIELD: code is a required element @ Bundle.entry[0].resource.code"]
    );
}

#[test]
fn test_procedure_performed_rule() {
    let procedure = resource(json!({
        "resourceType": "Procedure",
        "id": "p-1",
        "status": "in-progress",
        "code": {"text": "Appendectomy"},
        "subject": {"reference": "Patient/1234"}
    }));
    let (_, validation) = transformer(ProcedureProfile).transform(procedure, &tenant());
    let performed: Vec<String> = validation
        .issues()
        .iter()
        .filter(|issue| issue.code() == RONIN_PROC_002)
        .map(ToString::to_string)
        .collect();
    assert_eq!(
        performed,
        vec!["ERROR RONIN_PROC_002: Performed SHALL be present if the status is 'completed' or 'in-progress' @ Procedure.performed[x]"]
    );
}

#[test]
fn test_warnings_do_not_fail_alert() {
    let mut validation = Validation::new();
    validation.add_rule(Rule::warning("WARN_1", "advisory"), LocationContext::new("Observation"));
    assert!(validation.has_issues());
    assert!(!validation.has_errors());
    assert!(validation.alert_if_errors().is_ok());

    validation.add_rule(Rule::error("ERR_1", "broken"), LocationContext::new("Observation"));
    match validation.alert_if_errors_with(Banner::Plural) {
        Err(RoninError::Validation { message }) => assert_eq!(
            message,
            "Encountered validation error(s):\nERROR ERR_1: broken @ Observation"
        ),
        other => panic!("expected a validation error, got {other:?}"),
    }
}
