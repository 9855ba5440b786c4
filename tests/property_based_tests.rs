//! Property-based tests for the transformation core.
//!
//! - Localization is idempotent for ids, reference strings and whole trees
//! - Identifier normalization only appends, preserving the original order
//! - Validation is deterministic

mod common;

use common::*;
use octofhir_ronin::identifier::normalize_identifiers;
use octofhir_ronin::localizer::{localize, localize_id, localize_reference_string};
use octofhir_ronin::*;
use proptest::prelude::*;
use serde_json::{Value, json};

// =============================================================================
// Strategies
// =============================================================================

fn tenant_mnemonic() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{2,7}"
}

fn fhir_id() -> impl Strategy<Value = String> {
    "[A-Za-z0-9][A-Za-z0-9.-]{0,30}"
}

fn reference_type() -> impl Strategy<Value = &'static str> {
    prop_oneof![
        Just("Patient"),
        Just("Practitioner"),
        Just("Encounter"),
        Just("Organization"),
        Just("Location"),
    ]
}

fn identifier() -> impl Strategy<Value = Value> {
    (
        prop::option::of(prop_oneof![
            Just("http://hospital.example.org/mrn".to_string()),
            Just("urn:oid:1.2.840.114350.1.13.0.1.7.5.737384.14".to_string()),
            Just("http://hl7.org/fhir/sid/us-ssn".to_string()),
        ]),
        prop::option::of("[a-zA-Z0-9]{1,12}"),
        prop::option::of(prop_oneof![Just("usual"), Just("official"), Just("secondary")]),
    )
        .prop_map(|(system, value, use_)| {
            let mut identifier = json!({});
            if let Some(system) = system {
                identifier["system"] = json!(system);
            }
            if let Some(value) = value {
                identifier["value"] = json!(value);
            }
            if let Some(use_) = use_ {
                identifier["use"] = json!(use_);
            }
            identifier
        })
}

fn encounter_with_references() -> impl Strategy<Value = Value> {
    (
        fhir_id(),
        (reference_type(), fhir_id()),
        prop::collection::vec((reference_type(), fhir_id()), 0..4),
    )
        .prop_map(|(id, (subject_type, subject_id), participants)| {
            let participants: Vec<Value> = participants
                .into_iter()
                .map(|(type_, id)| json!({"individual": {"reference": format!("{type_}/{id}")}}))
                .collect();
            json!({
                "resourceType": "Encounter",
                "id": id,
                "subject": {"reference": format!("{subject_type}/{subject_id}")},
                "participant": participants,
                "contained": [{"resourceType": "Location", "id": "loc"}],
                "location": [{"location": {"reference": "#loc"}}]
            })
        })
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #[test]
    fn prop_localize_id_is_idempotent(id in fhir_id(), tenant in tenant_mnemonic()) {
        let once = localize_id(&id, &tenant);
        let prefix = format!("{tenant}-");
        prop_assert!(once.starts_with(&prefix));
        prop_assert_eq!(localize_id(&once, &tenant), once);
    }

    #[test]
    fn prop_localized_reference_is_not_prefixed_again(
        type_ in reference_type(),
        id in fhir_id(),
        tenant in tenant_mnemonic(),
    ) {
        let reference = format!("{type_}/{id}");
        let localized = localize_reference_string(&reference, &tenant)
            .unwrap_or_else(|| reference.clone());
        prop_assert_eq!(&localized, &format!("{type_}/{}", localize_id(&id, &tenant)));
        prop_assert_eq!(localize_reference_string(&localized, &tenant), None);
    }

    #[test]
    fn prop_tree_localization_is_idempotent(
        encounter in encounter_with_references(),
        tenant in tenant_mnemonic(),
    ) {
        let once = localize(resource(encounter), &tenant);
        let twice = localize(once.clone(), &tenant);
        prop_assert_eq!(&twice, &once);
        prop_assert_eq!(&once.field("location").unwrap()[0]["location"]["reference"], &json!("#loc"));
    }

    #[test]
    fn prop_identifier_normalization_is_additive(
        identifiers in prop::collection::vec(identifier(), 0..5),
        id in fhir_id(),
        tenant in tenant_mnemonic(),
        data_authority in any::<bool>(),
    ) {
        let before = resource(json!({
            "resourceType": "Condition",
            "id": id,
            "identifier": identifiers,
        }));
        let policy = IdentifierPolicy { data_authority, business_identifier: false };
        let after = normalize_identifiers(
            before.clone(),
            &tenant,
            &id,
            policy,
            &RoninConfig::default(),
            None,
        )
        .unwrap();

        let original = before.field("identifier").unwrap().as_array().unwrap().clone();
        let normalized = after.field("identifier").unwrap().as_array().unwrap().clone();
        prop_assert!(normalized.len() >= original.len());
        prop_assert_eq!(&normalized[..original.len()], &original[..]);
        prop_assert_eq!(normalized.len(), original.len() + if data_authority { 3 } else { 2 });
    }

    #[test]
    fn prop_validation_is_deterministic(
        id in fhir_id(),
        identifiers in prop::collection::vec(identifier(), 0..3),
    ) {
        let transformer = transformer(ConditionProfile);
        let mut condition = create_test_condition();
        condition.set_id(id);
        condition.set_field("identifier", identifiers).unwrap();

        let first = transformer.validate(&condition, None);
        let second = transformer.validate(&condition, None);
        prop_assert_eq!(first, second);
    }
}
