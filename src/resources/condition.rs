use super::{read, read_list, ronin_pipeline, validate_reference_field, validate_ronin_base};
use crate::concept_map::{FieldKind, MappedField};
use crate::datatypes::{CodeableConcept, Coding};
use crate::identifier::IdentifierPolicy;
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::pipeline::ValidationPipeline;
use crate::profile::{ElementDefinition, ProfileDefinition};
use crate::resource::Resource;
use crate::rules::{validate_exactly_one, validate_value_set_membership};
use crate::transform::{ProfileContext, RoninProfile};
use crate::validation::Validation;

pub const RONIN_CONDITION_PROFILE: &str =
    "http://projectronin.io/fhir/StructureDefinition/ronin-conditionProblemsHealthConcerns";

pub const RONIN_CND_001: &str = "RONIN_CND_001";

const CONDITION_CATEGORY: &str = "http://terminology.hl7.org/CodeSystem/condition-category";
const US_CORE_CONDITION_CATEGORY: &str = "http://hl7.org/fhir/us/core/CodeSystem/condition-category";

const MAPPED_FIELDS: &[MappedField] = &[MappedField {
    field: "code",
    field_key: "Condition.code",
    extension_url: "http://projectronin.io/fhir/StructureDefinition/Extension/tenant-sourceConditionCode",
    kind: FieldKind::CodeableConcept,
    rule_code: RONIN_CND_001,
    rule_description: "Tenant source condition code extension is missing or invalid",
}];

fn problem_list_categories() -> Vec<Coding> {
    vec![
        Coding::new(CONDITION_CATEGORY, "problem-list-item"),
        Coding::new(US_CORE_CONDITION_CATEGORY, "health-concern"),
    ]
}

/// Problem-list items and health concerns.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConditionProfile;

fn r4_definition() -> ProfileDefinition {
    ProfileDefinition::new("http://hl7.org/fhir/StructureDefinition/Condition", "Condition")
        .element(ElementDefinition::new("identifier", &["Identifier"]).list())
        .element(
            ElementDefinition::new("clinicalStatus", &["CodeableConcept"]).bound_to(
                ["active", "recurrence", "relapse", "inactive", "remission", "resolved"]
                    .iter()
                    .map(|code| {
                        Coding::new("http://terminology.hl7.org/CodeSystem/condition-clinical", *code)
                    })
                    .collect(),
            ),
        )
        .element(ElementDefinition::new("verificationStatus", &["CodeableConcept"]))
        .element(ElementDefinition::new("category", &["CodeableConcept"]).list())
        .element(ElementDefinition::new("code", &["CodeableConcept"]))
        .element(ElementDefinition::new("subject", &["Reference"]).required())
        .element(ElementDefinition::new("encounter", &["Reference"]))
        .element(ElementDefinition::new(
            "onset[x]",
            &["dateTime", "Age", "Period", "Range", "string"],
        ))
        .element(ElementDefinition::new(
            "abatement[x]",
            &["dateTime", "Age", "Period", "Range", "string"],
        ))
        .element(ElementDefinition::new("recordedDate", &["dateTime"]))
}

fn us_core_definition() -> ProfileDefinition {
    ProfileDefinition::new(
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-condition-problems-health-concerns",
        "Condition",
    )
    .element(ElementDefinition::new("code", &["CodeableConcept"]).required())
}

impl RoninProfile for ConditionProfile {
    fn resource_type(&self) -> &'static str {
        "Condition"
    }

    fn profile_url(&self) -> &'static str {
        RONIN_CONDITION_PROFILE
    }

    fn qualifies(&self, resource: &Resource) -> bool {
        let allowed = problem_list_categories();
        read_list::<CodeableConcept>(resource, "category")
            .iter()
            .flat_map(|category| category.coding.iter())
            .any(|coding| allowed.iter().any(|a| a.matches(coding)))
    }

    fn identifier_policy(&self) -> IdentifierPolicy {
        IdentifierPolicy::with_data_authority()
    }

    fn mapped_fields(&self) -> &'static [MappedField] {
        MAPPED_FIELDS
    }

    fn pipeline(&self, context: &ProfileContext) -> ValidationPipeline {
        let config = context.config.clone();
        let mut categories = context
            .registry
            .get_required_value_set("Condition.category", RONIN_CONDITION_PROFILE);
        if categories.is_empty() {
            categories = problem_list_categories();
        }
        ronin_pipeline(
            "Condition",
            r4_definition(),
            us_core_definition(),
            move |resource: &Resource, location: &LocationContext| {
                let mut validation = Validation::new();
                validate_ronin_base(resource, location, &config, MAPPED_FIELDS, &mut validation);

                let category = read_list::<CodeableConcept>(resource, "category");
                if validate_exactly_one(&category, "category", location, &mut validation) {
                    validate_value_set_membership(
                        &category[0].coding,
                        &categories,
                        "category",
                        location,
                        &mut validation,
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
                if read::<CodeableConcept>(resource, "code").is_some_and(|c| c.coding.is_empty()) {
                    validation.add_rule(
                        Rule::required_field("coding"),
                        location.append("code").append("coding"),
                    );
                }
                validation
            },
        )
    }
}
