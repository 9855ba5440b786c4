use super::{read, read_list, ronin_pipeline, validate_reference_field, validate_ronin_base};
use crate::identifier::IdentifierPolicy;
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::pipeline::ValidationPipeline;
use crate::profile::{ElementDefinition, ProfileDefinition};
use crate::resource::Resource;
use crate::transform::{ProfileContext, RoninProfile};
use crate::validation::Validation;
use serde_json::Value;

pub const RONIN_PATIENT_PROFILE: &str =
    "http://projectronin.io/fhir/StructureDefinition/ronin-patient";

pub const RONIN_PAT_001: &str = "RONIN_PAT_001";
pub const RONIN_PAT_002: &str = "RONIN_PAT_002";

const ADMINISTRATIVE_GENDER: &str = "http://hl7.org/fhir/administrative-gender";

/// Patient: the one profile that resolves a business identifier (MRN).
#[derive(Debug, Clone, Copy, Default)]
pub struct PatientProfile;

fn r4_definition() -> ProfileDefinition {
    ProfileDefinition::new("http://hl7.org/fhir/StructureDefinition/Patient", "Patient")
        .element(ElementDefinition::new("identifier", &["Identifier"]).list())
        .element(ElementDefinition::new("active", &["boolean"]))
        .element(ElementDefinition::new("name", &["HumanName"]).list())
        .element(ElementDefinition::new("telecom", &["ContactPoint"]).list())
        .element(
            ElementDefinition::new("gender", &["code"]).bound_to_codes(
                ADMINISTRATIVE_GENDER,
                &["male", "female", "other", "unknown"],
            ),
        )
        .element(ElementDefinition::new("birthDate", &["date"]))
        .element(ElementDefinition::new("deceased[x]", &["boolean", "dateTime"]))
        .element(ElementDefinition::new("address", &["Address"]).list())
        .element(ElementDefinition::new("managingOrganization", &["Reference"]))
}

fn us_core_definition() -> ProfileDefinition {
    ProfileDefinition::new(
        "http://hl7.org/fhir/us/core/StructureDefinition/us-core-patient",
        "Patient",
    )
    .element(ElementDefinition::new("identifier", &["Identifier"]).required().list())
    .element(ElementDefinition::new("name", &["HumanName"]).required().list())
    .element(ElementDefinition::new("gender", &["code"]).required())
}

impl RoninProfile for PatientProfile {
    fn resource_type(&self) -> &'static str {
        "Patient"
    }

    fn profile_url(&self) -> &'static str {
        RONIN_PATIENT_PROFILE
    }

    fn identifier_policy(&self) -> IdentifierPolicy {
        IdentifierPolicy {
            data_authority: true,
            business_identifier: true,
        }
    }

    fn pipeline(&self, context: &ProfileContext) -> ValidationPipeline {
        let config = context.config.clone();
        ronin_pipeline(
            "Patient",
            r4_definition(),
            us_core_definition(),
            move |resource: &Resource, location: &LocationContext| {
                let mut validation = Validation::new();
                validate_ronin_base(resource, location, &config, &[], &mut validation);

                let has_mrn = resource.identifiers().is_ok_and(|identifiers| {
                    identifiers.iter().any(|identifier| {
                        identifier.has_system(&config.mrn_identifier.system)
                            && identifier.value.as_deref().is_some_and(|v| !v.is_empty())
                    })
                });
                validation.check_true(
                    has_mrn,
                    Rule::error(RONIN_PAT_001, "MRN identifier is required"),
                    &location.append("identifier"),
                );

                validation.require(read::<String>(resource, "birthDate"), "birthDate", location);

                for (index, name) in read_list::<Value>(resource, "name").iter().enumerate() {
                    let named = ["family", "given", "text"]
                        .iter()
                        .any(|part| name.get(part).is_some_and(|v| !v.is_null()));
                    validation.check_true(
                        named,
                        Rule::error(
                            RONIN_PAT_002,
                            "Either Patient.name.given and/or Patient.name.family SHALL be present or a Data Absent Reason Extension SHALL be present",
                        ),
                        &location.append_index("name", index),
                    );
                }

                validate_reference_field(
                    resource,
                    "managingOrganization",
                    &["Organization"],
                    &config,
                    location,
                    &mut validation,
                );
                validation
            },
        )
    }
}
