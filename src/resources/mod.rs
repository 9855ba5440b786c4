//! Thin per-resource Ronin profiles built on the shared engine.

pub mod appointment;
pub mod care_plan;
pub mod condition;
pub mod observation;
pub mod patient;
pub mod procedure;

pub use appointment::AppointmentProfile;
pub use care_plan::CarePlanProfile;
pub use condition::ConditionProfile;
pub use observation::LaboratoryResultProfile;
pub use patient::PatientProfile;
pub use procedure::ProcedureProfile;

use crate::concept_map::MappedField;
use crate::config::RoninConfig;
use crate::datatypes::Reference;
use crate::identifier::validate_ronin_identifiers;
use crate::location::LocationContext;
use crate::pipeline::{PipelineStage, ValidationPipeline};
use crate::profile::{ProfileDefinition, ProfileValidator, StructuralValidator};
use crate::resource::Resource;
use crate::rules::{validate_provenance_extension, validate_reference_type};
use crate::validation::Validation;
use serde::de::DeserializeOwned;

/// Structural, R4, US Core and Ronin stages in that order.
pub(crate) fn ronin_pipeline<F>(
    resource_type: &'static str,
    base: ProfileDefinition,
    overlay: ProfileDefinition,
    business_rules: F,
) -> ValidationPipeline
where
    F: Fn(&Resource, &LocationContext) -> Validation + Send + Sync + 'static,
{
    ValidationPipeline::builder()
        .stage(PipelineStage::Structural, StructuralValidator::new(resource_type))
        .stage(PipelineStage::BaseProfile, ProfileValidator::new(base))
        .stage(PipelineStage::OverlayProfile, ProfileValidator::new(overlay))
        .stage(PipelineStage::BusinessRules, business_rules)
        .build()
}

/// Identifier and provenance checks every Ronin profile starts with.
pub(crate) fn validate_ronin_base(
    resource: &Resource,
    location: &LocationContext,
    config: &RoninConfig,
    mapped_fields: &[MappedField],
    validation: &mut Validation,
) {
    // an unreadable identifier list is reported by the structural stage
    if let Ok(identifiers) = resource.identifiers() {
        validate_ronin_identifiers(&identifiers, true, config, location, validation);
    }
    for mapped in mapped_fields {
        validate_provenance_extension(resource, mapped, location, validation);
    }
}

/// Typed read for business rules; unreadable values are left to the profile
/// stages.
pub(crate) fn read<T: DeserializeOwned>(resource: &Resource, field: &str) -> Option<T> {
    resource.get(field).ok().flatten()
}

pub(crate) fn read_list<T: DeserializeOwned>(resource: &Resource, field: &str) -> Vec<T> {
    resource.get_list(field).unwrap_or_default()
}

pub(crate) fn validate_reference_field(
    resource: &Resource,
    field: &str,
    allowed: &[&str],
    config: &RoninConfig,
    location: &LocationContext,
    validation: &mut Validation,
) {
    if let Some(reference) = read::<Reference>(resource, field) {
        validate_reference_type(&reference, allowed, config, &location.append(field), validation);
    }
}
