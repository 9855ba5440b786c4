//! # OctoFHIR Ronin
//!
//! Validation and transformation core for tenant-scoped "Ronin" FHIR R4
//! resources.
//!
//! ## Features
//!
//! - **Layered validation**: structural, R4, US Core and Ronin business rules
//!   accumulate location-tagged issues without short-circuiting
//! - **Transformation**: tenant-prefixed ids and references, Ronin identifiers,
//!   OID system normalization and typed references
//! - **Concept mapping**: tenant codes are mapped through a pluggable registry
//!   with provenance extensions; misses fail closed
//! - **No I/O**: registries and identifier resolvers are supplied by the caller
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use octofhir_ronin::*;
//! use std::sync::Arc;
//!
//! # fn example() -> Result<()> {
//! let transformer = RoninTransformer::new(
//!     ConditionProfile,
//!     Arc::new(InMemoryConceptMapRegistry::new()),
//!     Arc::new(RoninConfig::default()),
//! );
//!
//! let condition = Resource::from_json_str(r#"{"resourceType": "Condition", "id": "1"}"#)?;
//! let tenant = TenantContext::new("tenant")?;
//! let (response, validation) = transformer.transform(condition, &tenant);
//! validation.alert_if_errors()?;
//! println!("{:?}", response.map(|r| r.resource));
//! # Ok(())
//! # }
//! ```

pub mod concept_map;
pub mod config;
pub mod datatypes;
pub mod error;
pub mod fold;
pub mod identifier;
pub mod issue;
pub mod localizer;
pub mod location;
pub mod normalizer;
pub mod pipeline;
pub mod profile;
pub mod resource;
pub mod resources;
pub mod rules;
pub mod transform;
pub mod validation;

pub use concept_map::{
    ConceptMapMetadata, ConceptMapNormalizer, ConceptMapRegistry, ConceptMapping, FieldKind,
    InMemoryConceptMapRegistry, MappedField, MappingResult,
};
pub use config::{DataAuthorityConfig, IdentifierTypeConfig, RoninConfig};
pub use datatypes::{
    CodeableConcept, Coding, DynamicValue, Element, Extension, Identifier, Period, Quantity,
    Reference,
};
pub use error::Result; // Our Result type takes precedence
pub use error::RoninError;
pub use identifier::{IdentifierPolicy, IdentifierResolver, StaticIdentifierResolver};
pub use issue::{Rule, Severity, ValidationIssue};
pub use location::LocationContext;
pub use pipeline::{PipelineStage, ResourceValidator, ValidationPipeline};
pub use profile::{ElementDefinition, ProfileDefinition, ProfileValidator, StructuralValidator};
pub use resource::Resource;
pub use resources::{
    AppointmentProfile, CarePlanProfile, ConditionProfile, LaboratoryResultProfile,
    PatientProfile, ProcedureProfile,
};
pub use transform::{ProfileContext, RoninProfile, RoninTransformer, TenantContext, TransformResponse};
pub use validation::{Banner, Validation};
