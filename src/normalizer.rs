//! Tenant-independent normalization applied before localization.
//!
//! Two rewrites, both driven by [`RoninConfig`]:
//! - OID code system URIs (`urn:oid:2.16.840.1.113883.6.1`) become their
//!   canonical URLs (`http://loinc.org`) on codings, identifiers and quantities.
//! - References whose `type` is missing get it from their `Type/id` form,
//!   together with the data-authority extension on `_type`.

use crate::config::RoninConfig;
use crate::datatypes::{DynamicValue, Element, Extension, Identifier, Reference};
use crate::fold::{Fold, fold_resource};
use crate::localizer::parse_reference;
use crate::location::LocationContext;
use crate::resource::Resource;

pub struct Normalizer<'a> {
    config: &'a RoninConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(config: &'a RoninConfig) -> Self {
        Self { config }
    }

    pub fn normalize(&mut self, resource: Resource) -> Resource {
        if !self.config.normalize_coding_systems && !self.config.populate_reference_types {
            return resource;
        }
        fold_resource(resource, self)
    }
}

impl Fold for Normalizer<'_> {
    fn fold_reference(&mut self, mut reference: Reference, location: &LocationContext) -> Reference {
        if !self.config.populate_reference_types || reference.type_.is_some() {
            return reference;
        }
        let Some((resource_type, _)) = reference.reference.as_deref().and_then(parse_reference)
        else {
            return reference;
        };

        tracing::trace!("Populating reference type {} at {}", resource_type, location);
        reference.type_ = Some(resource_type.to_string());
        let element = reference.type_element.get_or_insert_with(Element::default);
        if !element
            .extension
            .iter()
            .any(|e| e.has_url(&self.config.data_authority.extension_url))
        {
            element.extension.push(data_authority_extension(self.config));
        }
        reference
    }

    fn fold_system(&mut self, system: String, _location: &LocationContext) -> String {
        if !self.config.normalize_coding_systems {
            return system;
        }
        match self.config.system_mappings.get(&system) {
            Some(canonical) => canonical.clone(),
            None => system,
        }
    }
}

/// Extension asserting the data authority of a reference's target.
pub fn data_authority_extension(config: &RoninConfig) -> Extension {
    let authority = &config.data_authority;
    Extension::new(
        authority.extension_url.clone(),
        DynamicValue::Identifier(
            Identifier::new(authority.identifier.system.clone(), authority.value.clone())
                .with_type(authority.identifier.type_concept()),
        ),
    )
}
