//! Ronin business-rule helpers shared by the resource configurations.

use crate::concept_map::MappedField;
use crate::config::RoninConfig;
use crate::datatypes::{Coding, Reference};
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::resource::Resource;
use crate::validation::Validation;

/// Checks the asserted `type` of a reference against `allowed`.
///
/// Display-only and contained (`#id`) references are not checked. Issues:
/// missing `type` at `<location>.type`, missing data-authority extension at
/// `<location>.type.extension`, disallowed type at `<location>`.
pub fn validate_reference_type(
    reference: &Reference,
    allowed: &[&str],
    config: &RoninConfig,
    location: &LocationContext,
    validation: &mut Validation,
) {
    if reference.reference.is_none() || reference.is_contained() {
        return;
    }
    let Some(type_) = reference.type_.as_deref() else {
        validation.add_rule(Rule::required_reference_type(), location.append("type"));
        return;
    };
    validation.check_true(
        reference.has_type_extension(&config.data_authority.extension_url),
        Rule::required_data_authority_extension(),
        &location.append("type").append("extension"),
    );
    validation.check_true(
        allowed.iter().any(|candidate| *candidate == type_),
        Rule::invalid_reference_type(allowed),
        location,
    );
}

/// `INV_VALUE_SET` when none of `codings` is in `value_set`, including when
/// there are no codings at all. An empty value set accepts everything.
pub fn validate_value_set_membership(
    codings: &[Coding],
    value_set: &[Coding],
    field: &str,
    parent: &LocationContext,
    validation: &mut Validation,
) -> bool {
    if value_set.is_empty() {
        return true;
    }
    let member = codings
        .iter()
        .any(|coding| value_set.iter().any(|allowed| allowed.matches(coding)));
    let rendered: Vec<&str> = codings.iter().filter_map(|c| c.code.as_deref()).collect();
    validation.check_true(
        member,
        Rule::invalid_value_set(&rendered.join(", ")),
        &parent.append(field),
    )
}

/// A concept-mapped field that is present must carry its provenance
/// extension with the expected value type.
pub fn validate_provenance_extension(
    resource: &Resource,
    mapped: &MappedField,
    parent: &LocationContext,
    validation: &mut Validation,
) {
    if !resource.has_field(mapped.field) {
        return;
    }
    let present = resource.extensions().is_ok_and(|extensions| {
        extensions.iter().any(|extension| {
            extension.has_url(mapped.extension_url)
                && extension
                    .value
                    .as_ref()
                    .is_some_and(|value| value.type_name() == mapped.provenance_type())
        })
    });
    validation.check_true(
        present,
        Rule::error(mapped.rule_code, mapped.rule_description),
        &parent.append("extension"),
    );
}

/// `REQ_FIELD` when empty, `INV_CARDINALITY` when more than one.
pub fn validate_exactly_one<T>(
    values: &[T],
    field: &str,
    parent: &LocationContext,
    validation: &mut Validation,
) -> bool {
    if !validation.require_non_empty(values, field, parent) {
        return false;
    }
    validation.check_true(
        values.len() == 1,
        Rule::invalid_cardinality(field, 1),
        &parent.append(field),
    )
}

/// Records `rule` when more than one of `present` holds, or when none does
/// and one is `required`.
pub fn validate_mutually_exclusive(
    present: &[bool],
    required: bool,
    rule: Rule,
    location: &LocationContext,
    validation: &mut Validation,
) -> bool {
    let count = present.iter().filter(|p| **p).count();
    validation.check_true(count <= 1 && (!required || count == 1), rule, location)
}
