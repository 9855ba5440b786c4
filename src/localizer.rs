//! Tenant localization of resource ids and references.

use crate::datatypes::Reference;
use crate::fold::{Fold, fold_resource};
use crate::location::LocationContext;
use crate::resource::Resource;
use once_cell::sync::Lazy;
use regex::Regex;

/// `[base/]Type/id[/_history/vid]`
static RELATIVE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:https?://\S+/)?([A-Z][A-Za-z]+)/([A-Za-z0-9\-.]{1,64})(/_history/[A-Za-z0-9\-.]{1,64})?$",
    )
    .expect("relative reference pattern is valid")
});

/// Prefixes `id` with `{tenant}-` unless it already carries that prefix.
///
/// The result is not truncated. A source id near the 64-character FHIR limit
/// can exceed it once prefixed, and the structural check then reports
/// `INV_PRIM` on the transformed `id`.
pub fn localize_id(id: &str, tenant: &str) -> String {
    if is_localized(id, tenant) {
        id.to_string()
    } else {
        format!("{tenant}-{id}")
    }
}

fn is_localized(id: &str, tenant: &str) -> bool {
    id.strip_prefix(tenant)
        .is_some_and(|rest| rest.starts_with('-'))
}

/// Splits a `Type/id` reference into its resource type and id.
pub fn parse_reference(reference: &str) -> Option<(&str, &str)> {
    let captures = RELATIVE_REFERENCE.captures(reference)?;
    let resource_type = captures.get(1)?.as_str();
    let id = captures.get(2)?.as_str();
    Some((resource_type, id))
}

/// The localized form of a reference string, or `None` when it must be left
/// as-is (contained, unparseable, or already prefixed).
pub fn localize_reference_string(reference: &str, tenant: &str) -> Option<String> {
    if reference.starts_with('#') {
        return None;
    }
    let captures = RELATIVE_REFERENCE.captures(reference)?;
    let resource_type = captures.get(1)?.as_str();
    let id = captures.get(2)?.as_str();
    if is_localized(id, tenant) && !reference.contains("://") {
        return None;
    }
    let history = captures.get(3).map_or("", |m| m.as_str());
    Some(format!(
        "{resource_type}/{}{history}",
        localize_id(id, tenant)
    ))
}

/// Rewrites only the `reference` member; `type`, `display` and `identifier`
/// are kept as they are.
pub fn localize_reference(mut reference: Reference, tenant: &str) -> Reference {
    if let Some(localized) = reference
        .reference
        .as_deref()
        .and_then(|r| localize_reference_string(r, tenant))
    {
        reference.reference = Some(localized);
    }
    reference
}

struct Localizer<'a> {
    tenant: &'a str,
}

impl Fold for Localizer<'_> {
    fn fold_reference(&mut self, reference: Reference, location: &LocationContext) -> Reference {
        let localized = localize_reference(reference, self.tenant);
        tracing::trace!(
            "Localized reference at {} to {:?}",
            location,
            localized.reference
        );
        localized
    }
}

/// Localizes every reference in the resource tree. The resource id is left to
/// the caller.
pub fn localize(resource: Resource, tenant: &str) -> Resource {
    fold_resource(resource, &mut Localizer { tenant })
}
