//! Generic rewrite traversal over resource trees.
//!
//! A [`Fold`] receives every Reference and every coding/identifier `system`
//! found anywhere in a resource: nested backbones, lists, choice values and
//! contained resources alike. Walking is post-order, so a reference nested in
//! `Reference.identifier.assigner` is folded before its parent.

use crate::datatypes::Reference;
use crate::location::LocationContext;
use crate::resource::Resource;
use serde::Deserialize;
use serde_json::{Map, Value};

pub trait Fold {
    fn fold_reference(&mut self, reference: Reference, _location: &LocationContext) -> Reference {
        reference
    }

    /// Called for every string `system` member (Coding, Identifier, Quantity).
    fn fold_system(&mut self, system: String, _location: &LocationContext) -> String {
        system
    }
}

pub fn fold_resource<F: Fold + ?Sized>(resource: Resource, folder: &mut F) -> Resource {
    let (resource_type, fields) = resource.into_parts();
    let location = LocationContext::new(resource_type.as_str());
    let fields = fold_object(fields, folder, &location);
    Resource::from_parts(resource_type, fields)
}

pub fn fold_value<F: Fold + ?Sized>(value: Value, folder: &mut F, location: &LocationContext) -> Value {
    match value {
        Value::Object(map) => {
            let map = fold_object(map, folder, location);
            if is_reference(&map) {
                fold_reference_object(map, folder, location)
            } else {
                Value::Object(map)
            }
        }
        other => other,
    }
}

fn fold_object<F: Fold + ?Sized>(
    map: Map<String, Value>,
    folder: &mut F,
    location: &LocationContext,
) -> Map<String, Value> {
    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Array(items) => Value::Array(
                    items
                        .into_iter()
                        .enumerate()
                        .map(|(index, item)| {
                            fold_value(item, folder, &location.append_index(&key, index))
                        })
                        .collect(),
                ),
                Value::String(system) if key == "system" => {
                    Value::String(folder.fold_system(system, &location.append(&key)))
                }
                other => fold_value(other, folder, &location.append(&key)),
            };
            (key, value)
        })
        .collect()
}

/// Objects with a string `reference` member that are not themselves resources.
fn is_reference(map: &Map<String, Value>) -> bool {
    matches!(map.get("reference"), Some(Value::String(_))) && !map.contains_key("resourceType")
}

fn fold_reference_object<F: Fold + ?Sized>(
    map: Map<String, Value>,
    folder: &mut F,
    location: &LocationContext,
) -> Value {
    let original = Value::Object(map);
    match Reference::deserialize(&original) {
        Ok(reference) => {
            let folded = folder.fold_reference(reference, location);
            serde_json::to_value(folded).unwrap_or(original)
        }
        Err(e) => {
            tracing::trace!("Skipping unreadable reference at {}: {}", location, e);
            original
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        references: Vec<String>,
        systems: Vec<String>,
    }

    impl Fold for Recorder {
        fn fold_reference(&mut self, reference: Reference, location: &LocationContext) -> Reference {
            self.references.push(location.to_string());
            reference
        }

        fn fold_system(&mut self, system: String, location: &LocationContext) -> String {
            self.systems.push(location.to_string());
            system
        }
    }

    #[test]
    fn test_visits_nested_references_post_order() {
        let resource = Resource::from_json(json!({
            "resourceType": "CarePlan",
            "id": "cp-1",
            "subject": {
                "reference": "Patient/1",
                "identifier": {
                    "system": "http://example.org",
                    "value": "x",
                    "assigner": {"reference": "Organization/9"}
                }
            },
            "activity": [
                {"reference": {"reference": "ServiceRequest/2"}},
                {"detail": {"location": {"reference": "Location/3"}}}
            ],
            "contained": [
                {"resourceType": "Goal", "id": "g", "subject": {"reference": "Patient/1"}}
            ]
        }))
        .unwrap();

        let mut recorder = Recorder::default();
        let folded = fold_resource(resource.clone(), &mut recorder);

        assert_eq!(folded, resource);
        assert_eq!(
            recorder.references,
            vec![
                "CarePlan.subject.identifier.assigner",
                "CarePlan.subject",
                "CarePlan.activity[0].reference",
                "CarePlan.activity[1].detail.location",
                "CarePlan.contained[0].subject",
            ]
        );
        assert_eq!(recorder.systems, vec!["CarePlan.subject.identifier.system"]);
    }

    #[test]
    fn test_display_only_reference_is_not_visited() {
        let resource = Resource::from_json(json!({
            "resourceType": "Condition",
            "asserter": {"display": "Dr. Smith"}
        }))
        .unwrap();
        let mut recorder = Recorder::default();
        fold_resource(resource, &mut recorder);
        assert!(recorder.references.is_empty());
    }
}
