use criterion::{Criterion, criterion_group, criterion_main};
use octofhir_ronin::localizer::localize;
use octofhir_ronin::*;
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;

fn create_registry() -> InMemoryConceptMapRegistry {
    let mut registry = InMemoryConceptMapRegistry::new();

    // One mapping per tenant code
    for i in 0..500 {
        registry.add_mapping(
            "bench",
            "Condition.code",
            &CodeableConcept::from_coding(Coding::new("http://tenant.org/dx", format!("DX-{i}"))),
            ConceptMapping {
                value: CodeableConcept::from_coding(Coding::new(
                    "http://snomed.info/sct",
                    format!("{}", 100_000 + i),
                )),
                metadata: vec![],
            },
        );
    }
    registry
}

fn create_condition(references: usize) -> Resource {
    let evidence: Vec<_> = (0..references)
        .map(|i| json!({"detail": [{"reference": format!("Observation/obs-{i}")}]}))
        .collect();
    Resource::from_json(json!({
        "resourceType": "Condition",
        "id": "c-1",
        "category": [{
            "coding": [{
                "system": "http://terminology.hl7.org/CodeSystem/condition-category",
                "code": "problem-list-item"
            }]
        }],
        "code": {"coding": [{"system": "http://tenant.org/dx", "code": "DX-42"}]},
        "subject": {"reference": "Patient/1234"},
        "evidence": evidence
    }))
    .unwrap()
}

fn bench_transform(c: &mut Criterion) {
    let transformer = RoninTransformer::new(
        ConditionProfile,
        Arc::new(create_registry()),
        Arc::new(RoninConfig::default()),
    );
    let tenant = TenantContext::new("bench").unwrap();
    let condition = create_condition(10);

    c.bench_function("condition_transform", |b| {
        b.iter(|| black_box(transformer.transform(condition.clone(), &tenant)))
    });
}

fn bench_validate(c: &mut Criterion) {
    let transformer = RoninTransformer::new(
        ConditionProfile,
        Arc::new(create_registry()),
        Arc::new(RoninConfig::default()),
    );
    let (response, _) = transformer.transform(create_condition(10), &TenantContext::new("bench").unwrap());
    let resource = response.unwrap().resource;

    c.bench_function("condition_validate", |b| {
        b.iter(|| black_box(transformer.validate(&resource, None)))
    });
}

fn bench_localize(c: &mut Criterion) {
    let condition = create_condition(200);

    c.bench_function("localize_200_references", |b| {
        b.iter(|| black_box(localize(condition.clone(), "bench")))
    });
}

criterion_group!(benches, bench_transform, bench_validate, bench_localize);

criterion_main!(benches);
