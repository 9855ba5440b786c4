//! Ronin identifier synthesis and checks.
//!
//! Every transformed resource gains a tenant identifier and a FHIR-id
//! identifier; some types also carry a data-authority identifier, and Patient
//! additionally gets a business identifier (MRN) picked by an
//! [`IdentifierResolver`]. Normalization only ever appends.

use crate::config::{IdentifierTypeConfig, RoninConfig};
use crate::datatypes::Identifier;
use crate::error::{Result, RoninError};
use crate::issue::Rule;
use crate::location::LocationContext;
use crate::resource::Resource;
use crate::validation::Validation;
use std::collections::HashMap;

pub const RONIN_TNNT_ID_001: &str = "RONIN_TNNT_ID_001";
pub const RONIN_TNNT_ID_002: &str = "RONIN_TNNT_ID_002";
pub const RONIN_TNNT_ID_003: &str = "RONIN_TNNT_ID_003";
pub const RONIN_FHIR_ID_001: &str = "RONIN_FHIR_ID_001";
pub const RONIN_FHIR_ID_002: &str = "RONIN_FHIR_ID_002";
pub const RONIN_FHIR_ID_003: &str = "RONIN_FHIR_ID_003";
pub const RONIN_DAUTH_ID_001: &str = "RONIN_DAUTH_ID_001";
pub const RONIN_DAUTH_ID_002: &str = "RONIN_DAUTH_ID_002";
pub const RONIN_DAUTH_ID_003: &str = "RONIN_DAUTH_ID_003";

/// Which optional identifiers a resource type receives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IdentifierPolicy {
    pub data_authority: bool,
    /// Resolve and append the tenant's business identifier (MRN).
    pub business_identifier: bool,
}

impl IdentifierPolicy {
    pub fn with_data_authority() -> Self {
        Self {
            data_authority: true,
            business_identifier: false,
        }
    }
}

/// Picks the tenant's canonical business identifier out of a vendor list.
///
/// Fails with [`RoninError::VendorIdentifierNotFound`] when nothing qualifies.
pub trait IdentifierResolver: Send + Sync {
    fn resolve(&self, tenant: &str, identifiers: &[Identifier]) -> Result<Identifier>;
}

/// Resolver backed by a fixed tenant -> source system table.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentifierResolver {
    systems: HashMap<String, String>,
}

impl StaticIdentifierResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(mut self, tenant: impl Into<String>, system: impl Into<String>) -> Self {
        self.systems.insert(tenant.into(), system.into());
        self
    }
}

impl IdentifierResolver for StaticIdentifierResolver {
    fn resolve(&self, tenant: &str, identifiers: &[Identifier]) -> Result<Identifier> {
        let system = self
            .systems
            .get(tenant)
            .ok_or_else(|| RoninError::vendor_identifier_not_found(tenant))?;
        identifiers
            .iter()
            .find(|identifier| {
                identifier.has_system(system)
                    && identifier.value.as_deref().is_some_and(|v| !v.is_empty())
            })
            .cloned()
            .ok_or_else(|| RoninError::vendor_identifier_not_found(tenant))
    }
}

fn ronin_identifier(kind: &IdentifierTypeConfig, value: &str) -> Identifier {
    Identifier::new(kind.system.clone(), value).with_type(kind.type_concept())
}

/// Appends the Ronin identifiers to `resource.identifier`.
///
/// Order: tenant, FHIR id, data authority (per policy), business identifier
/// (per policy). Existing identifiers are left in place ahead of them.
pub fn normalize_identifiers(
    mut resource: Resource,
    tenant: &str,
    raw_id: &str,
    policy: IdentifierPolicy,
    config: &RoninConfig,
    resolver: Option<&dyn IdentifierResolver>,
) -> Result<Resource> {
    let business = if policy.business_identifier {
        let resolver = resolver.ok_or_else(|| {
            RoninError::configuration(format!(
                "{} requires an identifier resolver",
                resource.resource_type()
            ))
        })?;
        let resolved = resolver.resolve(tenant, &resource.identifiers()?)?;
        let Some(value) = resolved.value.filter(|v| !v.is_empty()) else {
            return Err(RoninError::vendor_identifier_not_found(tenant));
        };
        Some(ronin_identifier(&config.mrn_identifier, &value).with_use("usual"))
    } else {
        None
    };

    resource.push_to_list(
        "identifier",
        ronin_identifier(&config.tenant_identifier, tenant).with_use("usual"),
    )?;
    resource.push_to_list(
        "identifier",
        ronin_identifier(&config.fhir_id_identifier, raw_id),
    )?;
    if policy.data_authority {
        resource.push_to_list(
            "identifier",
            ronin_identifier(&config.data_authority.identifier, &config.data_authority.value),
        )?;
    }
    if let Some(business) = business {
        resource.push_to_list("identifier", business)?;
    }
    Ok(resource)
}

struct IdentifierCheck<'a> {
    kind: &'a IdentifierTypeConfig,
    label: &'static str,
    codes: [&'static str; 3],
    missing: &'static str,
}

/// Checks the tenant, FHIR id and optionally the data-authority identifier.
/// Every issue is reported at `<parent>.identifier`.
pub fn validate_ronin_identifiers(
    identifiers: &[Identifier],
    require_data_authority: bool,
    config: &RoninConfig,
    parent: &LocationContext,
    validation: &mut Validation,
) {
    let mut checks = vec![
        IdentifierCheck {
            kind: &config.tenant_identifier,
            label: "Tenant identifier",
            codes: [RONIN_TNNT_ID_001, RONIN_TNNT_ID_002, RONIN_TNNT_ID_003],
            missing: "Tenant identifier is required",
        },
        IdentifierCheck {
            kind: &config.fhir_id_identifier,
            label: "FHIR identifier",
            codes: [RONIN_FHIR_ID_001, RONIN_FHIR_ID_002, RONIN_FHIR_ID_003],
            missing: "FHIR identifier is required",
        },
    ];
    if require_data_authority {
        checks.push(IdentifierCheck {
            kind: &config.data_authority.identifier,
            label: "Data Authority identifier",
            codes: [RONIN_DAUTH_ID_001, RONIN_DAUTH_ID_002, RONIN_DAUTH_ID_003],
            missing: "Data Authority identifier required",
        });
    }

    let location = parent.append("identifier");
    for check in checks {
        let [required, wrong_type, no_value] = check.codes;
        let Some(identifier) = identifiers.iter().find(|i| i.has_system(&check.kind.system))
        else {
            validation.add_rule(Rule::error(required, check.missing), location.clone());
            continue;
        };

        let typed = identifier
            .type_
            .as_ref()
            .is_some_and(|t| t.has_coding(&check.kind.type_system, &check.kind.type_code));
        validation.check_true(
            typed,
            Rule::error(
                wrong_type,
                format!(
                    "{} provided without proper CodeableConcept defined",
                    check.label
                ),
            ),
            &location,
        );
        validation.check_true(
            identifier.value.as_deref().is_some_and(|v| !v.is_empty()),
            Rule::error(no_value, format!("{} value is required", check.label)),
            &location,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn patient() -> Resource {
        Resource::from_json(json!({
            "resourceType": "Patient",
            "id": "12345",
            "identifier": [
                {"system": "urn:oid:1.2.840.114350.1.13.0.1.7.5.737384.14", "value": "MRN-1"},
                {"system": "http://hl7.org/fhir/sid/us-ssn", "value": "000-00-0000"}
            ]
        }))
        .unwrap()
    }

    fn systems(resource: &Resource) -> Vec<String> {
        resource
            .identifiers()
            .unwrap()
            .into_iter()
            .filter_map(|i| i.system)
            .collect()
    }

    #[test]
    fn test_ronin_identifiers_are_appended_in_order() {
        let config = RoninConfig::default();
        let normalized = normalize_identifiers(
            patient(),
            "test",
            "12345",
            IdentifierPolicy::with_data_authority(),
            &config,
            None,
        )
        .unwrap();

        assert_eq!(
            systems(&normalized),
            vec![
                "urn:oid:1.2.840.114350.1.13.0.1.7.5.737384.14",
                "http://hl7.org/fhir/sid/us-ssn",
                "http://projectronin.com/id/tenantId",
                "http://projectronin.com/id/fhir",
                "http://projectronin.com/id/dataAuthorityId",
            ]
        );
        let identifiers = normalized.identifiers().unwrap();
        assert_eq!(identifiers[2].value.as_deref(), Some("test"));
        assert_eq!(identifiers[3].value.as_deref(), Some("12345"));
        assert_eq!(identifiers[4].value.as_deref(), Some("EHR Data Authority"));
    }

    #[test]
    fn test_business_identifier_is_resolved() {
        let config = RoninConfig::default();
        let resolver = StaticIdentifierResolver::new()
            .with_tenant("test", "urn:oid:1.2.840.114350.1.13.0.1.7.5.737384.14");
        let policy = IdentifierPolicy {
            data_authority: true,
            business_identifier: true,
        };
        let normalized =
            normalize_identifiers(patient(), "test", "12345", policy, &config, Some(&resolver))
                .unwrap();

        let identifiers = normalized.identifiers().unwrap();
        let mrn = identifiers.last().unwrap();
        assert!(mrn.has_system("http://projectronin.com/id/mrn"));
        assert_eq!(mrn.value.as_deref(), Some("MRN-1"));
        assert!(mrn.type_.as_ref().unwrap().has_coding(
            &config.mrn_identifier.type_system,
            &config.mrn_identifier.type_code
        ));
    }

    #[test]
    fn test_unresolvable_business_identifier_fails() {
        let config = RoninConfig::default();
        let resolver = StaticIdentifierResolver::new().with_tenant("test", "http://other");
        let policy = IdentifierPolicy {
            data_authority: false,
            business_identifier: true,
        };
        let err =
            normalize_identifiers(patient(), "test", "12345", policy, &config, Some(&resolver))
                .unwrap_err();
        assert!(matches!(err, RoninError::VendorIdentifierNotFound { .. }));
    }

    #[test]
    fn test_empty_identifiers_report_tenant_once() {
        let config = RoninConfig::default();
        let mut validation = Validation::new();
        validate_ronin_identifiers(
            &[],
            false,
            &config,
            &LocationContext::new("Condition"),
            &mut validation,
        );

        let tenant: Vec<String> = validation
            .issues()
            .iter()
            .filter(|i| i.code() == RONIN_TNNT_ID_001)
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            tenant,
            vec!["ERROR RONIN_TNNT_ID_001: Tenant identifier is required @ Condition.identifier"]
        );
        assert_eq!(validation.len(), 2);
    }

    #[test]
    fn test_identifier_shape_checks() {
        let config = RoninConfig::default();
        let identifiers = vec![
            Identifier::new(config.tenant_identifier.system.clone(), "test"),
            Identifier {
                value: None,
                ..ronin_identifier(&config.fhir_id_identifier, "x")
            },
        ];
        let mut validation = Validation::new();
        validate_ronin_identifiers(
            &identifiers,
            true,
            &config,
            &LocationContext::new("Procedure"),
            &mut validation,
        );

        let codes: Vec<&str> = validation.issues().iter().map(|i| i.code()).collect();
        assert_eq!(
            codes,
            vec![RONIN_TNNT_ID_002, RONIN_FHIR_ID_003, RONIN_DAUTH_ID_001]
        );
    }
}
