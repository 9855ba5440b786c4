use crate::datatypes::{CodeableConcept, Coding};
use crate::error::{Result, RoninError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

const RONIN_IDENTIFIER_TYPE_SYSTEM: &str =
    "http://projectronin.io/fhir/CodeSystem/RoninIdentifierType";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RoninConfig {
    pub tenant_identifier: IdentifierTypeConfig,
    pub fhir_id_identifier: IdentifierTypeConfig,
    pub mrn_identifier: IdentifierTypeConfig,
    pub data_authority: DataAuthorityConfig,
    /// Base of the per-tenant code systems wrapping plain `code` values for
    /// concept-map lookups.
    pub tenant_source_system_base: String,
    pub normalize_coding_systems: bool,
    pub populate_reference_types: bool,
    /// OID URI -> canonical code system URL
    pub system_mappings: BTreeMap<String, String>,
}

/// System and type concept of an identifier synthesized during transformation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct IdentifierTypeConfig {
    pub system: String,
    pub type_system: String,
    pub type_code: String,
    pub type_display: String,
    pub type_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataAuthorityConfig {
    pub identifier: IdentifierTypeConfig,
    pub value: String,
    pub extension_url: String,
}

impl IdentifierTypeConfig {
    fn ronin(system: &str, code: &str, display: &str, text: &str) -> Self {
        Self {
            system: system.to_string(),
            type_system: RONIN_IDENTIFIER_TYPE_SYSTEM.to_string(),
            type_code: code.to_string(),
            type_display: display.to_string(),
            type_text: text.to_string(),
        }
    }

    pub fn type_concept(&self) -> CodeableConcept {
        CodeableConcept::from_coding(
            Coding::new(self.type_system.clone(), self.type_code.clone())
                .with_display(self.type_display.clone()),
        )
        .with_text(self.type_text.clone())
    }
}

impl Default for RoninConfig {
    fn default() -> Self {
        Self {
            tenant_identifier: IdentifierTypeConfig::ronin(
                "http://projectronin.com/id/tenantId",
                "TID",
                "Ronin-specified Tenant Identifier",
                "Tenant ID",
            ),
            fhir_id_identifier: IdentifierTypeConfig::ronin(
                "http://projectronin.com/id/fhir",
                "FHIR ID",
                "FHIR Identifier",
                "FHIR Identifier",
            ),
            mrn_identifier: IdentifierTypeConfig::ronin(
                "http://projectronin.com/id/mrn",
                "MR",
                "Medical Record Number",
                "MRN",
            ),
            data_authority: DataAuthorityConfig::default(),
            tenant_source_system_base: "http://projectronin.io/fhir/CodeSystem".to_string(),
            normalize_coding_systems: true,
            populate_reference_types: true,
            system_mappings: default_system_mappings(),
        }
    }
}

impl Default for DataAuthorityConfig {
    fn default() -> Self {
        Self {
            identifier: IdentifierTypeConfig::ronin(
                "http://projectronin.com/id/dataAuthorityId",
                "DAID",
                "Data Authority Identifier",
                "Data Authority",
            ),
            value: "EHR Data Authority".to_string(),
            extension_url:
                "http://projectronin.io/fhir/StructureDefinition/Extension/ronin-dataAuthorityIdentifier"
                    .to_string(),
        }
    }
}

fn default_system_mappings() -> BTreeMap<String, String> {
    [
        ("urn:oid:2.16.840.1.113883.6.1", "http://loinc.org"),
        ("urn:oid:2.16.840.1.113883.6.96", "http://snomed.info/sct"),
        ("urn:oid:2.16.840.1.113883.6.88", "http://www.nlm.nih.gov/research/umls/rxnorm"),
        ("urn:oid:2.16.840.1.113883.6.90", "http://hl7.org/fhir/sid/icd-10-cm"),
        ("urn:oid:2.16.840.1.113883.6.103", "http://hl7.org/fhir/sid/icd-9-cm"),
        ("urn:oid:2.16.840.1.113883.6.12", "http://www.ama-assn.org/go/cpt"),
        ("urn:oid:2.16.840.1.113883.12.292", "http://hl7.org/fhir/sid/cvx"),
        ("urn:oid:2.16.840.1.113883.6.8", "http://unitsofmeasure.org"),
        ("urn:oid:2.16.840.1.113883.4.1", "http://hl7.org/fhir/sid/us-ssn"),
    ]
    .into_iter()
    .map(|(oid, url)| (oid.to_string(), url.to_string()))
    .collect()
}

impl RoninConfig {
    /// Parses a JSON document; absent keys fall back to the defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RoninConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let identifier_types = [
            ("tenantIdentifier", &self.tenant_identifier),
            ("fhirIdIdentifier", &self.fhir_id_identifier),
            ("mrnIdentifier", &self.mrn_identifier),
            ("dataAuthority.identifier", &self.data_authority.identifier),
        ];
        for (name, identifier) in identifier_types {
            check_url(&format!("{name}.system"), &identifier.system)?;
            check_url(&format!("{name}.typeSystem"), &identifier.type_system)?;
            if identifier.type_code.is_empty() {
                return Err(RoninError::configuration(format!(
                    "{name}.typeCode must not be empty"
                )));
            }
        }
        check_url("dataAuthority.extensionUrl", &self.data_authority.extension_url)?;
        check_url("tenantSourceSystemBase", &self.tenant_source_system_base)?;
        for (oid, canonical) in &self.system_mappings {
            check_url(&format!("systemMappings[{oid}]"), canonical)?;
        }
        Ok(())
    }
}

fn check_url(name: &str, value: &str) -> Result<()> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| RoninError::configuration(format!("{name} is not a valid URL: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = RoninConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.normalize_coding_systems);
        assert_eq!(
            config.system_mappings.get("urn:oid:2.16.840.1.113883.6.96"),
            Some(&"http://snomed.info/sct".to_string())
        );
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config =
            RoninConfig::from_json_str(r#"{"populateReferenceTypes": false}"#).unwrap();
        assert!(!config.populate_reference_types);
        assert_eq!(config.data_authority.value, "EHR Data Authority");
    }

    #[test]
    fn test_invalid_mapping_is_rejected() {
        let err = RoninConfig::from_json_str(
            r#"{"systemMappings": {"urn:oid:1.2.3": "not a url"}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, RoninError::Configuration { .. }));
    }

    #[test]
    fn test_type_concept() {
        let concept = RoninConfig::default().tenant_identifier.type_concept();
        assert_eq!(concept.text.as_deref(), Some("Tenant ID"));
        assert!(concept.has_coding(RONIN_IDENTIFIER_TYPE_SYSTEM, "TID"));
    }
}
