//! Validation issue taxonomy.
//!
//! A [`Rule`] describes what went wrong (code, severity, description); a
//! [`ValidationIssue`] pins a rule to the [`LocationContext`] where it fired.
//! Issues are immutable once created.

use crate::location::LocationContext;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Issue severity. Only `Error` blocks a transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

pub const REQ_FIELD: &str = "REQ_FIELD";
pub const INV_VALUE_SET: &str = "INV_VALUE_SET";
pub const INV_DYN_VAL: &str = "INV_DYN_VAL";
pub const INV_PRIM: &str = "INV_PRIM";
pub const INV_TYPE: &str = "INV_TYPE";
pub const INV_CARDINALITY: &str = "INV_CARDINALITY";
pub const INV_RES_TYPE: &str = "INV_RES_TYPE";
pub const R4_INV_EXT: &str = "R4_INV_EXT";
pub const NOV_CONMAP_LOOKUP: &str = "NOV_CONMAP_LOOKUP";
pub const RONIN_INV_REF_TYPE: &str = "RONIN_INV_REF_TYPE";
pub const RONIN_REQ_REF_TYPE_001: &str = "RONIN_REQ_REF_TYPE_001";
pub const RONIN_DAUTH_EX_001: &str = "RONIN_DAUTH_EX_001";
pub const RONIN_VENDOR_ID_001: &str = "RONIN_VENDOR_ID_001";

/// A check that can fail: code, severity and human-readable description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub code: Cow<'static, str>,
    pub severity: Severity,
    pub description: String,
}

impl Rule {
    pub fn error(code: impl Into<Cow<'static, str>>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity: Severity::Error,
            description: description.into(),
        }
    }

    pub fn warning(code: impl Into<Cow<'static, str>>, description: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity: Severity::Warning,
            description: description.into(),
        }
    }

    pub fn required_field(field: &str) -> Self {
        Self::error(REQ_FIELD, format!("{field} is a required element"))
    }

    pub fn invalid_value_set(value: &str) -> Self {
        Self::error(
            INV_VALUE_SET,
            format!("'{value}' is outside of required value set"),
        )
    }

    pub fn invalid_dynamic_value(field: &str, allowed: &[&str]) -> Self {
        Self::error(
            INV_DYN_VAL,
            format!(
                "{field} can only be one of the following: {}",
                allowed.join(", ")
            ),
        )
    }

    pub fn invalid_primitive(type_name: &str, value: &str) -> Self {
        Self::error(INV_PRIM, format!("'{value}' is not a valid {type_name}"))
    }

    pub fn invalid_type(field: &str, message: &str) -> Self {
        Self::error(INV_TYPE, format!("{field} could not be read: {message}"))
    }

    pub fn invalid_cardinality(field: &str, max: usize) -> Self {
        Self::error(
            INV_CARDINALITY,
            format!("{field} must not contain more than {max} element(s)"),
        )
    }

    pub fn invalid_resource_type(expected: &str, actual: &str) -> Self {
        Self::error(
            INV_RES_TYPE,
            format!("resourceType '{actual}' does not match expected '{expected}'"),
        )
    }

    pub fn failed_concept_map_lookup(value: &str, field_key: &str, tenant: &str) -> Self {
        Self::error(
            NOV_CONMAP_LOOKUP,
            format!(
                "Tenant source value '{value}' has no target defined in any {field_key} concept map for tenant '{tenant}'"
            ),
        )
    }

    pub fn invalid_reference_type(allowed: &[&str]) -> Self {
        Self::error(
            RONIN_INV_REF_TYPE,
            format!("referenced resource type was not {}", allowed.join(" or ")),
        )
    }

    pub fn required_reference_type() -> Self {
        Self::error(
            RONIN_REQ_REF_TYPE_001,
            "Attribute Type is required for the reference",
        )
    }

    pub fn required_data_authority_extension() -> Self {
        Self::error(
            RONIN_DAUTH_EX_001,
            "Data Authority extension identifier is required for reference",
        )
    }

    pub fn unresolved_vendor_identifier(tenant: &str) -> Self {
        Self::error(
            RONIN_VENDOR_ID_001,
            format!("No qualifying vendor identifier found for tenant '{tenant}'"),
        )
    }
}

/// A single finding produced by one validator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    code: Cow<'static, str>,
    severity: Severity,
    description: String,
    location: LocationContext,
}

impl ValidationIssue {
    pub fn new(rule: Rule, location: LocationContext) -> Self {
        Self {
            code: rule.code,
            severity: rule.severity,
            description: rule.description,
            location,
        }
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn location(&self) -> &LocationContext {
        &self.location
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} @ {}",
            self.severity, self.code, self.description, self.location
        )
    }
}
