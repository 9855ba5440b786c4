use thiserror::Error;

#[derive(Error, Debug)]
pub enum RoninError {
    /// Raised by `Validation::alert_if_errors` when ERROR issues are present.
    #[error("{message}")]
    Validation { message: String },

    #[error("No vendor identifier could be resolved for tenant {tenant}")]
    VendorIdentifierNotFound { tenant: String },

    #[error("Invalid field {field}: {message}")]
    InvalidField { field: String, message: String },

    #[error("Invalid resource: {message}")]
    InvalidResource { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, RoninError>;

impl RoninError {
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn vendor_identifier_not_found<S: Into<String>>(tenant: S) -> Self {
        Self::VendorIdentifierNotFound {
            tenant: tenant.into(),
        }
    }

    pub fn invalid_field<S: Into<String>, M: Into<String>>(field: S, message: M) -> Self {
        Self::InvalidField {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn invalid_resource<S: Into<String>>(message: S) -> Self {
        Self::InvalidResource {
            message: message.into(),
        }
    }

    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RoninError::invalid_field("identifier", "expected an array");
        assert_eq!(
            err.to_string(),
            "Invalid field identifier: expected an array"
        );

        let err = RoninError::vendor_identifier_not_found("test");
        assert!(err.to_string().contains("tenant test"));
    }

    #[test]
    fn test_validation_error_is_bare_message() {
        let err = RoninError::validation("ERROR REQ_FIELD: id is a required element @ Patient.id");
        assert_eq!(
            err.to_string(),
            "ERROR REQ_FIELD: id is a required element @ Patient.id"
        );
    }

    #[test]
    fn test_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json");
        let err: RoninError = json_err.unwrap_err().into();
        assert!(matches!(err, RoninError::Serialization(_)));
    }
}
