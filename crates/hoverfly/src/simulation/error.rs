use thiserror::Error;

/// Errors rejecting a simulation document. The store is left untouched.
#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Invalid JSON")]
    InvalidJson,

    #[error("Invalid JSON, missing \"meta\" object")]
    MissingMeta,

    #[error("Invalid JSON, missing \"meta.schemaVersion\" string")]
    MissingSchemaVersion,

    #[error("Invalid simulation: schema version {0} is not supported by this version of Hoverfly, you may need to update Hoverfly")]
    UnsupportedSchemaVersion(String),

    #[error("Invalid {version} simulation: {reason}")]
    InvalidSimulation { version: String, reason: String },

    #[error("{0}")]
    InvalidDelay(String),
}

impl SimulationError {
    /// Errors detected while reading the document, as opposed to while
    /// applying it.
    pub fn is_bad_request(&self) -> bool {
        !matches!(self, SimulationError::InvalidDelay(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_version_message() {
        let err = SimulationError::UnsupportedSchemaVersion("v0".to_string());
        assert_eq!(
            err.to_string(),
            "Invalid simulation: schema version v0 is not supported by this version of Hoverfly, you may need to update Hoverfly"
        );
        assert!(err.is_bad_request());
    }
}
