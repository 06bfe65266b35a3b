use thiserror::Error;

/// Kernel error type.
///
/// Every fatal error names the subsystem, the affected entity and the rule
/// that was violated, so a single log line identifies the failure.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("scenario: {element}: {rule}")]
    Scenario { element: String, rule: String },

    #[error("geometry: {entity}: {rule}")]
    Geometry { entity: String, rule: String },

    #[error("routing: {entity}: {rule}")]
    Routing { entity: String, rule: String },

    #[error("model: agent {agent}: {rule}")]
    Model { agent: u64, rule: String },

    #[error("event: {entity}: {rule}")]
    Event { entity: String, rule: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SimError {
    pub fn scenario(element: impl Into<String>, rule: impl Into<String>) -> Self {
        SimError::Scenario {
            element: element.into(),
            rule: rule.into(),
        }
    }

    pub fn geometry(entity: impl Into<String>, rule: impl Into<String>) -> Self {
        SimError::Geometry {
            entity: entity.into(),
            rule: rule.into(),
        }
    }

    pub fn routing(entity: impl Into<String>, rule: impl Into<String>) -> Self {
        SimError::Routing {
            entity: entity.into(),
            rule: rule.into(),
        }
    }
}

pub type SimResult<T> = Result<T, SimError>;
