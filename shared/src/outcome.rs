use serde_json::{Map, Value};

/// Result of a single managed-API operation: did it succeed, the
/// human-readable summary, and any response fields worth echoing back to
/// CloudFormation as outputs.
#[derive(Debug, Clone, PartialEq)]
pub struct OpOutcome {
    pub success: bool,
    pub message: String,
    pub data: Map<String, Value>,
}

impl OpOutcome {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Map::new(),
        }
    }

    pub fn ok_with(message: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Map::new(),
        }
    }
}
