//! Command envelopes posted to an application instance
//!
//! Every request is a JSON object `{"command": ..., "parameters": {...}}`.
//! Add-on commands are nested inside the `API.ExecuteAddOnCommand` envelope,
//! addressed by namespace and command name.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Command that wraps an add-on scoped command
pub const EXECUTE_ADD_ON_COMMAND: &str = "API.ExecuteAddOnCommand";

/// Namespace of the add-on that answers the identity queries
pub const DEFAULT_ADD_ON_NAMESPACE: &str = "TapirCommand";

/// Names of the commands the orchestrator itself issues
pub mod commands {
    /// Core command returning version, build and language
    pub const GET_PRODUCT_INFO: &str = "API.GetProductInfo";
    /// Add-on command describing the open project
    pub const GET_PROJECT_INFO: &str = "GetProjectInfo";
    /// Add-on command returning the application install location
    pub const GET_ARCHICAD_LOCATION: &str = "GetArchicadLocation";
    /// Add-on command asking the instance to quit
    pub const QUIT_ARCHICAD: &str = "QuitArchicad";
}

/// A single command request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Fully qualified command name
    pub command: String,
    /// Command parameters, always a JSON object
    pub parameters: Value,
}

/// Address of an add-on command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddOnCommandId {
    /// Namespace registered by the add-on
    pub command_namespace: String,
    /// Command name inside the namespace
    pub command_name: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AddOnParameters<'a> {
    add_on_command_id: &'a AddOnCommandId,
    add_on_command_parameters: Value,
}

impl CommandRequest {
    /// Create a request with empty parameters
    pub fn new(command: impl Into<String>) -> Self {
        Self::with_parameters(command, Value::Null)
    }

    /// Create a request with the given parameters.
    ///
    /// `null` is normalized to an empty object; the application rejects
    /// requests without a parameters object.
    pub fn with_parameters(command: impl Into<String>, parameters: Value) -> Self {
        Self {
            command: command.into(),
            parameters: normalize(parameters),
        }
    }

    /// Wrap an add-on command in the `API.ExecuteAddOnCommand` envelope
    pub fn add_on(namespace: &str, name: &str, parameters: Value) -> Self {
        let id = AddOnCommandId {
            command_namespace: namespace.to_string(),
            command_name: name.to_string(),
        };
        let envelope = AddOnParameters {
            add_on_command_id: &id,
            add_on_command_parameters: normalize(parameters),
        };
        // Serializing a struct of strings and a Value cannot fail
        let parameters = serde_json::to_value(envelope).unwrap_or_else(|_| empty_object());
        Self::with_parameters(EXECUTE_ADD_ON_COMMAND, parameters)
    }

    /// Whether this request is an add-on envelope
    pub fn is_add_on(&self) -> bool {
        self.command == EXECUTE_ADD_ON_COMMAND
    }

    /// The inner add-on address, if this is an add-on envelope
    pub fn add_on_id(&self) -> Option<AddOnCommandId> {
        if !self.is_add_on() {
            return None;
        }
        self.parameters
            .get("addOnCommandId")
            .and_then(|id| AddOnCommandId::deserialize(id).ok())
    }
}

fn normalize(parameters: Value) -> Value {
    match parameters {
        Value::Null => empty_object(),
        other => other,
    }
}

fn empty_object() -> Value {
    Value::Object(Map::new())
}
