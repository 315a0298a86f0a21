//! In-memory transport for unit tests

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use mc_core::{CommandTransport, Port, TransportError};
use mc_protocol::{commands, CommandRequest};

#[derive(Default)]
struct Instance {
    alive: bool,
    /// Status answered to liveness probes; 200 when unset
    probe_status: Option<u16>,
    responses: HashMap<String, Value>,
}

/// Fake instances keyed by port. Responses are keyed by core command name
/// or add-on command name.
#[derive(Default)]
pub(crate) struct FakeTransport {
    instances: Mutex<HashMap<Port, Instance>>,
    calls: Mutex<HashMap<(Port, String), usize>>,
}

pub(crate) fn product_info(version: u32) -> Value {
    json!({
        "succeeded": true,
        "result": {"version": version, "buildNumber": 4001, "languageCode": "INT"}
    })
}

pub(crate) fn solo_project(name: &str) -> Value {
    json!({
        "succeeded": true,
        "result": {"addOnCommandResponse": {
            "isUntitled": false,
            "isTeamwork": false,
            "projectPath": format!("/projects/{name}.pln"),
            "projectName": name,
        }}
    })
}

pub(crate) fn location(path: &str) -> Value {
    json!({
        "succeeded": true,
        "result": {"addOnCommandResponse": {"archicadLocation": path}}
    })
}

pub(crate) fn api_error(code: i64, message: &str) -> Value {
    json!({"succeeded": false, "error": {"code": code, "message": message}})
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a live instance with a saved solo project
    pub(crate) fn with_solo(self, port: Port, name: &str) -> Self {
        self.spawn(port);
        self.set_response(port, commands::GET_PRODUCT_INFO, product_info(27));
        self.set_response(port, commands::GET_PROJECT_INFO, solo_project(name));
        self.set_response(port, commands::GET_ARCHICAD_LOCATION, location("/opt/archicad"));
        self
    }

    pub(crate) fn spawn(&self, port: Port) {
        self.instances.lock().unwrap().entry(port).or_default().alive = true;
    }

    pub(crate) fn kill(&self, port: Port) {
        if let Some(instance) = self.instances.lock().unwrap().get_mut(&port) {
            instance.alive = false;
        }
    }

    /// Make a live instance answer probes with `status`
    pub(crate) fn set_probe_status(&self, port: Port, status: u16) {
        self.instances.lock().unwrap().entry(port).or_default().probe_status = Some(status);
    }

    pub(crate) fn is_alive(&self, port: Port) -> bool {
        self.instances
            .lock()
            .unwrap()
            .get(&port)
            .map(|i| i.alive)
            .unwrap_or(false)
    }

    pub(crate) fn set_response(&self, port: Port, key: &str, response: Value) {
        self.instances
            .lock()
            .unwrap()
            .entry(port)
            .or_default()
            .responses
            .insert(key.to_string(), response);
    }

    pub(crate) fn calls(&self, port: Port, key: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .get(&(port, key.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl CommandTransport for FakeTransport {
    async fn post(&self, port: Port, request: &CommandRequest) -> Result<Value, TransportError> {
        let key = request
            .add_on_id()
            .map(|id| id.command_name)
            .unwrap_or_else(|| request.command.clone());
        *self.calls.lock().unwrap().entry((port, key.clone())).or_default() += 1;

        let mut instances = self.instances.lock().unwrap();
        let instance = match instances.get_mut(&port) {
            Some(instance) if instance.alive => instance,
            _ => return Err(TransportError::ConnectionRefused(port)),
        };

        if key == commands::QUIT_ARCHICAD {
            instance.alive = false;
            return Ok(json!({"succeeded": true, "result": {"addOnCommandResponse": {}}}));
        }

        Ok(instance
            .responses
            .get(&key)
            .cloned()
            .unwrap_or_else(|| api_error(404, "unknown command")))
    }

    async fn probe(&self, port: Port) -> Result<u16, TransportError> {
        match self.instances.lock().unwrap().get(&port) {
            Some(instance) if instance.alive => Ok(instance.probe_status.unwrap_or(200)),
            _ => Err(TransportError::ConnectionRefused(port)),
        }
    }
}
