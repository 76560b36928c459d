//! The orchestrator contract, consumed rather than implemented here:
//! `registerResource`, `readResource`, `call`, `export`. This crate never
//! implements the real RPC client — `OrchestratorClient` is the trait
//! boundary a host embeds behind, the evaluator's analogue of
//! `schema::PackageLoader` standing in for real plugin discovery.
//! `MockOrchestrator` is the only implementation here, used by tests and
//! the demonstration CLI; a production host would back this trait with the
//! real gRPC client instead.

use std::collections::{BTreeSet, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;

use super::value::{ResourceRef, Value};

/// The subset of `ResourceOptions` the orchestrator needs forwarded as
/// metadata alongside a registration — everything else in that table is
/// either consumed locally (`dependsOn`, `parent` feed the dependency set)
/// or purely advisory to a real provider backend.
#[derive(Debug, Clone, Default)]
pub struct RegisterResourceOptions {
    pub protect: bool,
    pub parent: Option<String>,
    pub provider: Option<String>,
    pub providers: Vec<(String, String)>,
    pub aliases: Vec<String>,
    pub additional_secret_outputs: Vec<String>,
    pub ignore_changes: Vec<String>,
    pub replace_on_changes: Vec<String>,
    pub delete_before_replace: Option<bool>,
    pub retain_on_delete: Option<bool>,
    pub import: Option<String>,
    pub deleted_with: Option<String>,
    pub version: Option<String>,
    pub plugin_download_url: Option<String>,
    pub custom_timeouts: HashMap<String, String>,
}

#[derive(Debug, Clone)]
pub struct RegisterResourceRequest {
    pub type_token: String,
    pub name: String,
    pub custom: bool,
    pub inputs: Vec<(String, Value)>,
    pub options: RegisterResourceOptions,
    pub dependencies: BTreeSet<ResourceRef>,
}

#[derive(Debug, Clone)]
pub struct RegisterResourceResponse {
    pub id: Option<String>,
    pub outputs: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
pub struct ReadResourceRequest {
    pub type_token: String,
    pub name: String,
    pub id: String,
    pub state: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
pub struct CallRequest {
    pub token: String,
    pub args: Vec<(String, Value)>,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum OrchestratorError {
    #[error("{0}")]
    Failed(String),
}

/// The four orchestrator operations, each returning (conceptually) an
/// eventual value — in this trait that's simply an `async` response, since the
/// continuation/dependency bookkeeping around the response happens one
/// layer up in `eval::engine`.
#[async_trait]
pub trait OrchestratorClient: Send + Sync {
    async fn register_resource(
        &self,
        req: RegisterResourceRequest,
    ) -> Result<RegisterResourceResponse, OrchestratorError>;

    async fn read_resource(&self, req: ReadResourceRequest) -> Result<Vec<(String, Value)>, OrchestratorError>;

    async fn call(&self, req: CallRequest) -> Result<Vec<(String, Value)>, OrchestratorError>;

    async fn export(&self, name: &str, value: &Value);
}

/// An in-memory orchestrator for tests and the demo CLI: canned outputs
/// keyed by logical resource name, canned call results keyed by function
/// token. Never issues real RPCs.
#[derive(Default)]
pub struct MockOrchestrator {
    resource_outputs: HashMap<String, Vec<(String, Value)>>,
    resource_ids: HashMap<String, String>,
    call_results: HashMap<String, Vec<(String, Value)>>,
    call_failures: HashMap<String, String>,
    exports: Mutex<Vec<(String, Value)>>,
}

impl MockOrchestrator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resource_outputs(mut self, name: impl Into<String>, outputs: Vec<(String, Value)>) -> Self {
        self.resource_outputs.insert(name.into(), outputs);
        self
    }

    pub fn with_resource_id(mut self, name: impl Into<String>, id: impl Into<String>) -> Self {
        self.resource_ids.insert(name.into(), id.into());
        self
    }

    pub fn with_call_result(mut self, token: impl Into<String>, outputs: Vec<(String, Value)>) -> Self {
        self.call_results.insert(token.into(), outputs);
        self
    }

    pub fn with_call_failure(mut self, token: impl Into<String>, message: impl Into<String>) -> Self {
        self.call_failures.insert(token.into(), message.into());
        self
    }

    /// Every value handed to `export` so far, in call order.
    pub fn exports(&self) -> Vec<(String, Value)> {
        self.exports.lock().expect("exports mutex poisoned").clone()
    }
}

#[async_trait]
impl OrchestratorClient for MockOrchestrator {
    async fn register_resource(
        &self,
        req: RegisterResourceRequest,
    ) -> Result<RegisterResourceResponse, OrchestratorError> {
        let outputs = self
            .resource_outputs
            .get(&req.name)
            .cloned()
            .unwrap_or_else(|| req.inputs.clone());
        let id = self
            .resource_ids
            .get(&req.name)
            .cloned()
            .unwrap_or_else(|| format!("{}-id", req.name));
        Ok(RegisterResourceResponse { id: Some(id), outputs })
    }

    async fn read_resource(&self, req: ReadResourceRequest) -> Result<Vec<(String, Value)>, OrchestratorError> {
        Ok(self.resource_outputs.get(&req.name).cloned().unwrap_or_default())
    }

    async fn call(&self, req: CallRequest) -> Result<Vec<(String, Value)>, OrchestratorError> {
        if let Some(msg) = self.call_failures.get(&req.token) {
            return Err(OrchestratorError::Failed(msg.clone()));
        }
        self.call_results
            .get(&req.token)
            .cloned()
            .ok_or_else(|| OrchestratorError::Failed(format!("unknown function `{}`", req.token)))
    }

    async fn export(&self, name: &str, value: &Value) {
        self.exports.lock().expect("exports mutex poisoned").push((name.to_string(), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_resource_returns_canned_outputs() {
        let orch = MockOrchestrator::new()
            .with_resource_outputs("r", vec![("bar".to_string(), Value::String("oof".to_string()))])
            .with_resource_id("r", "r-123");
        let resp = orch
            .register_resource(RegisterResourceRequest {
                type_token: "test:resource:t".to_string(),
                name: "r".to_string(),
                custom: true,
                inputs: vec![],
                options: RegisterResourceOptions::default(),
                dependencies: BTreeSet::new(),
            })
            .await
            .unwrap();
        assert_eq!(resp.id, Some("r-123".to_string()));
        assert_eq!(resp.outputs, vec![("bar".to_string(), Value::String("oof".to_string()))]);
    }

    #[tokio::test]
    async fn call_fails_for_unregistered_token() {
        let orch = MockOrchestrator::new();
        let err = orch.call(CallRequest { token: "aws:index:getAmi".to_string(), args: vec![] }).await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn export_accumulates_in_call_order() {
        let orch = MockOrchestrator::new();
        orch.export("a", &Value::String("1".to_string())).await;
        orch.export("b", &Value::String("2".to_string())).await;
        assert_eq!(orch.exports().len(), 2);
    }
}
