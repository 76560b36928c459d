//! The evaluator (spec component F): turns a folded `Template` into
//! concrete (or eventual) values by walking its dependency graph and
//! dispatching resource/function operations through an
//! `OrchestratorClient`.

mod builtins;
mod config_source;
mod engine;
mod orchestrator;
mod value;

pub use config_source::{ConfigSource, EnvConfigSource, MapConfigSource};
pub use engine::{load_template_package, run_template, EvalCtx, EvalOptions, EvalOutcome};
pub use orchestrator::{
    CallRequest, MockOrchestrator, OrchestratorClient, OrchestratorError, ReadResourceRequest,
    RegisterResourceOptions, RegisterResourceRequest, RegisterResourceResponse,
};
pub use value::{Archive, Asset, Eventual, ResourceRef, Value};
