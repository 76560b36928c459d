//! The config-source collaborator: configuration sources (environment,
//! file, flags) are external collaborators, interfaces only. A config
//! parameter with no `default` expression needs its value from somewhere;
//! this trait is that somewhere. A real host layers CLI flags over a stack
//! config file over the environment; this crate only defines the seam plus
//! an environment-backed implementation good enough for the demonstration
//! CLI, mirroring how `schema::PackageLoader` stands in for real plugin
//! discovery rather than reimplementing it.

use std::collections::HashMap;

/// Resolves a config key to its raw string value, or `None` if unset.
/// Parsing the raw string against the key's declared type happens in
/// `eval::engine`, not here — this trait only sources text.
pub trait ConfigSource: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
}

/// Reads `PULUMI_CONFIG_<KEY>` from the process environment.
pub struct EnvConfigSource;

impl ConfigSource for EnvConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(format!("PULUMI_CONFIG_{}", key.to_uppercase())).ok()
    }
}

/// A fixed in-memory source, for tests and for the demo CLI's `--config`
/// flag.
#[derive(Debug, Clone, Default)]
pub struct MapConfigSource(HashMap<String, String>);

impl MapConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }
}

impl ConfigSource for MapConfigSource {
    fn get(&self, key: &str) -> Option<String> {
        self.0.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_source_returns_configured_value() {
        let src = MapConfigSource::new().with("region", "us-west-2");
        assert_eq!(src.get("region"), Some("us-west-2".to_string()));
        assert_eq!(src.get("missing"), None);
    }
}
