//! Engine factories
//!
//! The engine behind every handle is picked once, at startup, by the name
//! in [`Config::engine`]. Embedders register their own factories next to
//! the built-in recording engine.

use std::collections::HashMap;
use std::sync::Arc;

use weblayer_native::{NativeEngine, RecordingEngine};

use crate::config::{Config, RECORDING_ENGINE};
use crate::error::CoreError;
use crate::Result;

pub type EngineFactory =
    Box<dyn Fn(&Config) -> anyhow::Result<Arc<dyn NativeEngine>> + Send + Sync>;

pub struct EngineRegistry {
    factories: HashMap<String, EngineFactory>,
}

impl EngineRegistry {
    /// A registry with no engines at all.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn(&Config) -> anyhow::Result<Arc<dyn NativeEngine>> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(CoreError::EngineTaken { name });
        }
        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Starts the engine named by `config.engine`.
    pub fn create(&self, config: &Config) -> Result<Arc<dyn NativeEngine>> {
        let factory = self
            .factories
            .get(&config.engine)
            .ok_or_else(|| CoreError::UnknownEngine(config.engine.clone()))?;
        let engine = factory(config).map_err(CoreError::EngineStart)?;
        tracing::info!(engine = %config.engine, "engine started");
        Ok(engine)
    }
}

fn recording_engine(_config: &Config) -> anyhow::Result<Arc<dyn NativeEngine>> {
    Ok(Arc::new(RecordingEngine::new()))
}

impl Default for EngineRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .factories
            .insert(RECORDING_ENGINE.to_string(), Box::new(recording_engine));
        registry
    }
}
