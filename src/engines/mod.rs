//! OCR engine implementations
//!
//! Engines are conditionally compiled based on feature flags. Building with
//! no engine feature leaves the registry empty, which the orchestrator
//! reports as "optical recognition not installed".

pub mod models;

#[cfg(feature = "engine-ocrs")]
pub mod ocrs;

#[cfg(feature = "engine-leptess")]
pub mod leptess;

use crate::config::OcrConfig;
use crate::engine::OcrEngine;
use serde::Serialize;
use std::sync::Arc;

/// Information about an available engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineInfo {
    pub name: &'static str,
    pub description: &'static str,
}

/// Registry of the compiled-in engines that initialized successfully
pub struct EngineRegistry {
    engines: Vec<Arc<dyn OcrEngine>>,
    default_engine: Option<&'static str>,
}

impl EngineRegistry {
    /// Initialize every compiled-in engine. An engine that fails to start
    /// (e.g. model download blocked) is logged and left out.
    #[allow(unused_variables, unused_mut)]
    pub fn new(config: &OcrConfig) -> Self {
        let mut engines: Vec<Arc<dyn OcrEngine>> = Vec::new();

        #[cfg(feature = "engine-ocrs")]
        match ocrs::OcrsEngine::new(config) {
            Ok(engine) => engines.push(Arc::new(engine)),
            Err(e) => tracing::warn!(engine = "ocrs", error = %e, "OCR engine unavailable"),
        }

        #[cfg(feature = "engine-leptess")]
        match leptess::TesseractEngine::new(config) {
            Ok(engine) => engines.push(Arc::new(engine)),
            Err(e) => tracing::warn!(engine = "tesseract", error = %e, "OCR engine unavailable"),
        }

        if engines.is_empty() {
            tracing::warn!("No OCR engine available; scanned reports cannot be read");
        }

        Self::from_engines(engines, config.preferred_engine.as_deref())
    }

    /// Build from already constructed engines; the preferred name wins when
    /// present, otherwise the first engine is the default
    pub fn from_engines(engines: Vec<Arc<dyn OcrEngine>>, preferred: Option<&str>) -> Self {
        let default_engine = match preferred {
            Some(name) => match engines.iter().find(|e| e.name() == name) {
                Some(engine) => Some(engine.name()),
                None => {
                    tracing::warn!(
                        preferred = name,
                        "Preferred OCR engine not available, using first available"
                    );
                    engines.first().map(|e| e.name())
                }
            },
            None => engines.first().map(|e| e.name()),
        };

        Self {
            engines,
            default_engine,
        }
    }

    /// Get an engine by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn OcrEngine>> {
        self.engines.iter().find(|e| e.name() == name).cloned()
    }

    /// Get the default engine
    pub fn default(&self) -> Option<Arc<dyn OcrEngine>> {
        self.default_engine.and_then(|name| self.get(name))
    }

    pub fn default_name(&self) -> Option<&'static str> {
        self.default_engine
    }

    /// List all available engine names
    pub fn list(&self) -> Vec<&'static str> {
        self.engines.iter().map(|e| e.name()).collect()
    }

    pub fn info(&self) -> Vec<EngineInfo> {
        self.engines
            .iter()
            .map(|e| EngineInfo {
                name: e.name(),
                description: e.description(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}
