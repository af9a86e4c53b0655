//! Model registry: loads every configured artifact once, independently.
//!
//! Each classifier (and the scaler) goes through the same attempt chain:
//!
//! 1. `<model_dir>/<file>` decoded as JSON,
//! 2. the same bytes decoded as YAML,
//! 3. the `_fixed` variant (`random_forest.json` -> `random_forest_fixed.json`),
//!    JSON then YAML,
//! 4. for `random_forest` and the scaler only, a stand-in fitted on random data.
//!
//! A model that exhausts its chain is recorded as [`LoadSource::Missing`] and
//! simply unavailable; the rest of the registry is unaffected.

use crate::classifier::{Capabilities, Classifier, ModelArtifact};
use crate::scaler::StandardScaler;
use crate::tree::TreeEnsemble;
use candle_core::Device;
use parkinsight_core::{Result, ServiceConfig, ServiceError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Registry name of the voting ensemble preferred by `predict`.
pub const ENSEMBLE_MODEL: &str = "ensemble";

/// Registry name of the random forest, the one classifier with a stand-in.
pub const RANDOM_FOREST_MODEL: &str = "random_forest";

/// Where a registry entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadSource {
    /// Configured file, JSON.
    Primary,
    /// Configured file, YAML.
    AlternateFormat,
    /// `_fixed` variant of the configured file.
    FixedVariant,
    /// Constructed at startup from random data.
    StandIn,
    /// Registered programmatically.
    InMemory,
    /// Nothing could be loaded.
    Missing,
}

/// One configured model and its load outcome.
#[derive(Debug)]
pub struct ModelSlot {
    name: String,
    path: Option<PathBuf>,
    source: LoadSource,
    model: Option<Arc<Classifier>>,
}

impl ModelSlot {
    /// Registry name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Where the model came from.
    #[must_use]
    pub fn source(&self) -> LoadSource {
        self.source
    }

    /// The loaded classifier, if any.
    #[must_use]
    pub fn model(&self) -> Option<&Arc<Classifier>> {
        self.model.as_ref()
    }
}

/// Serializable view of a slot for status endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ModelStatus {
    /// Registry name.
    pub name: String,
    /// Whether the model can be invoked.
    pub available: bool,
    /// Classifier kind, when loaded.
    pub kind: Option<&'static str>,
    /// Load outcome.
    pub source: LoadSource,
    /// Capability flags, when loaded.
    pub capabilities: Option<Capabilities>,
    /// Configured artifact path.
    pub path: Option<String>,
}

/// All loaded classifiers plus the shared scaler.
#[derive(Debug)]
pub struct ModelRegistry {
    slots: Vec<ModelSlot>,
    scaler: Option<Arc<StandardScaler>>,
    scaler_source: LoadSource,
}

impl ModelRegistry {
    /// Load the scaler and every configured classifier.
    ///
    /// Never fails: each model degrades independently and the outcome is
    /// recorded per slot.
    pub fn load_all(config: &ServiceConfig) -> Self {
        let dir = Path::new(&config.model_dir);
        let device = Device::Cpu;

        let scaler_path = dir.join(&config.scaler_file);
        let (scaler, scaler_source) =
            match load_with_fallback("scaler", &scaler_path, |s: StandardScaler| {
                s.validate()?;
                Ok(s)
            }) {
                Some((s, source)) => (Some(Arc::new(s)), source),
                None => {
                    tracing::warn!(
                        path = %scaler_path.display(),
                        "Scaler unavailable, using stand-in fitted on random data"
                    );
                    (
                        Some(Arc::new(StandardScaler::stand_in(&mut rand::thread_rng()))),
                        LoadSource::StandIn,
                    )
                }
            };

        let slots = config
            .models
            .iter()
            .map(|entry| {
                let path = dir.join(&entry.file);
                let loaded = load_with_fallback(&entry.name, &path, |a: ModelArtifact| {
                    Classifier::from_artifact(a, &device)
                });
                let (model, source) = match loaded {
                    Some((m, source)) => (Some(Arc::new(m)), source),
                    None if entry.name == RANDOM_FOREST_MODEL => {
                        tracing::warn!(
                            model = %entry.name,
                            "Using stand-in random forest; predictions carry no clinical meaning"
                        );
                        let stand_in = TreeEnsemble::stand_in(&mut rand::thread_rng());
                        (
                            Some(Arc::new(Classifier::Forest(stand_in))),
                            LoadSource::StandIn,
                        )
                    }
                    None => {
                        tracing::error!(model = %entry.name, "Model unavailable after all load attempts");
                        (None, LoadSource::Missing)
                    }
                };
                ModelSlot {
                    name: entry.name.clone(),
                    path: Some(path),
                    source,
                    model,
                }
            })
            .collect::<Vec<_>>();

        let available = slots.iter().filter(|s| s.model.is_some()).count();
        tracing::info!(
            available,
            configured = slots.len(),
            scaler = ?scaler_source,
            "Model registry loaded"
        );

        Self {
            slots,
            scaler,
            scaler_source,
        }
    }

    /// Registry with no scaler and no models.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            slots: Vec::new(),
            scaler: None,
            scaler_source: LoadSource::Missing,
        }
    }

    /// Install an in-memory scaler.
    #[must_use]
    pub fn with_scaler(mut self, scaler: StandardScaler) -> Self {
        self.scaler = Some(Arc::new(scaler));
        self.scaler_source = LoadSource::InMemory;
        self
    }

    /// Register an in-memory classifier, replacing any slot of the same name.
    #[must_use]
    pub fn with_model(mut self, name: impl Into<String>, model: Classifier) -> Self {
        let name = name.into();
        self.slots.retain(|s| s.name != name);
        self.slots.push(ModelSlot {
            name,
            path: None,
            source: LoadSource::InMemory,
            model: Some(Arc::new(model)),
        });
        self
    }

    /// Whether `name` is loaded and invocable.
    #[must_use]
    pub fn is_available(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Loaded classifier by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<Classifier>> {
        self.slots
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.model.clone())
    }

    /// Loaded classifiers, in configuration order.
    #[must_use]
    pub fn available_models(&self) -> Vec<(&str, Arc<Classifier>)> {
        self.slots
            .iter()
            .filter_map(|s| s.model.clone().map(|m| (s.name.as_str(), m)))
            .collect()
    }

    /// Names of configured models that could not be loaded.
    #[must_use]
    pub fn missing_models(&self) -> Vec<&str> {
        self.slots
            .iter()
            .filter(|s| s.model.is_none())
            .map(|s| s.name.as_str())
            .collect()
    }

    /// All slots, in configuration order.
    #[must_use]
    pub fn slots(&self) -> &[ModelSlot] {
        &self.slots
    }

    /// The shared scaler, if one is available.
    #[must_use]
    pub fn scaler(&self) -> Option<Arc<StandardScaler>> {
        self.scaler.clone()
    }

    /// Where the scaler came from.
    #[must_use]
    pub fn scaler_source(&self) -> LoadSource {
        self.scaler_source
    }

    /// Per-slot status for reporting.
    #[must_use]
    pub fn status(&self) -> Vec<ModelStatus> {
        self.slots
            .iter()
            .map(|s| ModelStatus {
                name: s.name.clone(),
                available: s.model.is_some(),
                kind: s.model.as_ref().map(|m| m.kind()),
                source: s.source,
                capabilities: s.model.as_ref().map(|m| m.capabilities()),
                path: s.path.as_ref().map(|p| p.display().to_string()),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Attempt chain
// ---------------------------------------------------------------------------

/// `dir/name.ext` -> `dir/name_fixed.ext`.
#[must_use]
pub fn fixed_variant(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file_name = match path.extension() {
        Some(ext) => format!("{stem}_fixed.{}", ext.to_string_lossy()),
        None => format!("{stem}_fixed"),
    };
    path.with_file_name(file_name)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Json,
    Yaml,
}

fn decode_and_build<A, T>(
    name: &str,
    path: &Path,
    bytes: &[u8],
    build: &impl Fn(A) -> Result<T>,
) -> Option<(T, Encoding)>
where
    A: DeserializeOwned,
{
    let json = serde_json::from_slice::<A>(bytes)
        .map_err(ServiceError::from)
        .and_then(build);
    match json {
        Ok(model) => {
            tracing::info!(model = name, path = %path.display(), encoding = "json", "Loaded artifact");
            return Some((model, Encoding::Json));
        }
        Err(e) => {
            tracing::warn!(model = name, path = %path.display(), encoding = "json", error = %e, "Artifact attempt failed");
        }
    }

    let yaml = serde_yaml::from_slice::<A>(bytes)
        .map_err(|e| ServiceError::Model(format!("YAML decode failed: {e}")))
        .and_then(build);
    match yaml {
        Ok(model) => {
            tracing::info!(model = name, path = %path.display(), encoding = "yaml", "Loaded artifact");
            Some((model, Encoding::Yaml))
        }
        Err(e) => {
            tracing::warn!(model = name, path = %path.display(), encoding = "yaml", error = %e, "Artifact attempt failed");
            None
        }
    }
}

fn load_with_fallback<A, T>(
    name: &str,
    path: &Path,
    build: impl Fn(A) -> Result<T>,
) -> Option<(T, LoadSource)>
where
    A: DeserializeOwned,
{
    match std::fs::read(path) {
        Ok(bytes) => {
            if let Some((model, encoding)) = decode_and_build(name, path, &bytes, &build) {
                let source = match encoding {
                    Encoding::Json => LoadSource::Primary,
                    Encoding::Yaml => LoadSource::AlternateFormat,
                };
                return Some((model, source));
            }
        }
        Err(e) => {
            tracing::warn!(model = name, path = %path.display(), error = %e, "Artifact not readable");
        }
    }

    let fixed = fixed_variant(path);
    match std::fs::read(&fixed) {
        Ok(bytes) => decode_and_build(name, &fixed, &bytes, &build)
            .map(|(model, _)| (model, LoadSource::FixedVariant)),
        Err(e) => {
            tracing::debug!(model = name, path = %fixed.display(), error = %e, "No fixed variant");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
