//! Model catalog and the persisted model selection.
//!
//! The built-in catalog is embedded from `builtin_models.toml` at build
//! time. Users can add entries through `custom_models` in the config file.

use std::error::Error as StdError;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::core::storage::{KeyValueStore, SharedStore, KEY_SELECTED_MODEL};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub description: String,
    pub max_tokens: u32,
    #[serde(default)]
    pub strengths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    default: String,
    models: Vec<ModelDescriptor>,
}

#[derive(Debug)]
pub enum RegistryError {
    Empty,
    DuplicateId(String),
    UnknownDefault(String),
    Parse(toml::de::Error),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::Empty => write!(f, "model catalog is empty"),
            RegistryError::DuplicateId(id) => write!(f, "model '{id}' is listed twice"),
            RegistryError::UnknownDefault(id) => {
                write!(f, "default model '{id}' is not in the catalog")
            }
            RegistryError::Parse(err) => write!(f, "failed to parse model catalog: {err}"),
        }
    }
}

impl StdError for RegistryError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            RegistryError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

/// Immutable lookup table of selectable models with one designated default.
#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: Vec<ModelDescriptor>,
    default_index: usize,
}

/// Outcome of checking a persisted selection against the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionCheck {
    Valid,
    /// The stored id (if any) did not resolve; `resolved` must be written back.
    Reset {
        stale: Option<String>,
        resolved: String,
    },
}

impl ModelRegistry {
    pub fn new(models: Vec<ModelDescriptor>, default_id: &str) -> Result<Self, RegistryError> {
        if models.is_empty() {
            return Err(RegistryError::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for model in &models {
            if !seen.insert(model.id.as_str()) {
                return Err(RegistryError::DuplicateId(model.id.clone()));
            }
        }
        let default_index = models
            .iter()
            .position(|m| m.id == default_id)
            .ok_or_else(|| RegistryError::UnknownDefault(default_id.to_string()))?;
        Ok(Self {
            models,
            default_index,
        })
    }

    pub fn from_toml(contents: &str) -> Result<Self, RegistryError> {
        let catalog: CatalogFile = toml::from_str(contents).map_err(RegistryError::Parse)?;
        Self::new(catalog.models, &catalog.default)
    }

    /// The catalog shipped with the binary.
    pub fn builtin() -> Self {
        const CATALOG: &str = include_str!("../builtin_models.toml");
        Self::from_toml(CATALOG).expect("Failed to parse builtin_models.toml")
    }

    /// Add or replace entries. A custom entry with an existing id overrides
    /// the built-in descriptor.
    pub fn with_models(mut self, extra: Vec<ModelDescriptor>) -> Self {
        for model in extra {
            match self.models.iter_mut().find(|m| m.id == model.id) {
                Some(existing) => *existing = model,
                None => self.models.push(model),
            }
        }
        self
    }

    pub fn with_default(mut self, default_id: &str) -> Result<Self, RegistryError> {
        self.default_index = self
            .models
            .iter()
            .position(|m| m.id == default_id)
            .ok_or_else(|| RegistryError::UnknownDefault(default_id.to_string()))?;
        Ok(self)
    }

    pub fn models(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn default_model(&self) -> &ModelDescriptor {
        &self.models[self.default_index]
    }

    pub fn find(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|m| m.id == id)
    }

    /// Look up `id`, falling back to the default entry. Never fails.
    pub fn resolve(&self, id: &str) -> &ModelDescriptor {
        self.find(id).unwrap_or_else(|| self.default_model())
    }

    pub fn validate_selection(&self, selected: Option<&str>) -> SelectionCheck {
        match selected {
            Some(id) if self.find(id).is_some() => SelectionCheck::Valid,
            other => SelectionCheck::Reset {
                stale: other.map(str::to_string),
                resolved: self.default_model().id.clone(),
            },
        }
    }
}

/// The currently selected model id, kept in the key-value store.
pub struct ModelSelection {
    id: String,
    storage: SharedStore,
}

impl ModelSelection {
    /// Read the stored selection and correct it once if it no longer
    /// resolves against `registry`.
    pub fn load(storage: SharedStore, registry: &ModelRegistry) -> Self {
        let stored = storage.get(KEY_SELECTED_MODEL).unwrap_or_else(|err| {
            warn!("Failed to read selected model: {err}");
            None
        });

        let id = match registry.validate_selection(stored.as_deref()) {
            SelectionCheck::Valid => stored.unwrap_or_default(),
            SelectionCheck::Reset { stale, resolved } => {
                if let Some(stale) = stale {
                    warn!("Selected model '{stale}' is no longer available; using '{resolved}'");
                } else {
                    debug!("No model selected; using '{resolved}'");
                }
                if let Err(err) = storage.set(KEY_SELECTED_MODEL, &resolved) {
                    warn!("Failed to persist selected model: {err}");
                }
                resolved
            }
        };

        Self { id, storage }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn descriptor<'a>(&self, registry: &'a ModelRegistry) -> &'a ModelDescriptor {
        registry.resolve(&self.id)
    }

    /// Switch to `id`. Returns `None` (and keeps the old selection) when the
    /// id is not in the catalog.
    pub fn select<'a>(
        &mut self,
        registry: &'a ModelRegistry,
        id: &str,
    ) -> Option<&'a ModelDescriptor> {
        let model = registry.find(id)?;
        self.id = model.id.clone();
        if let Err(err) = self.storage.set(KEY_SELECTED_MODEL, &self.id) {
            warn!("Failed to persist selected model: {err}");
        }
        Some(model)
    }
}
