//! Built-in model catalog
//!
//! The catalog is embedded from `builtins/models.toml` at build time and never
//! changes while the process runs. Its first entry is the default selection.

use serde::Deserialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelDescriptor {
    pub id: String,
    pub display_name: String,
    pub description: String,
    pub vendor: String,
}

#[derive(Debug, Deserialize)]
struct BuiltinModelsConfig {
    models: Vec<ModelDescriptor>,
}

#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: Vec<ModelDescriptor>,
}

static BUILTIN_CATALOG: LazyLock<ModelCatalog> = LazyLock::new(|| {
    const CONFIG_CONTENT: &str = include_str!("../../builtins/models.toml");
    let config: BuiltinModelsConfig =
        toml::from_str(CONFIG_CONTENT).expect("Failed to parse builtins/models.toml");
    ModelCatalog::new(config.models)
});

impl ModelCatalog {
    /// Build a catalog from an explicit list. Panics on an empty list or a
    /// duplicate id, since every catalog needs a unique default.
    pub fn new(models: Vec<ModelDescriptor>) -> Self {
        assert!(!models.is_empty(), "model catalog must not be empty");
        for (index, model) in models.iter().enumerate() {
            assert!(
                !models[..index].iter().any(|other| other.id == model.id),
                "duplicate model id in catalog: {}",
                model.id
            );
        }
        Self { models }
    }

    pub fn builtin() -> &'static ModelCatalog {
        &BUILTIN_CATALOG
    }

    pub fn list(&self) -> &[ModelDescriptor] {
        &self.models
    }

    pub fn default_id(&self) -> &str {
        &self.models[0].id
    }

    pub fn find(&self, id: &str) -> Option<&ModelDescriptor> {
        self.models.iter().find(|model| model.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    /// Resolve picker input: a 1-based position in the list or an exact id.
    pub fn resolve_choice(&self, choice: &str) -> Option<&ModelDescriptor> {
        let choice = choice.trim();
        if let Ok(position) = choice.parse::<usize>() {
            return position
                .checked_sub(1)
                .and_then(|index| self.models.get(index));
        }
        self.find(choice)
    }
}

#[cfg(test)]
pub(crate) fn test_catalog() -> ModelCatalog {
    let model = |id: &str, name: &str| ModelDescriptor {
        id: id.to_string(),
        display_name: name.to_string(),
        description: format!("{name} for tests"),
        vendor: "Test".to_string(),
    };
    ModelCatalog::new(vec![model("model-A", "Model A"), model("model-B", "Model B")])
}
